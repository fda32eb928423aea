use object::Value;

use crate::VM;
use crate::error::{ErrorKind, Unwind};
use crate::primitives::{expect_integer, one_based_index};

fn expect_len(vm: &VM, primitive: &'static str, receiver: Value) -> Result<usize, Unwind> {
    match vm.heap.array(receiver) {
        Some(elements) => Ok(elements.len()),
        None => Err(ErrorKind::primitive(
            primitive,
            format!("{} is not an array", vm.print_string(receiver)),
        )
        .into()),
    }
}

pub fn array_size(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    let len = expect_len(vm, "array_size", receiver)?;
    Ok(vm.new_integer(len as i64))
}

/// 1-based element read. Out of range is fatal.
pub fn array_at(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let &[index] = args else {
        return Err(ErrorKind::WrongArgumentCount { expected: 1, got: args.len() }.into());
    };
    let len = expect_len(vm, "array_at", receiver)?;
    let index = expect_integer(vm, "array_at", index)?;
    let offset = one_based_index(index, len)?;
    let elements = vm.heap.array(receiver).unwrap_or(&[]);
    Ok(elements[offset])
}

/// 1-based element write; answers the stored value.
pub fn array_at_put(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let &[index, value] = args else {
        return Err(ErrorKind::WrongArgumentCount { expected: 2, got: args.len() }.into());
    };
    let len = expect_len(vm, "array_at_put", receiver)?;
    let index = expect_integer(vm, "array_at_put", index)?;
    let offset = one_based_index(index, len)?;
    if let Some(elements) = vm.heap.array_mut(receiver) {
        elements[offset] = value;
    }
    Ok(value)
}
