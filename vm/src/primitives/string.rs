use object::{ObjectType, Value};

use crate::VM;
use crate::error::{ErrorKind, Unwind};
use crate::primitives::expect_text;

fn argument(args: &[Value]) -> Result<Value, Unwind> {
    args.first()
        .copied()
        .ok_or_else(|| ErrorKind::WrongArgumentCount { expected: 1, got: 0 }.into())
}

/// Length in characters. Shared by strings and symbols.
pub fn string_size(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    let text = expect_text(vm, "string_size", receiver)?;
    let len = text.chars().count();
    Ok(vm.new_integer(len as i64))
}

/// A new string: the receiver's text followed by the argument's.
pub fn string_concat(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let mut text = expect_text(vm, "string_concat", receiver)?;
    text.push_str(&expect_text(vm, "string_concat", argument(args)?)?);
    Ok(vm.new_string(text))
}

/// Strings compare by contents, symbols by identity. A string never
/// equals a symbol.
pub fn string_eq(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let other = argument(args)?;
    if vm.heap.identical(receiver, other) {
        return Ok(Value::TRUE);
    }
    let equal = match (vm.heap.string(receiver), vm.heap.string(other)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    Ok(Value::from_bool(equal))
}

pub fn string_as_symbol(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    let text = expect_text(vm, "string_as_symbol", receiver)?;
    Ok(vm.intern(&text))
}

pub fn symbol_as_string(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    if vm.heap.object_type(receiver) != ObjectType::Symbol {
        return Err(ErrorKind::primitive(
            "symbol_as_string",
            format!("{} is not a symbol", vm.print_string(receiver)),
        )
        .into());
    }
    let text = expect_text(vm, "symbol_as_string", receiver)?;
    Ok(vm.new_string(text))
}
