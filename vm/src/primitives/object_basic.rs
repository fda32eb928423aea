use object::Value;

use crate::VM;
use crate::error::{ErrorKind, Unwind};

pub fn object_identical(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let other = args
        .first()
        .copied()
        .ok_or(ErrorKind::WrongArgumentCount { expected: 1, got: 0 })?;
    Ok(Value::from_bool(vm.heap.identical(receiver, other)))
}

pub fn object_class(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(vm.class_of(receiver))
}

pub fn object_print_string(
    vm: &mut VM,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, Unwind> {
    let text = vm.print_string(receiver);
    Ok(vm.new_string(text))
}

pub fn object_yourself(_vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(receiver)
}

pub fn boolean_not(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    if !receiver.is_boolean() {
        return Err(ErrorKind::primitive(
            "boolean_not",
            format!("{} is not a boolean", vm.print_string(receiver)),
        )
        .into());
    }
    Ok(Value::from_bool(!receiver.is_true()))
}
