use object::{Value, inherits_from};

use crate::VM;
use crate::error::{ErrorKind, Unwind};

fn expect_exception(vm: &VM, primitive: &'static str, value: Value) -> Result<(), Unwind> {
    let is_exception = value.is_ref()
        && vm.heap.instance(value).is_some()
        && inherits_from(&vm.heap, vm.class_of(value), vm.specials.exception);
    if is_exception {
        Ok(())
    } else {
        Err(ErrorKind::primitive(
            primitive,
            format!("{} is not an exception", vm.print_string(value)),
        )
        .into())
    }
}

/// Raise the receiver. Never answers normally.
pub fn exception_signal(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    expect_exception(vm, "exception_signal", receiver)?;
    Err(vm.signal(receiver))
}

/// Set the message text, then raise.
pub fn exception_signal_with(
    vm: &mut VM,
    receiver: Value,
    args: &[Value],
) -> Result<Value, Unwind> {
    let &[text] = args else {
        return Err(ErrorKind::WrongArgumentCount { expected: 1, got: args.len() }.into());
    };
    expect_exception(vm, "exception_signal_with", receiver)?;
    vm.set_message_text(receiver, text);
    Err(vm.signal(receiver))
}

/// `nil` until a text is given.
pub fn exception_message_text(
    vm: &mut VM,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, Unwind> {
    expect_exception(vm, "exception_message_text", receiver)?;
    let text = vm
        .message_text_slot(receiver)
        .and_then(|slot| Some(vm.heap.instance(receiver)?.instance_variable(slot)));
    Ok(text.unwrap_or(Value::NIL))
}
