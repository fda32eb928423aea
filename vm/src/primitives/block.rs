use log::debug;
use object::{Block, Payload, Value};

use crate::VM;
use crate::error::{ErrorKind, Unwind};
use crate::interpreter::call_block;
use crate::primitives::expect_class;

fn expect_block(vm: &VM, primitive: &'static str, value: Value) -> Result<Block, Unwind> {
    vm.heap.block(value).cloned().ok_or_else(|| {
        ErrorKind::primitive(
            primitive,
            format!("{} is not a block", vm.print_string(value)),
        )
        .into()
    })
}

/// `value`, `value:` and `value:value:`.
pub fn block_value(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    call_block(vm, receiver, args)
}

pub fn block_num_args(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    let block = expect_block(vm, "block_num_args", receiver)?;
    Ok(vm.new_integer(block.arg_count as i64))
}

/// `[body] on: ExceptionClass do: [:e | handler]`.
///
/// Runs the receiver with a handler for exactly `ExceptionClass` armed.
/// The handler is disarmed on every exit path before anything else runs.
/// A signal caught by it unwinds to here and the handler block's answer
/// becomes the answer of the whole expression.
pub fn block_on_do(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let &[class, handler] = args else {
        return Err(ErrorKind::WrongArgumentCount { expected: 2, got: args.len() }.into());
    };
    expect_block(vm, "block_on_do", receiver)?;
    let class = expect_class(vm, "block_on_do", class)?;
    let handler_block = expect_block(vm, "block_on_do", handler)?;

    let id = vm.handlers.push(class, handler);
    debug!("armed handler {id:?} for {}", vm.class_name(class));
    let result = call_block(vm, receiver, &[]);
    vm.handlers.remove(id);
    debug!("disarmed handler {id:?}");

    match result {
        Err(Unwind::Signal { handler: target, exception }) if target == id => {
            debug!(
                "handler {id:?} runs for {}",
                vm.print_string(exception)
            );
            if handler_block.arg_count == 0 {
                call_block(vm, handler, &[])
            } else {
                call_block(vm, handler, &[exception])
            }
        }
        other => other,
    }
}

/// A copy of the receiver bound to the context that sent `fixTemps`.
///
/// Sent from the host, where no context is live, the copy is unbound.
pub fn block_fix_temps(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    let block = expect_block(vm, "block_fix_temps", receiver)?;
    let bound = match vm.frames.last() {
        Some(context) => block.bound_to(context.id()),
        None => Block {
            outer_context: None,
            ..block
        },
    };
    Ok(vm
        .heap
        .allocate(Some(vm.specials.block), Payload::Block(bound)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MethodBuilder;

    fn int(n: i64) -> Value {
        Value::from_i64(n)
    }

    /// `[:a :b | a - b]`
    fn minus_block(vm: &mut VM) -> Value {
        let minus = vm.intern("-");
        let mut mb = MethodBuilder::new();
        mb.arguments(2)
            .push_temporary(0)
            .push_temporary(1)
            .send(minus, 1)
            .return_top();
        mb.build_block(vm, Value::NIL)
    }

    #[test]
    fn value_with_arguments() {
        let mut vm = VM::new();
        let block = minus_block(&mut vm);
        assert_eq!(vm.send(block, "value:value:", &[int(10), int(3)]), Ok(int(7)));
        assert_eq!(vm.send(block, "numArgs", &[]), Ok(int(2)));

        let error = vm.send(block, "value:", &[int(1)]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::WrongArgumentCount { expected: 2, got: 1 });
    }

    #[test]
    fn self_inside_a_block_is_its_receiver() {
        let mut vm = VM::new();
        let mut mb = MethodBuilder::new();
        mb.push_self().return_top();
        let block = mb.build_block(&mut vm, int(11));
        assert_eq!(vm.send(block, "value", &[]), Ok(int(11)));
    }

    #[test]
    fn fix_temps_from_the_host_is_unbound() {
        let mut vm = VM::new();
        let block = minus_block(&mut vm);
        let copy = vm.send(block, "fixTemps", &[]).unwrap();
        assert_ne!(copy, block);
        let copy = vm.heap.block(copy).unwrap();
        assert_eq!(copy.outer_context, None);
        assert_eq!(copy.arg_count, 2);
    }

    #[test]
    fn fix_temps_binds_the_sending_context() {
        let mut vm = VM::new();
        let fix_temps = vm.intern("fixTemps");
        let mut body = MethodBuilder::new();
        body.push_constant(int(1)).return_top();
        let block = body.build_block(&mut vm, Value::NIL);

        let mut mb = MethodBuilder::new();
        mb.push_constant(block).send(fix_temps, 0).return_top();
        let method = mb.build(&mut vm, "bind");
        let bound = vm.execute(method, Value::NIL, &[]).unwrap();
        assert!(vm.heap.block(bound).unwrap().outer_context.is_some());
        assert_eq!(vm.heap.block(block).unwrap().outer_context, None);
    }

    #[test]
    fn on_do_rejects_bad_arguments() {
        let mut vm = VM::new();
        let block = minus_block(&mut vm);
        let error_class = vm.specials.error;
        let error = vm
            .send(block, "on:do:", &[int(3), block])
            .unwrap_err();
        assert!(matches!(
            error.kind,
            ErrorKind::PrimitiveFailed { primitive: "block_on_do", .. }
        ));
        let error = vm
            .send(block, "on:do:", &[error_class, int(3)])
            .unwrap_err();
        assert!(matches!(
            error.kind,
            ErrorKind::PrimitiveFailed { primitive: "block_on_do", .. }
        ));
        assert_eq!(vm.handlers.depth(), 0);
    }

    #[test]
    fn on_do_without_a_signal_answers_the_body() {
        let mut vm = VM::new();
        let mut body = MethodBuilder::new();
        body.push_constant(int(5)).return_top();
        let body = body.build_block(&mut vm, Value::NIL);
        let mut handler = MethodBuilder::new();
        handler.push_constant(int(-1)).return_top();
        let handler = handler.build_block(&mut vm, Value::NIL);

        let error_class = vm.specials.error;
        assert_eq!(vm.send(body, "on:do:", &[error_class, handler]), Ok(int(5)));
        assert!(vm.handlers.is_empty());
    }
}
