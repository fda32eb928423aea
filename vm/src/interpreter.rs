use bytecode::{Instruction, Op, decode_at, jump_destination};
use log::{debug, trace, warn};
use object::{ContextId, LookupResult, Value, lookup};

use crate::VM;
use crate::context::Context;
use crate::error::{ErrorKind, FormatError, FrameInfo, RuntimeError, Unwind};

/// Every nested context recurses on the native stack; grow it by
/// `STACK_GROW_SIZE` once less than `STACK_RED_ZONE` remains.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

fn malformed(op: Option<Op>, pc: usize, error: FormatError) -> Unwind {
    ErrorKind::Format { op, pc, error }.into()
}

/// Run `method` on `receiver`, converting anything that escapes into a
/// [`RuntimeError`].
pub fn execute(
    vm: &mut VM,
    method: Value,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let result = invoke(vm, method, receiver, args, None);
    settle(vm, result)
}

/// Host-level message send.
pub fn send_message(
    vm: &mut VM,
    receiver: Value,
    selector: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let result = send(vm, receiver, selector, args);
    settle(vm, result)
}

fn settle(vm: &VM, result: Result<Value, Unwind>) -> Result<Value, RuntimeError> {
    match result {
        Ok(value) => Ok(value),
        Err(Unwind::Fatal(error)) => {
            warn!("execution aborted: {error}");
            Err(error)
        }
        // The handler was removed before the signal reached it.
        Err(Unwind::Signal { exception, .. }) => {
            let class = vm.class_name(vm.class_of(exception));
            warn!("unhandled {class}");
            Err(ErrorKind::UnhandledException { exception, class }.into())
        }
    }
}

/// Look up `selector` on `receiver` and run what it finds.
pub(crate) fn send(
    vm: &mut VM,
    receiver: Value,
    selector: &str,
    args: &[Value],
) -> Result<Value, Unwind> {
    if receiver.is_nil() {
        return Err(ErrorKind::NilReceiver {
            selector: selector.to_owned(),
        }
        .into());
    }
    let method = match lookup(&vm.heap, &vm.specials, receiver, selector) {
        LookupResult::Found { method, .. } => method,
        LookupResult::None => {
            return Err(ErrorKind::MessageNotUnderstood {
                class: vm.class_name(vm.class_of(receiver)),
                selector: selector.to_owned(),
            }
            .into());
        }
    };
    if vm.heap.method(method).is_some_and(|m| !m.is_primitive()) {
        debug!(
            "send #{selector} to {} (depth {})",
            vm.class_name(vm.class_of(receiver)),
            vm.frames.len()
        );
    }
    invoke(vm, method, receiver, args, None)
}

/// Run a method: primitives directly, bytecode methods in a new context.
///
/// `home` is the context a block was bound to.
pub(crate) fn invoke(
    vm: &mut VM,
    method: Value,
    receiver: Value,
    args: &[Value],
    home: Option<ContextId>,
) -> Result<Value, Unwind> {
    let Some(record) = vm.heap.method(method) else {
        return Err(ErrorKind::NotAMethod { value: method }.into());
    };
    if args.len() != record.arg_count() {
        return Err(ErrorKind::WrongArgumentCount {
            expected: record.arg_count(),
            got: args.len(),
        }
        .into());
    }
    if let Some(index) = record.primitive_index() {
        return call_primitive(vm, index, receiver, args);
    }
    let frame_size = record.frame_size();
    run_method(vm, method, frame_size, receiver, args, home)
}

/// O(1) dispatch into the primitive table.
pub(crate) fn call_primitive(
    vm: &mut VM,
    index: u16,
    receiver: Value,
    args: &[Value],
) -> Result<Value, Unwind> {
    let Some(desc) = vm.primitives.get(usize::from(index)).copied() else {
        return Err(ErrorKind::UnknownPrimitive { index }.into());
    };
    if args.len() != desc.arity {
        return Err(ErrorKind::WrongArgumentCount {
            expected: desc.arity,
            got: args.len(),
        }
        .into());
    }
    (desc.func)(vm, receiver, args)
}

/// Invoke a block with `args`. The block context falls back to the block's
/// bound context in lexical mode.
pub(crate) fn call_block(
    vm: &mut VM,
    block: Value,
    args: &[Value],
) -> Result<Value, Unwind> {
    let Some(b) = vm.heap.block(block).cloned() else {
        return Err(ErrorKind::primitive(
            "block_value",
            format!("{} is not a block", vm.print_string(block)),
        )
        .into());
    };
    if args.len() != b.arg_count {
        return Err(ErrorKind::WrongArgumentCount {
            expected: b.arg_count,
            got: args.len(),
        }
        .into());
    }
    invoke(vm, b.method, b.receiver, args, b.outer_context)
}

fn run_method(
    vm: &mut VM,
    method: Value,
    frame_size: usize,
    receiver: Value,
    args: &[Value],
    home: Option<ContextId>,
) -> Result<Value, Unwind> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        run_context(vm, method, frame_size, receiver, args, home)
    })
}

fn run_context(
    vm: &mut VM,
    method: Value,
    frame_size: usize,
    receiver: Value,
    args: &[Value],
    home: Option<ContextId>,
) -> Result<Value, Unwind> {
    let depth = vm.frames.len();
    if depth >= vm.settings.max_depth {
        return Err(ErrorKind::StackOverflow { depth }.into());
    }

    let id = vm.next_context_id();
    let mut context = Context::new(
        id,
        method,
        receiver,
        args,
        frame_size,
        vm.settings.stack_capacity,
    );
    context.sender = depth.checked_sub(1);
    context.home = home;
    vm.frames.push(context);

    let result = match run(vm, depth) {
        Err(Unwind::Fatal(error)) => {
            Err(Unwind::Fatal(error.with_frame(frame_info(vm, depth))))
        }
        other => other,
    };
    vm.frames.truncate(depth);
    result
}

fn frame_info(vm: &VM, frame_idx: usize) -> FrameInfo {
    let frame = &vm.frames[frame_idx];
    let record = vm.heap.method(frame.method());
    let selector = record
        .and_then(|m| vm.heap.symbol(m.selector()))
        .unwrap_or("?")
        .to_owned();
    let class = record
        .and_then(|m| m.class())
        .unwrap_or_else(|| vm.class_of(frame.receiver()));
    FrameInfo {
        class: vm.class_name(class),
        selector,
        pc: frame.pc,
    }
}

fn run(vm: &mut VM, frame_idx: usize) -> Result<Value, Unwind> {
    loop {
        if let Some(result) = step(vm, frame_idx)? {
            return Ok(result);
        }
    }
}

/// Execute one instruction of the context at `frame_idx`. Answers the
/// context's result when it returns.
fn step(vm: &mut VM, frame_idx: usize) -> Result<Option<Value>, Unwind> {
    let frame = &vm.frames[frame_idx];
    let pc = frame.pc;
    let method = frame.method();
    let receiver = frame.receiver();

    let (instruction, len) = {
        let Some(record) = vm.heap.method(method) else {
            return Err(ErrorKind::NotAMethod { value: method }.into());
        };
        let code = record.bytecodes();
        if pc >= code.len() {
            // Falling off the end returns the stack top.
            let result = vm.frames[frame_idx].pop().unwrap_or(Value::NIL);
            return Ok(Some(result));
        }
        let instruction = decode_at(code, pc)
            .map_err(|e| malformed(None, pc, e.into()))?;
        (instruction, code.len())
    };
    trace!("{pc:04} {instruction}");

    let op = instruction.op();
    let fail = |error: FormatError| malformed(Some(op), pc, error);
    let mut next_pc = pc + instruction.size();

    match instruction {
        Instruction::PushLiteral { index } => {
            let value = literal(vm, method, index).map_err(fail)?;
            vm.frames[frame_idx].push(value);
        }
        Instruction::PushInstanceVariable { index } => {
            let instance = vm
                .heap
                .instance(receiver)
                .ok_or_else(|| fail(FormatError::NoInstanceVariables))?;
            check_instance_variable(index, instance.len()).map_err(fail)?;
            let value = instance.instance_variable(index as usize);
            vm.frames[frame_idx].push(value);
        }
        Instruction::PushTemporaryVariable { index } => {
            let owner = temp_owner(vm, frame_idx, index)
                .ok_or_else(|| fail(FormatError::TemporaryIndex { index }))?;
            let value = vm.frames[owner].temporary(index as usize);
            vm.frames[frame_idx].push(value);
        }
        Instruction::PushSelf => vm.frames[frame_idx].push(receiver),
        Instruction::StoreInstanceVariable { index } => {
            let value = vm.frames[frame_idx]
                .pop()
                .ok_or_else(|| fail(FormatError::StackUnderflow))?;
            let instance = vm
                .heap
                .instance_mut(receiver)
                .ok_or_else(|| fail(FormatError::NoInstanceVariables))?;
            check_instance_variable(index, instance.len()).map_err(fail)?;
            instance.set_instance_variable(index as usize, value);
            vm.frames[frame_idx].push(value);
        }
        Instruction::StoreTemporaryVariable { index } => {
            let value = vm.frames[frame_idx]
                .pop()
                .ok_or_else(|| fail(FormatError::StackUnderflow))?;
            let owner = temp_owner(vm, frame_idx, index)
                .ok_or_else(|| fail(FormatError::TemporaryIndex { index }))?;
            vm.frames[owner].set_temporary(index as usize, value);
            vm.frames[frame_idx].push(value);
        }
        Instruction::SendMessage { selector, argc } => {
            let literal = literal(vm, method, selector).map_err(fail)?;
            let name = vm
                .heap
                .symbol(literal)
                .ok_or_else(|| fail(FormatError::SelectorNotSymbol { index: selector }))?
                .to_owned();
            let frame = &mut vm.frames[frame_idx];
            if frame.stack().len() <= argc as usize {
                return Err(fail(FormatError::StackUnderflow));
            }
            let args = frame
                .pop_n(argc as usize)
                .ok_or_else(|| fail(FormatError::StackUnderflow))?;
            let target = frame
                .pop()
                .ok_or_else(|| fail(FormatError::StackUnderflow))?;
            let result = send(vm, target, &name, &args)?;
            vm.frames[frame_idx].push(result);
        }
        Instruction::ReturnStackTop => {
            let result = vm.frames[frame_idx].pop().unwrap_or(Value::NIL);
            return Ok(Some(result));
        }
        Instruction::Jump { .. } => {
            next_pc = jump_target(pc, instruction, len).map_err(fail)?;
        }
        Instruction::JumpIfTrue { .. } | Instruction::JumpIfFalse { .. } => {
            let condition = vm.frames[frame_idx]
                .pop()
                .ok_or_else(|| fail(FormatError::StackUnderflow))?;
            let polarity = matches!(instruction, Instruction::JumpIfTrue { .. });
            if condition.is_true() == polarity {
                next_pc = jump_target(pc, instruction, len).map_err(fail)?;
            }
        }
        Instruction::Pop => {
            vm.frames[frame_idx]
                .pop()
                .ok_or_else(|| fail(FormatError::StackUnderflow))?;
        }
        Instruction::Duplicate => {
            let frame = &mut vm.frames[frame_idx];
            let top = frame
                .top()
                .ok_or_else(|| fail(FormatError::StackUnderflow))?;
            frame.push(top);
        }
    }

    vm.frames[frame_idx].pc = next_pc;
    Ok(None)
}

fn literal(vm: &VM, method: Value, index: u32) -> Result<Value, FormatError> {
    let literals = vm.heap.method(method).map(|m| m.literals()).unwrap_or(&[]);
    literals
        .get(index as usize)
        .copied()
        .ok_or(FormatError::LiteralIndex {
            index,
            len: literals.len(),
        })
}

fn check_instance_variable(index: u32, len: usize) -> Result<(), FormatError> {
    if (index as usize) < len {
        Ok(())
    } else {
        Err(FormatError::InstanceVariableIndex { index, len })
    }
}

/// Resolve a jump to an absolute offset inside the bytecode.
fn jump_target(
    pc: usize,
    instruction: Instruction,
    len: usize,
) -> Result<usize, FormatError> {
    let target = jump_destination(pc, instruction).unwrap_or(pc as i64);
    if (0..len as i64).contains(&target) {
        Ok(target as usize)
    } else {
        Err(FormatError::JumpTarget { target, len })
    }
}

/// Frame whose temporaries hold `index`.
///
/// The current context first; past its frame, one outer context: the
/// sender, or in lexical mode the context the block was bound to.
fn temp_owner(vm: &VM, frame_idx: usize, index: u32) -> Option<usize> {
    let index = index as usize;
    let frame = &vm.frames[frame_idx];
    if index < frame.temp_count() {
        return Some(frame_idx);
    }
    let outer = if vm.settings.lexical_block_scope {
        let home = frame.home?;
        vm.frames[..frame_idx].iter().rposition(|f| f.id() == home)?
    } else {
        frame.sender?
    };
    (index < vm.frames[outer].temp_count()).then_some(outer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MethodBuilder, VmSettings};

    fn int(n: i64) -> Value {
        Value::from_i64(n)
    }

    /// `returnValue` on Integer: answers 42.
    fn install_return_value(vm: &mut VM) {
        let integer = vm.specials.integer;
        let mut mb = MethodBuilder::new();
        mb.push_constant(int(42)).return_top();
        mb.install(vm, integer, "returnValue");
    }

    fn format_error(result: Result<Value, RuntimeError>) -> FormatError {
        match result.map(|_| ()).unwrap_err().kind {
            ErrorKind::Format { error, .. } => error,
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    // ── end-to-end ─────────────────────────────────────────────────

    #[test]
    fn literal_is_returned() {
        let mut vm = VM::new();
        let mut mb = MethodBuilder::new();
        mb.push_literal(0).return_top();
        let index = mb.literal(int(42));
        assert_eq!(index, 0);
        let method = mb.build(&mut vm, "answer");

        for receiver in [Value::NIL, int(3), Value::TRUE] {
            assert_eq!(vm.execute(method, receiver, &[]), Ok(int(42)));
        }
    }

    #[test]
    fn nested_send_preserves_caller_stack() {
        let mut vm = VM::new();
        install_return_value(&mut vm);
        let selector = vm.intern("returnValue");

        let mut mb = MethodBuilder::new();
        mb.push_constant(int(10))
            .push_self()
            .send(selector, 0)
            .return_top();
        let caller = mb.build(&mut vm, "caller");
        assert_eq!(vm.execute(caller, int(5), &[]), Ok(int(42)));

        // The 10 pushed before the send is still beneath the result.
        let mut mb = MethodBuilder::new();
        mb.push_constant(int(10))
            .push_self()
            .send(selector, 0)
            .pop()
            .return_top();
        let caller = mb.build(&mut vm, "caller");
        assert_eq!(vm.execute(caller, int(5), &[]), Ok(int(10)));
        assert_eq!(vm.depth(), 0);
    }

    #[test]
    fn result_of_send_feeds_primitive() {
        let mut vm = VM::new();
        install_return_value(&mut vm);
        let return_value = vm.intern("returnValue");
        let times = vm.intern("*");

        let mut mb = MethodBuilder::new();
        mb.push_self()
            .push_self()
            .send(return_value, 0)
            .send(times, 1)
            .return_top();
        let method = mb.build(&mut vm, "multiply");
        assert_eq!(vm.execute(method, int(5), &[]), Ok(int(210)));
    }

    #[test]
    fn arguments_are_bound_left_to_right() {
        let mut vm = VM::new();
        let object = vm.specials.object;
        let minus = vm.intern("-");
        // a: x b: y  ^ x - y
        let mut mb = MethodBuilder::new();
        mb.push_temporary(0)
            .push_temporary(1)
            .send(minus, 1)
            .return_top();
        mb.install(&mut vm, object, "a:b:");

        let mut caller = MethodBuilder::new();
        let selector = vm.intern("a:b:");
        caller
            .push_self()
            .push_constant(int(10))
            .push_constant(int(3))
            .send(selector, 2)
            .return_top();
        let method = caller.build(&mut vm, "run");
        assert_eq!(vm.execute(method, Value::TRUE, &[]), Ok(int(7)));
    }

    #[test]
    fn stores_answer_the_stored_value() {
        let mut vm = VM::new();
        let point = vm
            .define_class("Point", Some(vm.specials.object), &["x", "y"])
            .unwrap();
        let p = vm.new_instance(point).unwrap();

        let mut mb = MethodBuilder::new();
        mb.temporaries(&["t"])
            .push_constant(int(3))
            .store_instance_variable(1)
            .store_temporary(0)
            .pop()
            .push_temporary(0)
            .return_top();
        let method = mb.build(&mut vm, "setY");
        assert_eq!(vm.execute(method, p, &[]), Ok(int(3)));
        assert_eq!(vm.heap.instance(p).unwrap().instance_variable(1), int(3));
        assert_eq!(vm.heap.instance(p).unwrap().instance_variable(0), Value::NIL);
    }

    #[test]
    fn subclass_instance_variables_keep_offsets() {
        let mut vm = VM::new();
        let point = vm
            .define_class("Point", Some(vm.specials.object), &["x", "y"])
            .unwrap();
        let point3 = vm.define_class("Point3", Some(point), &["z"]).unwrap();

        let mut mb = MethodBuilder::new();
        mb.push_instance_variable(1).return_top();
        mb.install(&mut vm, point, "y");

        let q = vm.new_instance(point3).unwrap();
        vm.heap.instance_mut(q).unwrap().set_instance_variable(1, int(8));
        assert_eq!(vm.send(q, "y", &[]), Ok(int(8)));
    }

    #[test]
    fn empty_stack_returns_nil() {
        let mut vm = VM::new();
        let mut mb = MethodBuilder::new();
        mb.return_top();
        let method = mb.build(&mut vm, "nothing");
        assert_eq!(vm.execute(method, int(1), &[]), Ok(Value::NIL));

        let empty = MethodBuilder::new().build(&mut vm, "empty");
        assert_eq!(vm.execute(empty, int(1), &[]), Ok(Value::NIL));
    }

    #[test]
    fn falling_off_the_end_returns_top() {
        let mut vm = VM::new();
        let mut mb = MethodBuilder::new();
        mb.push_constant(int(1)).push_constant(int(2));
        let method = mb.build(&mut vm, "twoThings");
        assert_eq!(vm.execute(method, Value::TRUE, &[]), Ok(int(2)));
    }

    #[test]
    fn duplicate_does_not_pop() {
        let mut vm = VM::new();
        let plus = vm.intern("+");
        let mut mb = MethodBuilder::new();
        mb.push_constant(int(21)).duplicate().send(plus, 1).return_top();
        let method = mb.build(&mut vm, "double");
        assert_eq!(vm.execute(method, Value::NIL, &[]), Ok(int(42)));
    }

    // ── jumps ──────────────────────────────────────────────────────

    fn conditional(vm: &mut VM, jump_if_true: bool, condition: Value) -> Value {
        let mut mb = MethodBuilder::new();
        mb.push_constant(condition);
        let label = if jump_if_true {
            mb.jump_if_true()
        } else {
            mb.jump_if_false()
        };
        mb.push_constant(int(1)).return_top();
        mb.bind(label);
        mb.push_constant(int(2)).return_top();
        let method = mb.build(vm, "branch");
        vm.execute(method, Value::NIL, &[]).unwrap()
    }

    #[test]
    fn conditional_jumps_follow_truth() {
        let mut vm = VM::new();
        // Taken jumps land on `2`, fall-through answers `1`.
        assert_eq!(conditional(&mut vm, true, Value::TRUE), int(2));
        assert_eq!(conditional(&mut vm, true, Value::FALSE), int(1));
        assert_eq!(conditional(&mut vm, false, Value::FALSE), int(2));
        assert_eq!(conditional(&mut vm, false, Value::TRUE), int(1));
        // Only `true` is true.
        assert_eq!(conditional(&mut vm, true, Value::NIL), int(1));
        assert_eq!(conditional(&mut vm, true, int(0)), int(1));
        assert_eq!(conditional(&mut vm, false, int(1)), int(2));
    }

    #[test]
    fn jump_target_counts_from_next_instruction() {
        let code = [
            bytecode::Op::JumpIfTrue as u8, 0, 0, 0, 3,
            bytecode::Op::Pop as u8,
        ];
        let jump = decode_at(&code, 0).unwrap();
        assert_eq!(jump.size(), 5);
        assert_eq!(jump_target(0, jump, 9), Ok(8));
        assert_eq!(
            jump_target(0, jump, 8),
            Err(FormatError::JumpTarget { target: 8, len: 8 })
        );
    }

    #[test]
    fn backward_jump_loops() {
        let mut vm = VM::new();
        let le = vm.intern("<=");
        let plus = vm.intern("+");
        // sum := 0. i := 1. [i <= 10] whileTrue: [sum := sum + i. i := i + 1]. ^sum
        let mut mb = MethodBuilder::new();
        mb.temporaries(&["sum", "i"])
            .push_constant(int(0))
            .store_temporary(0)
            .pop()
            .push_constant(int(1))
            .store_temporary(1)
            .pop();
        let top = mb.current_offset();
        mb.push_temporary(1).push_constant(int(10)).send(le, 1);
        let exit = mb.jump_if_false();
        mb.push_temporary(0)
            .push_temporary(1)
            .send(plus, 1)
            .store_temporary(0)
            .pop()
            .push_temporary(1)
            .push_constant(int(1))
            .send(plus, 1)
            .store_temporary(1)
            .pop()
            .jump_back(top);
        mb.bind(exit);
        mb.push_temporary(0).return_top();
        let method = mb.build(&mut vm, "sum");
        assert_eq!(vm.execute(method, Value::NIL, &[]), Ok(int(55)));
    }

    #[test]
    fn jump_outside_bytecode_is_malformed() {
        let mut vm = VM::new();
        let mut mb = MethodBuilder::new();
        mb.jump_raw(bytecode::Op::Jump, 100);
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, Value::NIL, &[])),
            FormatError::JumpTarget { target: 105, len: 5 }
        );

        let mut mb = MethodBuilder::new();
        mb.jump_raw(bytecode::Op::Jump, -6);
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, Value::NIL, &[])),
            FormatError::JumpTarget { target: -1, len: 5 }
        );
    }

    // ── format errors ──────────────────────────────────────────────

    #[test]
    fn literal_index_is_checked() {
        let mut vm = VM::new();
        let mut mb = MethodBuilder::new();
        mb.push_constant(int(1)).push_literal(1).return_top();
        let method = mb.build(&mut vm, "bad");
        let error = vm.execute(method, Value::NIL, &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Format {
            op: Some(bytecode::Op::PushLiteral),
            pc: 5,
            error: FormatError::LiteralIndex { index: 1, len: 1 },
        });
        assert_eq!(error.call_stack.len(), 1);
        assert_eq!(error.call_stack[0].selector, "bad");
        assert_eq!(error.call_stack[0].pc, 5);
    }

    #[test]
    fn instance_variable_index_is_checked() {
        let mut vm = VM::new();
        let point = vm
            .define_class("Point", Some(vm.specials.object), &["x", "y"])
            .unwrap();
        let p = vm.new_instance(point).unwrap();

        for index in [0, 1] {
            let mut mb = MethodBuilder::new();
            mb.push_instance_variable(index).return_top();
            let method = mb.build(&mut vm, "ok");
            assert_eq!(vm.execute(method, p, &[]), Ok(Value::NIL));
        }

        let mut mb = MethodBuilder::new();
        mb.push_instance_variable(2).return_top();
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, p, &[])),
            FormatError::InstanceVariableIndex { index: 2, len: 2 }
        );

        let mut mb = MethodBuilder::new();
        mb.push_constant(int(1)).store_instance_variable(2).return_top();
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, p, &[])),
            FormatError::InstanceVariableIndex { index: 2, len: 2 }
        );

        let mut mb = MethodBuilder::new();
        mb.push_instance_variable(0).return_top();
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, int(3), &[])),
            FormatError::NoInstanceVariables
        );
    }

    #[test]
    fn temporary_index_is_checked() {
        let mut vm = VM::new();
        let mut mb = MethodBuilder::new();
        mb.temporaries(&["a", "b"])
            .push_temporary(1)
            .pop()
            .push_temporary(2)
            .return_top();
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, Value::NIL, &[])),
            FormatError::TemporaryIndex { index: 2 }
        );
    }

    #[test]
    fn selector_must_be_a_symbol() {
        let mut vm = VM::new();
        let mut mb = MethodBuilder::new();
        let not_a_symbol = mb.literal(int(7));
        mb.push_self().send_literal(not_a_symbol, 0).return_top();
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, int(1), &[])),
            FormatError::SelectorNotSymbol { index: 0 }
        );

        let text = vm.new_string("size");
        let mut mb = MethodBuilder::new();
        mb.push_self().send(text, 0).return_top();
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, int(1), &[])),
            FormatError::SelectorNotSymbol { index: 0 }
        );
    }

    #[test]
    fn send_without_receiver_underflows() {
        let mut vm = VM::new();
        let plus = vm.intern("+");
        let mut mb = MethodBuilder::new();
        mb.push_constant(int(1)).send(plus, 1).return_top();
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, Value::NIL, &[])),
            FormatError::StackUnderflow
        );
    }

    #[test]
    fn pop_on_empty_stack_underflows() {
        let mut vm = VM::new();
        let mut mb = MethodBuilder::new();
        mb.pop();
        let method = mb.build(&mut vm, "bad");
        assert_eq!(
            format_error(vm.execute(method, Value::NIL, &[])),
            FormatError::StackUnderflow
        );
    }

    #[test]
    fn invalid_opcode_is_malformed() {
        let mut vm = VM::new();
        let selector = vm.intern("bad");
        let method = vm.heap.allocate(
            Some(vm.specials.method),
            object::Payload::Method(object::Method::new(
                selector,
                0,
                vec![0xEE],
                vec![],
                vec![],
            )),
        );
        let error = vm.execute(method, Value::NIL, &[]).unwrap_err();
        assert!(matches!(
            error.kind,
            ErrorKind::Format {
                op: None,
                pc: 0,
                error: FormatError::Decode(_),
            }
        ));
    }

    // ── dispatch failures ──────────────────────────────────────────

    #[test]
    fn nil_receiver_is_fatal() {
        let mut vm = VM::new();
        let size = vm.intern("size");
        let mut mb = MethodBuilder::new();
        mb.push_constant(Value::NIL).send(size, 0).return_top();
        let method = mb.build(&mut vm, "bad");
        let error = vm.execute(method, int(1), &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::NilReceiver {
            selector: "size".into()
        });
    }

    #[test]
    fn missing_method_is_fatal_with_context_chain() {
        let mut vm = VM::new();
        let object = vm.specials.object;
        let fly = vm.intern("fly");
        let mut inner = MethodBuilder::new();
        inner.push_self().send(fly, 0).return_top();
        inner.install(&mut vm, object, "inner");

        let inner_selector = vm.intern("inner");
        let mut outer = MethodBuilder::new();
        outer.push_self().send(inner_selector, 0).return_top();
        let method = outer.install(&mut vm, object, "outer");

        let error = vm.execute(method, int(4), &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::MessageNotUnderstood {
            class: "Integer".into(),
            selector: "fly".into(),
        });
        let frames: Vec<_> = error
            .call_stack
            .iter()
            .map(|f| (f.class.as_str(), f.selector.as_str(), f.pc))
            .collect();
        assert_eq!(frames, vec![("Object", "inner", 1), ("Object", "outer", 1)]);
        assert!(error.to_string().contains("at Object>>inner (pc 1)"));
        assert_eq!(vm.depth(), 0);
    }

    #[test]
    fn argument_count_must_match() {
        let mut vm = VM::new();
        let plus = vm.intern("+");
        let mut mb = MethodBuilder::new();
        mb.push_constant(int(1)).push_constant(int(2)).push_constant(int(3));
        mb.send(plus, 2).return_top();
        let method = mb.build(&mut vm, "bad");
        let error = vm.execute(method, Value::NIL, &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::WrongArgumentCount {
            expected: 1,
            got: 2
        });

        let mut mb = MethodBuilder::new();
        mb.push_constant(int(1)).return_top();
        let unary = mb.build(&mut vm, "one");
        let error = vm.execute(unary, Value::NIL, &[int(1)]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::WrongArgumentCount {
            expected: 0,
            got: 1
        });
    }

    #[test]
    fn executing_a_non_method_is_fatal() {
        let mut vm = VM::new();
        let error = vm.execute(int(3), Value::NIL, &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotAMethod { value: int(3) });
    }

    #[test]
    fn unbounded_recursion_overflows() {
        let mut vm = VM::with_settings(VmSettings {
            max_depth: 32,
            ..VmSettings::default()
        });
        let object = vm.specials.object;
        let recurse = vm.intern("recurse");
        let mut mb = MethodBuilder::new();
        mb.push_self().send(recurse, 0).return_top();
        let method = mb.install(&mut vm, object, "recurse");

        let error = vm.execute(method, Value::TRUE, &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::StackOverflow { depth: 32 });
        assert_eq!(error.call_stack.len(), 32);
        assert_eq!(vm.depth(), 0);
    }

    #[test]
    fn default_depth_overflows_with_an_error() {
        let mut vm = VM::new();
        let max_depth = VmSettings::default().max_depth;
        let object = vm.specials.object;
        let recurse = vm.intern("recurse");
        let mut mb = MethodBuilder::new();
        mb.push_self().send(recurse, 0).return_top();
        let method = mb.install(&mut vm, object, "recurse");

        let error = vm.execute(method, Value::TRUE, &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::StackOverflow { depth: max_depth });
        assert_eq!(error.call_stack.len(), max_depth);
        assert_eq!(vm.depth(), 0);

        // The VM is still usable afterwards.
        let mut answer = MethodBuilder::new();
        answer.push_constant(int(7)).return_top();
        let answer = answer.build(&mut vm, "answer");
        assert_eq!(vm.execute(answer, Value::NIL, &[]), Ok(int(7)));
    }

    #[test]
    fn default_depth_overflows_through_blocks() {
        // `recurse  ^[self recurse] value`
        let mut vm = VM::new();
        let max_depth = VmSettings::default().max_depth;
        let object = vm.specials.object;
        let recurse = vm.intern("recurse");
        let value = vm.intern("value");

        let mut body = MethodBuilder::new();
        body.push_self().send(recurse, 0).return_top();
        let block = body.build_block(&mut vm, Value::TRUE);
        let mut mb = MethodBuilder::new();
        mb.push_constant(block).send(value, 0).return_top();
        let method = mb.install(&mut vm, object, "recurse");

        let error = vm.execute(method, Value::TRUE, &[]).unwrap_err();
        assert_eq!(error.kind, ErrorKind::StackOverflow { depth: max_depth });
        assert_eq!(vm.depth(), 0);
    }

    // ── temporaries of outer contexts ──────────────────────────────

    /// A method with one temp `x := 5` that evaluates `block` in place and
    /// answers `x` afterwards.
    fn run_block_in_place(vm: &mut VM, block: Value) -> (Value, Value) {
        let value = vm.intern("value");
        let mut mb = MethodBuilder::new();
        mb.temporaries(&["x", "r"])
            .push_constant(int(5))
            .store_temporary(0)
            .pop()
            .push_constant(block)
            .send(value, 0)
            .store_temporary(1)
            .pop()
            .push_temporary(0)
            .return_top();
        let method = mb.build(vm, "host");
        let x = vm.execute(method, Value::NIL, &[]).unwrap();
        let mut mb = MethodBuilder::new();
        mb.temporaries(&["x"])
            .push_constant(int(5))
            .store_temporary(0)
            .pop()
            .push_constant(block)
            .send(value, 0)
            .return_top();
        let method = mb.build(vm, "host");
        let answer = vm.execute(method, Value::NIL, &[]).unwrap();
        (answer, x)
    }

    #[test]
    fn block_reads_sender_temporaries() {
        let mut vm = VM::new();
        let mut body = MethodBuilder::new();
        body.push_temporary(0).return_top();
        let block = body.build_block(&mut vm, Value::NIL);
        let (answer, _) = run_block_in_place(&mut vm, block);
        assert_eq!(answer, int(5));
    }

    #[test]
    fn block_writes_sender_temporaries() {
        let mut vm = VM::new();
        let mut body = MethodBuilder::new();
        body.push_constant(int(9)).store_temporary(0).return_top();
        let block = body.build_block(&mut vm, Value::NIL);
        let (answer, x) = run_block_in_place(&mut vm, block);
        assert_eq!(answer, int(9));
        assert_eq!(x, int(9));
    }

    /// `outer` binds a block reading temp 0 and hands it to `call:`, which
    /// evaluates it. Temp 0 of `outer` is 7; temp 0 of `call:` is the block.
    fn block_called_elsewhere(settings: VmSettings) -> (VM, Value) {
        let mut vm = VM::with_settings(settings);
        let object = vm.specials.object;
        let value = vm.intern("value");
        let fix_temps = vm.intern("fixTemps");
        let call = vm.intern("call:");

        let mut callee = MethodBuilder::new();
        callee.push_temporary(0).send(value, 0).return_top();
        callee.install(&mut vm, object, "call:");

        let mut body = MethodBuilder::new();
        body.push_temporary(0).return_top();
        let block = body.build_block(&mut vm, Value::NIL);

        let mut outer = MethodBuilder::new();
        outer
            .temporaries(&["x"])
            .push_constant(int(7))
            .store_temporary(0)
            .pop()
            .push_self()
            .push_constant(block)
            .send(fix_temps, 0)
            .send(call, 1)
            .return_top();
        let method = outer.build(&mut vm, "outer");
        let answer = vm.execute(method, Value::TRUE, &[]).unwrap();
        (vm, answer)
    }

    #[test]
    fn sender_fallback_sees_the_caller_not_the_definer() {
        let (vm, answer) = block_called_elsewhere(VmSettings::default());
        assert_eq!(vm.print_string(answer), "a Block");
    }

    #[test]
    fn lexical_fallback_sees_the_bound_context() {
        let (_, answer) = block_called_elsewhere(VmSettings {
            lexical_block_scope: true,
            ..VmSettings::default()
        });
        assert_eq!(answer, int(7));
    }

    #[test]
    fn unbound_block_has_no_lexical_outer() {
        let mut vm = VM::with_settings(VmSettings {
            lexical_block_scope: true,
            ..VmSettings::default()
        });
        let mut body = MethodBuilder::new();
        body.push_temporary(0).return_top();
        let block = body.build_block(&mut vm, Value::NIL);
        let value = vm.intern("value");
        let mut mb = MethodBuilder::new();
        mb.temporaries(&["x"]).push_constant(block).send(value, 0).return_top();
        let method = mb.build(&mut vm, "host");
        let error = vm.execute(method, Value::NIL, &[]).unwrap_err();
        assert!(matches!(error.kind, ErrorKind::Format {
            error: FormatError::TemporaryIndex { index: 0 },
            ..
        }));
    }
}
