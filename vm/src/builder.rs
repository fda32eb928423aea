use bytecode::{BytecodeBuilder, Label, Op};
use object::{Method, Payload, Value, selector_arity};

use crate::VM;

/// Assembles a method record: bytecode, literal pool and frame layout.
///
/// Emitters return `&mut Self` so instruction sequences chain:
///
/// ```ignore
/// let mut mb = MethodBuilder::new();
/// mb.push_self().push_constant(Value::from_i64(1)).send(plus, 1).return_top();
/// let method = mb.build(&mut vm, "increment");
/// ```
#[derive(Debug, Default, Clone)]
pub struct MethodBuilder {
    code: BytecodeBuilder,
    literals: Vec<Value>,
    temp_names: Vec<String>,
    arg_count: Option<usize>,
    primitive: Option<&'static str>,
}

impl MethodBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the literal pool, reusing an identical entry.
    pub fn literal(&mut self, value: Value) -> u32 {
        let index = match self.literals.iter().position(|&v| v == value) {
            Some(index) => index,
            None => {
                self.literals.push(value);
                self.literals.len() - 1
            }
        };
        assert!(index <= u32::MAX as usize, "literal pool exhausted");
        index as u32
    }

    /// Override the argument count derived from the selector.
    pub fn arguments(&mut self, count: usize) -> &mut Self {
        self.arg_count = Some(count);
        self
    }

    /// Declare temporaries; they follow the arguments in the frame.
    pub fn temporaries(&mut self, names: &[&str]) -> &mut Self {
        self.temp_names.extend(names.iter().map(|n| (*n).to_owned()));
        self
    }

    /// Make the method primitive. Any emitted bytecode is kept but never run.
    pub fn primitive(&mut self, name: &'static str) -> &mut Self {
        self.primitive = Some(name);
        self
    }

    pub fn current_offset(&self) -> usize {
        self.code.current_offset()
    }

    // ── emitters ───────────────────────────────────────────────────

    pub fn push_literal(&mut self, index: u32) -> &mut Self {
        self.code.push_literal(index);
        self
    }

    /// Push `value` through the literal pool.
    pub fn push_constant(&mut self, value: Value) -> &mut Self {
        let index = self.literal(value);
        self.push_literal(index)
    }

    pub fn push_self(&mut self) -> &mut Self {
        self.code.push_self();
        self
    }

    pub fn push_instance_variable(&mut self, index: u32) -> &mut Self {
        self.code.push_instance_variable(index);
        self
    }

    pub fn push_temporary(&mut self, index: u32) -> &mut Self {
        self.code.push_temporary_variable(index);
        self
    }

    pub fn store_instance_variable(&mut self, index: u32) -> &mut Self {
        self.code.store_instance_variable(index);
        self
    }

    pub fn store_temporary(&mut self, index: u32) -> &mut Self {
        self.code.store_temporary_variable(index);
        self
    }

    /// Send the symbol `selector` with `argc` arguments.
    pub fn send(&mut self, selector: Value, argc: u32) -> &mut Self {
        let index = self.literal(selector);
        self.send_literal(index, argc)
    }

    /// Send using an existing literal slot as the selector.
    pub fn send_literal(&mut self, index: u32, argc: u32) -> &mut Self {
        self.code.send_message(index, argc);
        self
    }

    pub fn return_top(&mut self) -> &mut Self {
        self.code.return_stack_top();
        self
    }

    pub fn pop(&mut self) -> &mut Self {
        self.code.pop();
        self
    }

    pub fn duplicate(&mut self) -> &mut Self {
        self.code.duplicate();
        self
    }

    /// Emit a jump with a literal offset, unchecked.
    pub fn jump_raw(&mut self, op: Op, offset: i32) -> &mut Self {
        self.code.jump_raw(op, offset);
        self
    }

    // ── control flow ───────────────────────────────────────────────

    pub fn jump(&mut self) -> Label {
        self.code.jump()
    }

    pub fn jump_if_true(&mut self) -> Label {
        self.code.jump_if_true()
    }

    pub fn jump_if_false(&mut self) -> Label {
        self.code.jump_if_false()
    }

    /// Point `label` at the next emitted instruction.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.code.bind(label);
        self
    }

    /// Unconditional jump to an already emitted offset.
    pub fn jump_back(&mut self, target: usize) -> &mut Self {
        self.code.jump_back(target);
        self
    }

    pub fn jump_back_if_true(&mut self, target: usize) -> &mut Self {
        self.code.jump_back_if_true(target);
        self
    }

    pub fn jump_back_if_false(&mut self, target: usize) -> &mut Self {
        self.code.jump_back_if_false(target);
        self
    }

    // ── finishing ──────────────────────────────────────────────────

    fn record(&self, vm: &mut VM, selector: &str, default_args: usize) -> Method {
        let selector_value = vm.intern(selector);
        let arg_count = self.arg_count.unwrap_or(default_args);
        let method = Method::new(
            selector_value,
            arg_count,
            self.code.as_bytes().to_vec(),
            self.literals.clone(),
            self.temp_names.clone(),
        );
        match self.primitive {
            Some(name) => {
                let Some(index) = vm.primitive_index(name) else {
                    panic!("unknown primitive {name:?}");
                };
                method.with_primitive(index)
            }
            None => method,
        }
    }

    /// Allocate the method on the VM's heap.
    ///
    /// # Panics
    ///
    /// Panics if a primitive name was given that the VM does not register.
    pub fn build(&self, vm: &mut VM, selector: &str) -> Value {
        let method = self.record(vm, selector, selector_arity(selector));
        vm.heap
            .allocate(Some(vm.specials.method), Payload::Method(method))
    }

    /// Build and install into `class`.
    pub fn install(&self, vm: &mut VM, class: Value, selector: &str) -> Value {
        let method = self.build(vm, selector);
        vm.install_method(class, method);
        method
    }

    /// Build a block whose body is this method. Blocks take no arguments
    /// unless [`arguments`](Self::arguments) says otherwise.
    pub fn build_block(&self, vm: &mut VM, receiver: Value) -> Value {
        let method = self.record(vm, "[]", 0);
        let method = vm
            .heap
            .allocate(Some(vm.specials.method), Payload::Method(method));
        vm.new_block(method, receiver)
    }
}
