use crate::op::{OPERAND_WIDTH, Op};

/// A forward jump whose offset has not yet been resolved.
///
/// Created by [`BytecodeBuilder::jump`], [`BytecodeBuilder::jump_if_true`],
/// and [`BytecodeBuilder::jump_if_false`]. Resolve it with
/// [`BytecodeBuilder::bind`].
#[derive(Debug)]
#[must_use = "an unbound label leaves a zero-offset jump behind"]
pub struct Label {
    /// Position of the i32 offset bytes in the buffer.
    offset_pos: usize,
    /// Position right after the jump instruction (base for relative offset).
    base: usize,
}

/// Builds a bytecode byte sequence with big-endian 4-byte operands.
#[derive(Debug, Default, Clone)]
pub struct BytecodeBuilder {
    buf: Vec<u8>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_op(&mut self, op: Op) {
        self.buf.push(op as u8);
    }

    fn emit_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_indexed(&mut self, op: Op, index: u32) {
        self.emit_op(op);
        self.emit_u32(index);
    }

    fn relative(target: usize, base: usize) -> i32 {
        let delta = target as i64 - base as i64;
        i32::try_from(delta)
            .unwrap_or_else(|_| panic!("jump offset {delta} does not fit in i32"))
    }

    // ── instructions ───────────────────────────────────────────────

    /// `PushLiteral <index>`
    pub fn push_literal(&mut self, index: u32) {
        self.emit_indexed(Op::PushLiteral, index);
    }

    /// `PushInstanceVariable <index>`
    pub fn push_instance_variable(&mut self, index: u32) {
        self.emit_indexed(Op::PushInstanceVariable, index);
    }

    /// `PushTemporaryVariable <index>`
    pub fn push_temporary_variable(&mut self, index: u32) {
        self.emit_indexed(Op::PushTemporaryVariable, index);
    }

    pub fn push_self(&mut self) {
        self.emit_op(Op::PushSelf);
    }

    /// `StoreInstanceVariable <index>`
    pub fn store_instance_variable(&mut self, index: u32) {
        self.emit_indexed(Op::StoreInstanceVariable, index);
    }

    /// `StoreTemporaryVariable <index>`
    pub fn store_temporary_variable(&mut self, index: u32) {
        self.emit_indexed(Op::StoreTemporaryVariable, index);
    }

    /// `SendMessage <selector> <argc>`; `selector` indexes the literal pool.
    pub fn send_message(&mut self, selector: u32, argc: u32) {
        self.emit_op(Op::SendMessage);
        self.emit_u32(selector);
        self.emit_u32(argc);
    }

    pub fn return_stack_top(&mut self) {
        self.emit_op(Op::ReturnStackTop);
    }

    pub fn pop(&mut self) {
        self.emit_op(Op::Pop);
    }

    pub fn duplicate(&mut self) {
        self.emit_op(Op::Duplicate);
    }

    /// Emit a jump with an explicit relative offset.
    ///
    /// # Panics
    ///
    /// Panics if `op` is not a jump opcode.
    pub fn jump_raw(&mut self, op: Op, offset: i32) {
        assert!(op.is_jump(), "{op} is not a jump");
        self.emit_op(op);
        self.emit_i32(offset);
    }

    // ── labels ─────────────────────────────────────────────────────

    /// Emit an unconditional forward jump. Returns a [`Label`] to bind later.
    pub fn jump(&mut self) -> Label {
        self.emit_jump_placeholder(Op::Jump)
    }

    /// Emit a forward jump taken when the popped value is `true`.
    pub fn jump_if_true(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpIfTrue)
    }

    /// Emit a forward jump taken unless the popped value is `true`.
    pub fn jump_if_false(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpIfFalse)
    }

    /// Bind a forward jump label to the current position.
    ///
    /// Something must be emitted after the bind point: a jump target at the
    /// very end of the bytecode is rejected by the interpreter.
    pub fn bind(&mut self, label: Label) {
        let offset = Self::relative(self.buf.len(), label.base);
        self.buf[label.offset_pos..label.offset_pos + OPERAND_WIDTH]
            .copy_from_slice(&offset.to_be_bytes());
    }

    /// Emit an unconditional backward jump to `target` (a byte offset obtained
    /// from [`current_offset`](Self::current_offset)).
    pub fn jump_back(&mut self, target: usize) {
        self.emit_back(Op::Jump, target);
    }

    /// Emit a conditional backward jump (true) to `target`.
    pub fn jump_back_if_true(&mut self, target: usize) {
        self.emit_back(Op::JumpIfTrue, target);
    }

    /// Emit a conditional backward jump (not true) to `target`.
    pub fn jump_back_if_false(&mut self, target: usize) {
        self.emit_back(Op::JumpIfFalse, target);
    }

    fn emit_back(&mut self, op: Op, target: usize) {
        let base = self.buf.len() + op.instruction_size();
        let offset = Self::relative(target, base);
        self.jump_raw(op, offset);
    }

    fn emit_jump_placeholder(&mut self, op: Op) -> Label {
        self.emit_op(op);
        let offset_pos = self.buf.len();
        self.emit_i32(0); // placeholder
        let base = self.buf.len();
        Label { offset_pos, base }
    }
}
