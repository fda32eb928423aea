use object::{ContextId, Value};

/// An activation record.
///
/// Arguments occupy the first `arg_count` temporaries, declared temporaries
/// follow. Contexts live in [`VM::frames`](crate::VM) and refer to their
/// sender by index into that vector.
#[derive(Debug, Clone)]
pub struct Context {
    id: ContextId,
    method: Value,
    receiver: Value,
    arg_count: usize,
    temps: Vec<Value>,
    stack: Vec<Value>,
    /// Offset of the instruction being executed.
    pub pc: usize,
    /// Frame index of the context that sent the message, `None` at the top.
    pub sender: Option<usize>,
    /// Context a block was bound to; `None` for method contexts and unbound
    /// blocks.
    pub home: Option<ContextId>,
}

impl Context {
    pub fn new(
        id: ContextId,
        method: Value,
        receiver: Value,
        args: &[Value],
        frame_size: usize,
        stack_capacity: usize,
    ) -> Self {
        debug_assert!(args.len() <= frame_size);
        let mut temps = Vec::with_capacity(frame_size);
        temps.extend_from_slice(args);
        temps.resize(frame_size, Value::NIL);
        Self {
            id,
            method,
            receiver,
            arg_count: args.len(),
            temps,
            stack: Vec::with_capacity(stack_capacity),
            pc: 0,
            sender: None,
            home: None,
        }
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    pub fn method(&self) -> Value {
        self.method
    }

    #[inline]
    pub fn receiver(&self) -> Value {
        self.receiver
    }

    pub fn arguments(&self) -> &[Value] {
        &self.temps[..self.arg_count]
    }

    // ── operand stack ──────────────────────────────────────────────

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    #[inline]
    pub fn top(&self) -> Option<Value> {
        self.stack.last().copied()
    }

    /// Remove the top `n` values, oldest first. `None` if fewer are present.
    pub fn pop_n(&mut self, n: usize) -> Option<Vec<Value>> {
        let at = self.stack.len().checked_sub(n)?;
        Some(self.stack.split_off(at))
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    // ── temporaries ────────────────────────────────────────────────

    #[inline]
    pub fn temp_count(&self) -> usize {
        self.temps.len()
    }

    /// # Panics
    ///
    /// Panics if `index >= self.temp_count()`.
    pub fn temporary(&self, index: usize) -> Value {
        match self.temps.get(index) {
            Some(value) => *value,
            None => panic!(
                "temporary index {index} out of bounds (size {})",
                self.temps.len()
            ),
        }
    }

    /// # Panics
    ///
    /// Panics if `index >= self.temp_count()`.
    pub fn set_temporary(&mut self, index: usize, value: Value) {
        let len = self.temps.len();
        match self.temps.get_mut(index) {
            Some(slot) => *slot = value,
            None => panic!("temporary index {index} out of bounds (size {len})"),
        }
    }
}
