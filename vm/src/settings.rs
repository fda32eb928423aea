/// Tunables for a [`VM`](crate::VM) instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmSettings {
    /// Maximum number of live contexts. One more send is a fatal
    /// stack overflow.
    pub max_depth: usize,
    /// Initial operand-stack capacity of every context.
    pub stack_capacity: usize,
    /// Where a temporary index past the current context's frame resolves.
    ///
    /// `false`: the sender's temporaries. `true`: the temporaries of the
    /// context the block was bound to with `fixTemps`.
    pub lexical_block_scope: bool,
}

impl Default for VmSettings {
    fn default() -> Self {
        Self {
            max_depth: 1024,
            stack_capacity: 16,
            lexical_block_scope: false,
        }
    }
}
