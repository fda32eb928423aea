/// Width in bytes of every operand.
pub const OPERAND_WIDTH: usize = 4;

/// Bytecode opcodes.
///
/// Every opcode is one byte followed by zero, one or two operands. Operands
/// are always 4 bytes wide and big-endian. Index operands are unsigned; jump
/// offsets are the same four bytes read as a two's-complement `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// Push an entry of the method's literal pool.
    /// Operands: `index:u32`
    PushLiteral = 0x00,

    /// Push one of the receiver's instance variables.
    /// Operands: `index:u32`
    PushInstanceVariable,

    /// Push a temporary (arguments occupy the leading temporaries).
    /// Operands: `index:u32`
    PushTemporaryVariable,

    /// Push the receiver.
    PushSelf,

    /// Pop a value, store it into an instance variable and push it back.
    /// Operands: `index:u32`
    StoreInstanceVariable,

    /// Pop a value, store it into a temporary and push it back.
    /// Operands: `index:u32`
    StoreTemporaryVariable,

    /// Send a message. Arguments are on top of the receiver.
    /// Operands: `selector:u32` (literal index), `argc:u32`
    SendMessage,

    /// Pop and return from the current context; `nil` if the stack is empty.
    ReturnStackTop,

    /// Unconditional relative jump.
    /// Operands: `offset:i32` (relative to the end of the instruction)
    Jump,

    /// Pop; jump if the value is `true`.
    /// Operands: `offset:i32`
    JumpIfTrue,

    /// Pop; jump unless the value is `true`.
    /// Operands: `offset:i32`
    JumpIfFalse,

    /// Discard the top of stack.
    Pop,

    /// Push a copy of the top of stack.
    Duplicate,
}

impl Op {
    pub const COUNT: usize = Op::Duplicate as usize + 1;

    /// Number of 4-byte operands that follow the opcode byte.
    pub const fn operand_count(self) -> usize {
        match self {
            Op::PushSelf | Op::ReturnStackTop | Op::Pop | Op::Duplicate => 0,
            Op::SendMessage => 2,
            _ => 1,
        }
    }

    /// Total encoded length of an instruction with this opcode.
    #[inline(always)]
    pub const fn instruction_size(self) -> usize {
        1 + self.operand_count() * OPERAND_WIDTH
    }

    pub const fn is_jump(self) -> bool {
        matches!(self, Op::Jump | Op::JumpIfTrue | Op::JumpIfFalse)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Op::PushLiteral => "PushLiteral",
            Op::PushInstanceVariable => "PushInstVar",
            Op::PushTemporaryVariable => "PushTemp",
            Op::PushSelf => "PushSelf",
            Op::StoreInstanceVariable => "StoreInstVar",
            Op::StoreTemporaryVariable => "StoreTemp",
            Op::SendMessage => "Send",
            Op::ReturnStackTop => "ReturnTop",
            Op::Jump => "Jump",
            Op::JumpIfTrue => "JumpIfTrue",
            Op::JumpIfFalse => "JumpIfFalse",
            Op::Pop => "Pop",
            Op::Duplicate => "Dup",
        }
    }
}

/// Encoded length of the instruction starting with `op`.
#[inline(always)]
pub const fn instruction_size(op: Op) -> usize {
    op.instruction_size()
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        if byte < Self::COUNT as u8 {
            // SAFETY: Op is repr(u8) with contiguous variants starting at 0.
            Ok(unsafe { core::mem::transmute::<u8, Op>(byte) })
        } else {
            Err(byte)
        }
    }
}

impl core::fmt::Display for Op {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
