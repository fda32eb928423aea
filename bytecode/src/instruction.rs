use core::fmt;

use crate::op::Op;

/// A decoded instruction.
///
/// Index operands keep their encoded `u32`; jump offsets are already
/// reinterpreted as signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    PushLiteral { index: u32 },
    PushInstanceVariable { index: u32 },
    PushTemporaryVariable { index: u32 },
    PushSelf,
    StoreInstanceVariable { index: u32 },
    StoreTemporaryVariable { index: u32 },
    SendMessage { selector: u32, argc: u32 },
    ReturnStackTop,
    Jump { offset: i32 },
    JumpIfTrue { offset: i32 },
    JumpIfFalse { offset: i32 },
    Pop,
    Duplicate,
}

impl Instruction {
    pub const fn op(self) -> Op {
        match self {
            Self::PushLiteral { .. } => Op::PushLiteral,
            Self::PushInstanceVariable { .. } => Op::PushInstanceVariable,
            Self::PushTemporaryVariable { .. } => Op::PushTemporaryVariable,
            Self::PushSelf => Op::PushSelf,
            Self::StoreInstanceVariable { .. } => Op::StoreInstanceVariable,
            Self::StoreTemporaryVariable { .. } => Op::StoreTemporaryVariable,
            Self::SendMessage { .. } => Op::SendMessage,
            Self::ReturnStackTop => Op::ReturnStackTop,
            Self::Jump { .. } => Op::Jump,
            Self::JumpIfTrue { .. } => Op::JumpIfTrue,
            Self::JumpIfFalse { .. } => Op::JumpIfFalse,
            Self::Pop => Op::Pop,
            Self::Duplicate => Op::Duplicate,
        }
    }

    #[inline(always)]
    pub const fn size(self) -> usize {
        self.op().instruction_size()
    }

    /// The relative offset of a jump, `None` for everything else.
    pub const fn jump_offset(self) -> Option<i32> {
        match self {
            Self::Jump { offset }
            | Self::JumpIfTrue { offset }
            | Self::JumpIfFalse { offset } => Some(offset),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.op().name();
        match *self {
            Self::PushLiteral { index } => write!(f, "{name} #{index}"),
            Self::PushInstanceVariable { index }
            | Self::StoreInstanceVariable { index } => {
                write!(f, "{name} i{index}")
            }
            Self::PushTemporaryVariable { index }
            | Self::StoreTemporaryVariable { index } => {
                write!(f, "{name} t{index}")
            }
            Self::SendMessage { selector, argc } => {
                write!(f, "{name} #{selector} {argc}")
            }
            Self::Jump { offset }
            | Self::JumpIfTrue { offset }
            | Self::JumpIfFalse { offset } => write!(f, "{name} {offset:+}"),
            Self::PushSelf
            | Self::ReturnStackTop
            | Self::Pop
            | Self::Duplicate => f.write_str(name),
        }
    }
}
