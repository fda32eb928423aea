use thiserror::Error;

use crate::instruction::Instruction;
use crate::op::{OPERAND_WIDTH, Op};

/// Why a byte sequence is not a valid instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode 0x{byte:02x} at {pc}")]
    InvalidOpcode { byte: u8, pc: usize },
    #[error("truncated {op} at {pc}: needs {needed} bytes, {available} left")]
    Truncated {
        op: Op,
        pc: usize,
        needed: usize,
        available: usize,
    },
    #[error("pc {pc} is past the end of the bytecode")]
    OutOfRange { pc: usize },
}

/// Decode the instruction starting at `pc`.
///
/// Every read is bounds-checked; malformed input is an error, never a panic.
pub fn decode_at(bytes: &[u8], pc: usize) -> Result<Instruction, DecodeError> {
    let Some(&byte) = bytes.get(pc) else {
        return Err(DecodeError::OutOfRange { pc });
    };
    let op = Op::try_from(byte)
        .map_err(|byte| DecodeError::InvalidOpcode { byte, pc })?;

    let needed = op.instruction_size();
    let available = bytes.len() - pc;
    if available < needed {
        return Err(DecodeError::Truncated {
            op,
            pc,
            needed,
            available,
        });
    }

    let operand = |n: usize| read_u32_be(bytes, pc + 1 + n * OPERAND_WIDTH);

    Ok(match op {
        Op::PushLiteral => Instruction::PushLiteral { index: operand(0) },
        Op::PushInstanceVariable => {
            Instruction::PushInstanceVariable { index: operand(0) }
        }
        Op::PushTemporaryVariable => {
            Instruction::PushTemporaryVariable { index: operand(0) }
        }
        Op::PushSelf => Instruction::PushSelf,
        Op::StoreInstanceVariable => {
            Instruction::StoreInstanceVariable { index: operand(0) }
        }
        Op::StoreTemporaryVariable => {
            Instruction::StoreTemporaryVariable { index: operand(0) }
        }
        Op::SendMessage => Instruction::SendMessage {
            selector: operand(0),
            argc: operand(1),
        },
        Op::ReturnStackTop => Instruction::ReturnStackTop,
        Op::Jump => Instruction::Jump {
            offset: operand(0) as i32,
        },
        Op::JumpIfTrue => Instruction::JumpIfTrue {
            offset: operand(0) as i32,
        },
        Op::JumpIfFalse => Instruction::JumpIfFalse {
            offset: operand(0) as i32,
        },
        Op::Pop => Instruction::Pop,
        Op::Duplicate => Instruction::Duplicate,
    })
}

/// Caller guarantees `at + 4 <= bytes.len()`.
#[inline(always)]
fn read_u32_be(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; OPERAND_WIDTH];
    word.copy_from_slice(&bytes[at..at + OPERAND_WIDTH]);
    u32::from_be_bytes(word)
}

/// Walks a bytecode byte slice instruction by instruction.
///
/// Yields `(pc, instruction)` pairs. After the first error the iterator is
/// exhausted.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Decode the next instruction, or `None` at end-of-stream.
    pub fn decode_next(
        &mut self,
    ) -> Option<Result<(usize, Instruction), DecodeError>> {
        if self.is_at_end() {
            return None;
        }
        let pc = self.pos;
        match decode_at(self.bytes, pc) {
            Ok(instruction) => {
                self.pos += instruction.size();
                Some(Ok((pc, instruction)))
            }
            Err(e) => {
                self.pos = self.bytes.len();
                Some(Err(e))
            }
        }
    }
}

impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<(usize, Instruction), DecodeError>;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next()
    }
}
