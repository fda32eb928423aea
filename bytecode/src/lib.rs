mod op;
mod instruction;
mod builder;
mod decoder;
mod disasm;

pub use op::{OPERAND_WIDTH, Op, instruction_size};
pub use instruction::Instruction;
pub use builder::{BytecodeBuilder, Label};
pub use decoder::{BytecodeDecoder, DecodeError, decode_at};
pub use disasm::{disassemble, jump_destination};

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Instruction> {
        BytecodeDecoder::new(bytes)
            .map(|item| item.expect("well-formed bytecode").1)
            .collect()
    }

    #[test]
    fn opcode_bytes_are_stable() {
        assert_eq!(Op::PushLiteral as u8, 0);
        assert_eq!(Op::SendMessage as u8, 6);
        assert_eq!(Op::ReturnStackTop as u8, 7);
        assert_eq!(Op::Duplicate as u8, 12);
        assert_eq!(Op::COUNT, 13);
        for byte in 0..Op::COUNT as u8 {
            assert_eq!(Op::try_from(byte).map(|op| op as u8), Ok(byte));
        }
        assert_eq!(Op::try_from(13), Err(13));
        assert_eq!(Op::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn instruction_sizes() {
        assert_eq!(instruction_size(Op::PushSelf), 1);
        assert_eq!(instruction_size(Op::ReturnStackTop), 1);
        assert_eq!(instruction_size(Op::Pop), 1);
        assert_eq!(instruction_size(Op::Duplicate), 1);
        assert_eq!(instruction_size(Op::PushLiteral), 5);
        assert_eq!(instruction_size(Op::Jump), 5);
        assert_eq!(instruction_size(Op::JumpIfFalse), 5);
        assert_eq!(instruction_size(Op::SendMessage), 9);
    }

    #[test]
    fn operands_are_big_endian() {
        let mut b = BytecodeBuilder::new();
        b.push_literal(0x0102_0304);
        b.send_message(1, 2);
        assert_eq!(b.as_bytes(), &[
            0x00, 0x01, 0x02, 0x03, 0x04,
            0x06, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02,
        ]);
    }

    #[test]
    fn builds_every_instruction() {
        let mut b = BytecodeBuilder::new();
        b.push_literal(42);
        b.push_instance_variable(1);
        b.push_temporary_variable(2);
        b.push_self();
        b.store_instance_variable(3);
        b.store_temporary_variable(4);
        b.send_message(5, 2);
        b.pop();
        b.duplicate();
        b.return_stack_top();

        assert_eq!(decode_all(&b.into_bytes()), vec![
            Instruction::PushLiteral { index: 42 },
            Instruction::PushInstanceVariable { index: 1 },
            Instruction::PushTemporaryVariable { index: 2 },
            Instruction::PushSelf,
            Instruction::StoreInstanceVariable { index: 3 },
            Instruction::StoreTemporaryVariable { index: 4 },
            Instruction::SendMessage { selector: 5, argc: 2 },
            Instruction::Pop,
            Instruction::Duplicate,
            Instruction::ReturnStackTop,
        ]);
    }

    #[test]
    fn decoder_reports_pcs() {
        let mut b = BytecodeBuilder::new();
        b.push_self();
        b.push_literal(0);
        b.send_message(1, 0);
        b.return_stack_top();
        let pcs: Vec<usize> = BytecodeDecoder::new(b.as_bytes())
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(pcs, vec![0, 1, 6, 15]);
    }

    #[test]
    fn forward_jump() {
        let mut b = BytecodeBuilder::new();
        b.push_literal(0);
        let label = b.jump_if_false();
        b.push_literal(1);
        b.bind(label);
        b.return_stack_top();

        assert_eq!(decode_all(&b.into_bytes()), vec![
            Instruction::PushLiteral { index: 0 },
            Instruction::JumpIfFalse { offset: 5 },
            Instruction::PushLiteral { index: 1 },
            Instruction::ReturnStackTop,
        ]);
    }

    #[test]
    fn backward_jump() {
        let mut b = BytecodeBuilder::new();
        let loop_top = b.current_offset();
        b.push_temporary_variable(0);
        b.jump_back(loop_top);

        assert_eq!(decode_all(&b.into_bytes()), vec![
            Instruction::PushTemporaryVariable { index: 0 },
            Instruction::Jump { offset: -10 },
        ]);
    }

    #[test]
    fn jump_destination_is_relative_to_instruction_end() {
        let jump = Instruction::Jump { offset: 3 };
        assert_eq!(jump_destination(10, jump), Some(18));
        assert_eq!(jump_destination(10, Instruction::Jump { offset: -15 }), Some(0));
        assert_eq!(jump_destination(0, Instruction::Pop), None);
    }

    #[test]
    fn negative_offsets_survive_encoding() {
        let mut b = BytecodeBuilder::new();
        b.jump_raw(Op::JumpIfTrue, -1);
        assert_eq!(&b.as_bytes()[1..], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode_all(b.as_bytes()), vec![Instruction::JumpIfTrue {
            offset: -1
        }]);
    }

    #[test]
    #[should_panic(expected = "is not a jump")]
    fn jump_raw_rejects_non_jumps() {
        BytecodeBuilder::new().jump_raw(Op::Pop, 0);
    }

    #[test]
    fn invalid_opcode_is_an_error() {
        assert_eq!(
            decode_at(&[0x00, 0, 0, 0, 0, 0x7F], 5),
            Err(DecodeError::InvalidOpcode { byte: 0x7F, pc: 5 })
        );
    }

    #[test]
    fn truncated_operand_is_an_error() {
        assert_eq!(
            decode_at(&[Op::SendMessage as u8, 0, 0, 0, 1, 0, 0], 0),
            Err(DecodeError::Truncated {
                op: Op::SendMessage,
                pc: 0,
                needed: 9,
                available: 7,
            })
        );
        assert_eq!(decode_at(&[], 0), Err(DecodeError::OutOfRange { pc: 0 }));
    }

    #[test]
    fn decoder_stops_after_error() {
        let bytes = [Op::PushSelf as u8, 0xEE, Op::PushSelf as u8];
        let items: Vec<_> = BytecodeDecoder::new(&bytes).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok((0, Instruction::PushSelf)));
        assert!(items[1].is_err());
    }

    #[test]
    fn display_instructions() {
        assert_eq!(
            Instruction::SendMessage { selector: 5, argc: 2 }.to_string(),
            "Send #5 2"
        );
        assert_eq!(Instruction::Jump { offset: -7 }.to_string(), "Jump -7");
        assert_eq!(Instruction::JumpIfTrue { offset: 5 }.to_string(), "JumpIfTrue +5");
        assert_eq!(
            Instruction::PushTemporaryVariable { index: 2 }.to_string(),
            "PushTemp t2"
        );
        assert_eq!(
            Instruction::StoreInstanceVariable { index: 0 }.to_string(),
            "StoreInstVar i0"
        );
        assert_eq!(Instruction::ReturnStackTop.to_string(), "ReturnTop");
    }

    #[test]
    fn disassembly_marks_jump_targets() {
        let mut b = BytecodeBuilder::new();
        b.push_literal(0);
        let label = b.jump_if_false();
        b.push_literal(1);
        b.bind(label);
        b.return_stack_top();

        let text = disassemble(b.as_bytes(), |ins| match ins {
            Instruction::PushLiteral { index } => Some(format!("lit{index}")),
            _ => None,
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            "0000   PushLiteral #0  ; lit0",
            "0005   JumpIfFalse +5  -> 0015",
            "0010   PushLiteral #1  ; lit1",
            "0015 ► ReturnTop",
        ]);
    }

    #[test]
    fn disassembly_reports_malformed_tail() {
        let text = disassemble(&[Op::Pop as u8, 0xEE], |_| None);
        assert!(text.starts_with("0000   Pop\n"));
        assert!(text.contains("invalid opcode 0xee at 1"));
    }
}
