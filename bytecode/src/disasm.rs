use std::fmt::Write;

use crate::decoder::BytecodeDecoder;
use crate::instruction::Instruction;

/// Absolute target of a jump at `pc`, or `None` for non-jumps.
///
/// The offset is relative to the end of the jump instruction. The result is
/// not range-checked; it may be negative or past the end.
pub fn jump_destination(pc: usize, instruction: Instruction) -> Option<i64> {
    let offset = instruction.jump_offset()?;
    Some(pc as i64 + instruction.size() as i64 + i64::from(offset))
}

/// Render `bytes` one instruction per line.
///
/// Jump targets are marked with `►`, jumps show their absolute destination.
/// `annotate` may add a comment to an instruction (e.g. the literal a
/// `PushLiteral` refers to). Decoding stops at the first malformed
/// instruction, which is rendered as an error line.
pub fn disassemble<F>(bytes: &[u8], annotate: F) -> String
where
    F: Fn(&Instruction) -> Option<String>,
{
    let decoded: Vec<_> = BytecodeDecoder::new(bytes).collect();
    let targets: Vec<i64> = decoded
        .iter()
        .filter_map(|item| item.as_ref().ok())
        .filter_map(|&(pc, ins)| jump_destination(pc, ins))
        .collect();

    let mut out = String::new();
    for item in decoded {
        let (pc, ins) = match item {
            Ok(pair) => pair,
            Err(e) => {
                let _ = writeln!(out, "  !! {e}");
                break;
            }
        };
        let marker = if targets.contains(&(pc as i64)) { "►" } else { " " };
        let _ = write!(out, "{pc:04} {marker} {ins}");
        if let Some(dest) = jump_destination(pc, ins) {
            let _ = write!(out, "  -> {dest:04}");
        }
        if let Some(note) = annotate(&ins) {
            let _ = write!(out, "  ; {note}");
        }
        out.push('\n');
    }
    out
}
