//! Human-readable disassembly of a [`Chunk`].
//!
//! Read-only: nothing here affects execution. Output lines look like
//!
//! ```text
//! 0000    1 OP_CONSTANT         0 '1.5'
//! 0002    | OP_NEGATE
//! ```
//!
//! offset, source line (`|` when unchanged from the previous instruction),
//! mnemonic, then the operand and the constant it names if any.

use crate::chunk::{Chunk, OpCode};

pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {} ==\n", name);
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, &mut out);
    }
    out
}

/// Appends the instruction at `offset` to `out` and returns the offset of the
/// next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    out.push_str(&format!("{:04} ", offset));

    let line = chunk.line_at(offset).unwrap_or(0);
    if offset > 0 && chunk.line_at(offset - 1) == Some(line) {
        out.push_str("   | ");
    } else {
        out.push_str(&format!("{:4} ", line));
    }

    let Some(&byte) = chunk.code().get(offset) else {
        out.push_str("<end of chunk>\n");
        return offset + 1;
    };
    let Some(op) = OpCode::from_byte(byte) else {
        out.push_str(&format!("Unknown opcode {}\n", byte));
        return offset + 1;
    };

    match op {
        OpCode::Constant => {
            match chunk.code().get(offset + 1) {
                Some(&index) => constant_operand(chunk, op, usize::from(index), out),
                None => truncated(op, out),
            }
            offset + 2
        }
        OpCode::ConstantLong | OpCode::GetGlobal | OpCode::DefineGlobal | OpCode::SetGlobal => {
            match chunk.read_u24(offset + 1) {
                Some(index) => constant_operand(chunk, op, index, out),
                None => truncated(op, out),
            }
            offset + 4
        }
        OpCode::GetLocal | OpCode::SetLocal => {
            match chunk.read_u24(offset + 1) {
                Some(slot) => out.push_str(&format!("{:<16} {:4}\n", op.name(), slot)),
                None => truncated(op, out),
            }
            offset + 4
        }
        _ => {
            out.push_str(op.name());
            out.push('\n');
            offset + 1 + op.operand_width()
        }
    }
}

fn constant_operand(chunk: &Chunk, op: OpCode, index: usize, out: &mut String) {
    match chunk.constant(index) {
        Some(value) => out.push_str(&format!("{:<16} {:4} '{}'\n", op.name(), index, value)),
        None => out.push_str(&format!("{:<16} {:4} <out of range>\n", op.name(), index)),
    }
}

fn truncated(op: OpCode, out: &mut String) {
    out.push_str(&format!("{:<16} <truncated operand>\n", op.name()));
}
