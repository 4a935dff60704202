//! Decoding of encoded method bodies into instruction lists.
//!
//! The decoder is strict: truncated operands, unknown opcode bytes, and
//! constant pool references of the wrong kind are all rejected. A stream that
//! decodes cleanly is guaranteed to re-encode byte-identically, which is the
//! foundation of the engine's "untouched classes pass through unchanged"
//! guarantee.

use crate::bytecode::instruction::{Instruction, Op, ValueKind};
use crate::class::io::read_le_at;
use crate::class::ConstantPool;
use crate::{Error, Result};

/// Decodes a single instruction at `*pos`, advancing the cursor.
///
/// # Errors
/// [`Error::UnknownOpcode`] for an unrecognized opcode byte,
/// [`Error::OutOfBounds`] for truncated operands.
pub fn decode_instruction(code: &[u8], pos: &mut usize) -> Result<Instruction> {
    #[allow(clippy::cast_possible_truncation)]
    let offset = *pos as u32;
    let opcode = read_le_at::<u8>(code, pos)?;
    let op = match opcode {
        0x00 => Op::Nop,
        0x01 => Op::LdcI32(read_le_at::<i32>(code, pos)?),
        0x02 => Op::LdcI64(read_le_at::<i64>(code, pos)?),
        0x03 => Op::LdcF32(read_le_at::<f32>(code, pos)?),
        0x04 => Op::LdcF64(read_le_at::<f64>(code, pos)?),
        0x05 => Op::LdcStr(read_le_at::<u16>(code, pos)?),
        0x06 => Op::LdcNull,
        0x10..=0x14 => Op::Load(kind_of(opcode - 0x10), read_le_at::<u16>(code, pos)?),
        0x18..=0x1C => Op::Store(kind_of(opcode - 0x18), read_le_at::<u16>(code, pos)?),
        0x20 => Op::Pop,
        0x21 => Op::Dup,
        0x28 => Op::GetField(read_le_at::<u16>(code, pos)?),
        0x29 => Op::PutField(read_le_at::<u16>(code, pos)?),
        0x2A => Op::GetStatic(read_le_at::<u16>(code, pos)?),
        0x2B => Op::PutStatic(read_le_at::<u16>(code, pos)?),
        0x30 => Op::InvokeVirtual(read_le_at::<u16>(code, pos)?),
        0x31 => Op::InvokeStatic(read_le_at::<u16>(code, pos)?),
        0x38 => Op::Br(read_le_at::<u32>(code, pos)?),
        0x39 => Op::BrFalse(read_le_at::<u32>(code, pos)?),
        0x40 => Op::Ret(None),
        0x41 => Op::Ret(Some(ValueKind::I32)),
        0x42 => Op::Ret(Some(ValueKind::I64)),
        0x43 => Op::Ret(Some(ValueKind::F32)),
        0x44 => Op::Ret(Some(ValueKind::F64)),
        0x45 => Op::Ret(Some(ValueKind::Ref)),
        0x48 => Op::Throw,
        other => return Err(Error::UnknownOpcode(other)),
    };
    Ok(Instruction { offset, op })
}

fn kind_of(index: u8) -> ValueKind {
    match index {
        0 => ValueKind::I32,
        1 => ValueKind::I64,
        2 => ValueKind::F32,
        3 => ValueKind::F64,
        _ => ValueKind::Ref,
    }
}

/// Decodes an entire method body, validating pool references as it goes.
///
/// # Errors
/// Any decoding failure from [`decode_instruction`], or [`Error::PoolIndex`]
/// when an instruction references a pool entry of the wrong kind.
pub fn decode_stream(code: &[u8], pool: &ConstantPool) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut pos = 0;
    while pos < code.len() {
        let instruction = decode_instruction(code, &mut pos)?;
        match instruction.op {
            Op::LdcStr(index) => {
                pool.utf8(index)?;
            }
            Op::GetField(index)
            | Op::PutField(index)
            | Op::GetStatic(index)
            | Op::PutStatic(index)
            | Op::InvokeVirtual(index)
            | Op::InvokeStatic(index) => {
                pool.member_ref(index)?;
            }
            _ => {}
        }
        instructions.push(instruction);
    }
    Ok(instructions)
}
