//! Encoding of instruction lists back into method body bytes.
//!
//! The format has exactly one encoding per instruction, so encoding makes no
//! choices and `decode(encode(ops)) == ops` holds for every valid list.

use crate::bytecode::instruction::{Op, ValueKind};
use crate::class::io::ClassIO;

fn kind_index(kind: ValueKind) -> u8 {
    match kind {
        ValueKind::I32 => 0,
        ValueKind::I64 => 1,
        ValueKind::F32 => 2,
        ValueKind::F64 => 3,
        ValueKind::Ref => 4,
    }
}

/// Appends the canonical encoding of one operation to `out`.
pub fn encode_op(op: &Op, out: &mut Vec<u8>) {
    match op {
        Op::Nop => 0x00_u8.put_le(out),
        Op::LdcI32(value) => {
            0x01_u8.put_le(out);
            value.put_le(out);
        }
        Op::LdcI64(value) => {
            0x02_u8.put_le(out);
            value.put_le(out);
        }
        Op::LdcF32(value) => {
            0x03_u8.put_le(out);
            value.put_le(out);
        }
        Op::LdcF64(value) => {
            0x04_u8.put_le(out);
            value.put_le(out);
        }
        Op::LdcStr(index) => {
            0x05_u8.put_le(out);
            index.put_le(out);
        }
        Op::LdcNull => 0x06_u8.put_le(out),
        Op::Load(kind, slot) => {
            (0x10 + kind_index(*kind)).put_le(out);
            slot.put_le(out);
        }
        Op::Store(kind, slot) => {
            (0x18 + kind_index(*kind)).put_le(out);
            slot.put_le(out);
        }
        Op::Pop => 0x20_u8.put_le(out),
        Op::Dup => 0x21_u8.put_le(out),
        Op::GetField(index) => {
            0x28_u8.put_le(out);
            index.put_le(out);
        }
        Op::PutField(index) => {
            0x29_u8.put_le(out);
            index.put_le(out);
        }
        Op::GetStatic(index) => {
            0x2A_u8.put_le(out);
            index.put_le(out);
        }
        Op::PutStatic(index) => {
            0x2B_u8.put_le(out);
            index.put_le(out);
        }
        Op::InvokeVirtual(index) => {
            0x30_u8.put_le(out);
            index.put_le(out);
        }
        Op::InvokeStatic(index) => {
            0x31_u8.put_le(out);
            index.put_le(out);
        }
        Op::Br(target) => {
            0x38_u8.put_le(out);
            target.put_le(out);
        }
        Op::BrFalse(target) => {
            0x39_u8.put_le(out);
            target.put_le(out);
        }
        Op::Ret(kind) => match kind {
            None => 0x40_u8.put_le(out),
            Some(value) => (0x41 + kind_index(*value)).put_le(out),
        },
        Op::Throw => 0x48_u8.put_le(out),
    }
}

/// Encodes a full instruction list into method body bytes.
pub fn encode_stream(ops: &[Op]) -> Vec<u8> {
    let capacity: u32 = ops.iter().map(Op::encoded_len).sum();
    let mut out = Vec::with_capacity(capacity as usize);
    for op in ops {
        encode_op(op, &mut out);
    }
    out
}
