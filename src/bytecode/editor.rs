//! Index-form editing of method bodies.
//!
//! Rewriting over raw byte offsets is where load-time instrumentation goes
//! wrong: inserting a single instruction invalidates every branch target and
//! exception range after it. The [`CodeEditor`] removes that class of bug by
//! converting a body into *index form* - branch operands and exception table
//! boundaries become instruction indices - applying edits there, and only
//! materializing byte offsets again when the body is written back.
//!
//! Insertion semantics: inserting at index `i` places new code *before* the
//! instruction currently at `i`. Branches that targeted `i` still target the
//! same position and therefore execute the inserted code first - which is
//! exactly what a pre-return injection needs when several paths jump straight
//! to a shared return instruction. Exception ranges ending at `i` (exclusive)
//! do not grow; ranges spanning `i` do.

use crate::bytecode::decoder::decode_stream;
use crate::bytecode::encoder::encode_stream;
use crate::bytecode::instruction::Op;
use crate::class::{ConstantPool, ExceptionEntry, Method};
use crate::Result;

/// An exception table entry in index form.
///
/// `start` is inclusive, `end` exclusive, all three are instruction indices.
/// `end` may equal the instruction count when the range runs to the end of
/// the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EhRange {
    /// Index of the first covered instruction
    pub start: usize,
    /// Index one past the last covered instruction
    pub end: usize,
    /// Index of the handler's first instruction
    pub handler: usize,
}

/// A method body lifted into editable index form.
#[derive(Debug, Clone)]
pub struct CodeEditor {
    ops: Vec<Op>,
    eh: Vec<EhRange>,
}

impl CodeEditor {
    /// Lifts a method body into index form.
    ///
    /// # Errors
    /// Any decode failure, or [`crate::Error::Malformed`] when a branch
    /// target or exception boundary does not land on an instruction start.
    pub fn from_method(method: &Method, pool: &ConstantPool) -> Result<CodeEditor> {
        let instructions = decode_stream(&method.code, pool)?;

        // Byte offset of each instruction start, plus the end-of-code offset
        // as a valid exclusive boundary.
        let mut index_of = std::collections::HashMap::with_capacity(instructions.len() + 1);
        for (index, instruction) in instructions.iter().enumerate() {
            index_of.insert(instruction.offset, index);
        }
        #[allow(clippy::cast_possible_truncation)]
        let code_end = method.code.len() as u32;
        index_of.insert(code_end, instructions.len());

        let resolve = |offset: u32, what: &str| -> Result<usize> {
            index_of.get(&offset).copied().ok_or_else(|| {
                malformed_error!("{what} offset {offset} is not an instruction boundary")
            })
        };

        let mut ops = Vec::with_capacity(instructions.len());
        for instruction in &instructions {
            let op = match instruction.op {
                Op::Br(target) => {
                    let index = resolve(target, "Branch target")?;
                    if index >= instructions.len() {
                        return Err(malformed_error!("Branch target {target} is out of code"));
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    Op::Br(index as u32)
                }
                Op::BrFalse(target) => {
                    let index = resolve(target, "Branch target")?;
                    if index >= instructions.len() {
                        return Err(malformed_error!("Branch target {target} is out of code"));
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    Op::BrFalse(index as u32)
                }
                ref other => other.clone(),
            };
            ops.push(op);
        }

        let mut eh = Vec::with_capacity(method.exceptions.len());
        for entry in &method.exceptions {
            let start = resolve(entry.try_start, "Exception range start")?;
            let end = resolve(entry.try_end, "Exception range end")?;
            let handler = resolve(entry.handler, "Exception handler")?;
            if handler >= instructions.len() {
                return Err(malformed_error!(
                    "Exception handler offset {} is out of code",
                    entry.handler
                ));
            }
            eh.push(EhRange { start, end, handler });
        }

        Ok(CodeEditor { ops, eh })
    }

    /// Builds an editor directly from index-form parts.
    pub fn from_parts(ops: Vec<Op>, eh: Vec<EhRange>) -> CodeEditor {
        CodeEditor { ops, eh }
    }

    /// The instruction list, branch operands in index form.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// The exception table in index form.
    pub fn eh(&self) -> &[EhRange] {
        &self.eh
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when the body has no instructions.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Indices of every return instruction, ascending.
    pub fn ret_indices(&self) -> Vec<usize> {
        self.ops
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, Op::Ret(_)))
            .map(|(index, _)| index)
            .collect()
    }

    /// Inserts `new_ops` before the instruction at `at`, remapping branch
    /// targets and exception boundaries.
    ///
    /// Targets and boundaries strictly greater than `at` shift by the
    /// insertion length; those equal to `at` keep pointing at the insertion
    /// point (see the module docs for why).
    pub fn insert(&mut self, at: usize, new_ops: &[Op]) {
        assert!(at <= self.ops.len(), "insertion index out of range");
        #[allow(clippy::cast_possible_truncation)]
        let at_u32 = at as u32;
        #[allow(clippy::cast_possible_truncation)]
        let shift = new_ops.len() as u32;

        for op in &mut self.ops {
            match op {
                Op::Br(target) | Op::BrFalse(target) if *target > at_u32 => {
                    *target += shift;
                }
                _ => {}
            }
        }
        for range in &mut self.eh {
            if range.start > at {
                range.start += new_ops.len();
            }
            if range.end > at {
                range.end += new_ops.len();
            }
            if range.handler > at {
                range.handler += new_ops.len();
            }
        }

        self.ops.splice(at..at, new_ops.iter().cloned());
    }

    /// Discards the current body and exception table in favor of `ops`.
    pub fn replace_all(&mut self, ops: Vec<Op>) {
        self.ops = ops;
        self.eh.clear();
    }

    /// Writes the edited body back into `method`, materializing byte offsets.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] when a branch target or exception boundary
    /// index no longer refers into the body.
    pub fn store(&self, method: &mut Method) -> Result<()> {
        // First pass: byte offset of each instruction index.
        let mut offsets = Vec::with_capacity(self.ops.len() + 1);
        let mut cursor = 0_u32;
        for op in &self.ops {
            offsets.push(cursor);
            cursor += op.encoded_len();
        }
        offsets.push(cursor);

        let offset_of = |index: usize, what: &str| -> Result<u32> {
            offsets
                .get(index)
                .copied()
                .ok_or_else(|| malformed_error!("{what} index {index} is out of the body"))
        };

        // Second pass: materialize branch targets, then encode.
        let mut resolved = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            let op = match op {
                Op::Br(index) => {
                    if *index as usize >= self.ops.len() {
                        return Err(malformed_error!("Branch index {index} is out of the body"));
                    }
                    Op::Br(offsets[*index as usize])
                }
                Op::BrFalse(index) => {
                    if *index as usize >= self.ops.len() {
                        return Err(malformed_error!("Branch index {index} is out of the body"));
                    }
                    Op::BrFalse(offsets[*index as usize])
                }
                other => other.clone(),
            };
            resolved.push(op);
        }

        let mut exceptions = Vec::with_capacity(self.eh.len());
        for range in &self.eh {
            if range.handler >= self.ops.len() {
                return Err(malformed_error!(
                    "Exception handler index {} is out of the body",
                    range.handler
                ));
            }
            exceptions.push(ExceptionEntry {
                try_start: offset_of(range.start, "Exception range start")?,
                try_end: offset_of(range.end, "Exception range end")?,
                handler: offsets[range.handler],
            });
        }

        method.code = encode_stream(&resolved);
        method.exceptions = exceptions;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instruction::ValueKind;
    use crate::class::{MemberFlags, MethodDesc, ReturnKind};

    fn method_from(ops: &[Op], eh: Vec<EhRange>) -> (Method, ConstantPool) {
        let pool = ConstantPool::new();
        let mut method = Method {
            flags: MemberFlags::PUBLIC,
            name: "a".into(),
            desc: MethodDesc::new(vec![], ReturnKind::Void),
            max_stack: 4,
            max_locals: 2,
            code: Vec::new(),
            exceptions: Vec::new(),
        };
        let editor = CodeEditor::from_parts(ops.to_vec(), eh);
        editor.store(&mut method).unwrap();
        (method, pool)
    }

    #[test]
    fn test_lift_and_store_roundtrip() {
        // ldc.i32 0 / br.false -> ret / nop / ret
        let ops = vec![Op::LdcI32(0), Op::BrFalse(3), Op::Nop, Op::Ret(None)];
        let (method, pool) = method_from(&ops, vec![]);

        let editor = CodeEditor::from_method(&method, &pool).unwrap();
        assert_eq!(editor.ops(), &ops[..]);

        let mut copy = method.clone();
        editor.store(&mut copy).unwrap();
        assert_eq!(copy.code, method.code);
    }

    #[test]
    fn test_insert_shifts_later_targets() {
        // br -> ret at index 2
        let ops = vec![Op::Br(2), Op::Nop, Op::Ret(None)];
        let mut editor = CodeEditor::from_parts(ops, vec![]);
        editor.insert(1, &[Op::Nop, Op::Nop]);
        assert_eq!(editor.ops()[0], Op::Br(4));
        assert_eq!(editor.len(), 5);
    }

    #[test]
    fn test_insert_keeps_targets_at_insertion_point() {
        // A branch straight to the return must run injected code placed
        // before that return.
        let ops = vec![Op::Br(2), Op::Nop, Op::Ret(None)];
        let mut editor = CodeEditor::from_parts(ops, vec![]);
        editor.insert(2, &[Op::Nop]);
        assert_eq!(editor.ops()[0], Op::Br(2));
        assert_eq!(editor.ops()[2], Op::Nop);
        assert_eq!(editor.ops()[3], Op::Ret(None));
    }

    #[test]
    fn test_insert_adjusts_exception_ranges() {
        let ops = vec![Op::Nop, Op::Nop, Op::Ret(None), Op::Pop, Op::Ret(None)];
        let eh = vec![EhRange { start: 0, end: 2, handler: 3 }];
        let mut editor = CodeEditor::from_parts(ops, eh);
        editor.insert(1, &[Op::Nop]);
        assert_eq!(editor.eh()[0], EhRange { start: 0, end: 3, handler: 4 });
        // Range ending exactly at the insertion point must not grow.
        let mut editor2 = CodeEditor::from_parts(
            vec![Op::Nop, Op::Nop, Op::Ret(None), Op::Pop, Op::Ret(None)],
            vec![EhRange { start: 0, end: 1, handler: 3 }],
        );
        editor2.insert(1, &[Op::Nop]);
        assert_eq!(editor2.eh()[0], EhRange { start: 0, end: 1, handler: 4 });
    }

    #[test]
    fn test_store_materializes_byte_offsets() {
        let ops = vec![
            Op::LdcI32(0),      // 5 bytes at 0
            Op::BrFalse(3),     // 5 bytes at 5
            Op::Nop,            // 1 byte at 10
            Op::Ret(None),      // 1 byte at 11
        ];
        let (method, _pool) = method_from(&ops, vec![]);
        // br.false target index 3 -> byte offset 11
        assert_eq!(&method.code[5..10], &[0x39, 11, 0, 0, 0]);
    }

    #[test]
    fn test_misaligned_branch_rejected() {
        let pool = ConstantPool::new();
        let method = Method {
            flags: MemberFlags::PUBLIC,
            name: "a".into(),
            desc: MethodDesc::new(vec![], ReturnKind::Void),
            max_stack: 1,
            max_locals: 1,
            // br into the middle of its own operand
            code: vec![0x38, 0x02, 0x00, 0x00, 0x00, 0x40],
            exceptions: Vec::new(),
        };
        assert!(CodeEditor::from_method(&method, &pool).is_err());
    }

    #[test]
    fn test_ret_indices() {
        let ops = vec![Op::Nop, Op::Ret(None), Op::Nop, Op::Ret(Some(ValueKind::I32))];
        let editor = CodeEditor::from_parts(ops, vec![]);
        assert_eq!(editor.ret_indices(), vec![1, 3]);
    }
}
