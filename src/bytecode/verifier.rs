//! Structural verification of method bodies.
//!
//! Mirrors the checks the host's own loader applies before accepting a class:
//! operand stack and local variable typing must be consistent at every
//! reachable point, every path must leave the method through a return or a
//! throw, and branch targets and exception ranges must be well-formed. A
//! rewritten body that passes this verifier is one the host will load.
//!
//! The verifier is a worklist abstract interpretation over value categories.
//! States are merged at control flow joins; merging two distinct reference
//! types consults an [`AncestorResolver`] - see [`crate::bytecode::ancestry`]
//! for why that seam exists and what the conservative fallback costs.
//!
//! Verification errors report the *instruction index* (not byte offset) in
//! their `offset` field, since verification runs on index-form bodies.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::bytecode::ancestry::AncestorResolver;
use crate::bytecode::editor::{CodeEditor, EhRange};
use crate::bytecode::instruction::{FlowType, Op, ValueKind};
use crate::class::{ConstantPool, Method, MethodDesc, ParamKind, ReturnKind};
use crate::{Error, Result};

/// Verified facts about a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verified {
    /// Deepest operand stack any execution path reaches
    pub max_stack: u16,
}

/// Reference type as tracked on the abstract stack.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RefType {
    /// The null constant; compatible with every reference type
    Null,
    /// A reference of a known class
    Named(Arc<str>),
    /// A reference of the universal base type
    Universal,
}

/// Abstract value occupying one stack slot or local.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VType {
    I32,
    I64,
    F32,
    F64,
    Ref(RefType),
}

impl VType {
    fn kind(&self) -> ValueKind {
        match self {
            VType::I32 => ValueKind::I32,
            VType::I64 => ValueKind::I64,
            VType::F32 => ValueKind::F32,
            VType::F64 => ValueKind::F64,
            VType::Ref(_) => ValueKind::Ref,
        }
    }

    fn of_kind(kind: ValueKind) -> VType {
        match kind {
            ValueKind::I32 => VType::I32,
            ValueKind::I64 => VType::I64,
            ValueKind::F32 => VType::F32,
            ValueKind::F64 => VType::F64,
            ValueKind::Ref => VType::Ref(RefType::Universal),
        }
    }

    fn of_param(kind: &ParamKind) -> VType {
        match kind {
            ParamKind::I32 => VType::I32,
            ParamKind::I64 => VType::I64,
            ParamKind::F32 => VType::F32,
            ParamKind::F64 => VType::F64,
            ParamKind::Ref(Some(name)) => VType::Ref(RefType::Named(name.clone())),
            ParamKind::Ref(None) => VType::Ref(RefType::Universal),
        }
    }
}

/// Abstract machine state at one instruction boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
struct State {
    stack: Vec<VType>,
    locals: Vec<Option<VType>>,
}

/// Method facts the verifier needs beside the body itself.
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'a> {
    /// Declaring class name (the receiver type of instance methods)
    pub class_name: &'a str,
    /// The method's structural signature
    pub desc: &'a MethodDesc,
    /// True when the method has no receiver slot
    pub is_static: bool,
    /// Declared local variable slot count
    pub max_locals: u16,
}

/// Structural verifier over index-form bodies.
pub struct Verifier<'a> {
    pool: &'a ConstantPool,
    resolver: &'a dyn AncestorResolver,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier over the given pool and ancestor resolver.
    pub fn new(pool: &'a ConstantPool, resolver: &'a dyn AncestorResolver) -> Self {
        Verifier { pool, resolver }
    }

    /// Verifies an index-form body, returning the computed stack ceiling.
    ///
    /// # Errors
    /// [`Error::Verification`] describing the first inconsistency found;
    /// pool and descriptor failures surface as their own error kinds.
    pub fn verify(&self, ctx: &MethodContext<'_>, editor: &CodeEditor) -> Result<Verified> {
        let ops = editor.ops();
        if ops.is_empty() {
            return Err(fail(0, "method body is empty"));
        }

        let member_descs = self.resolve_member_descs(ops)?;
        let entry = self.entry_state(ctx)?;
        let handlers = handler_index(editor.eh(), ops.len())?;

        let mut in_states: Vec<Option<State>> = vec![None; ops.len()];
        let mut work = VecDeque::new();
        in_states[0] = Some(entry);
        work.push_back(0_usize);

        let mut max_depth = 0_usize;

        while let Some(index) = work.pop_front() {
            let state = in_states[index]
                .clone()
                .ok_or_else(|| fail(index, "worklist entry without a state"))?;

            // Exceptions may transfer out of any covered instruction: the
            // handler observes this instruction's locals with a fresh
            // single-reference stack.
            for range in &handlers[index] {
                let handler_state = State {
                    stack: vec![VType::Ref(RefType::Universal)],
                    locals: state.locals.clone(),
                };
                self.flow_to(range.handler, handler_state, &mut in_states, &mut work)?;
            }

            let mut out = state.clone();
            let op = &ops[index];
            self.transfer(ctx, index, op, &mut out, &member_descs)?;
            max_depth = max_depth.max(state.stack.len()).max(out.stack.len());

            match op.flow_type() {
                FlowType::Normal => {
                    let next = index + 1;
                    if next >= ops.len() {
                        return Err(fail(index, "execution falls off the end of the body"));
                    }
                    self.flow_to(next, out, &mut in_states, &mut work)?;
                }
                FlowType::Branch => {
                    let target = branch_target(op, index, ops.len())?;
                    self.flow_to(target, out, &mut in_states, &mut work)?;
                }
                FlowType::ConditionalBranch => {
                    let target = branch_target(op, index, ops.len())?;
                    let next = index + 1;
                    if next >= ops.len() {
                        return Err(fail(index, "execution falls off the end of the body"));
                    }
                    self.flow_to(target, out.clone(), &mut in_states, &mut work)?;
                    self.flow_to(next, out, &mut in_states, &mut work)?;
                }
                FlowType::Return | FlowType::Throw => {}
            }
        }

        let max_stack = u16::try_from(max_depth)
            .map_err(|_| fail(0, "operand stack depth exceeds the format limit"))?;
        Ok(Verified { max_stack })
    }

    fn resolve_member_descs(&self, ops: &[Op]) -> Result<HashMap<u16, MethodDesc>> {
        let mut descs = HashMap::new();
        for op in ops {
            if let Op::GetField(index)
            | Op::PutField(index)
            | Op::GetStatic(index)
            | Op::PutStatic(index)
            | Op::InvokeVirtual(index)
            | Op::InvokeStatic(index) = op
            {
                if !descs.contains_key(index) {
                    let member = self.pool.member_ref(*index)?;
                    descs.insert(*index, MethodDesc::parse(member.desc)?);
                }
            }
        }
        Ok(descs)
    }

    fn entry_state(&self, ctx: &MethodContext<'_>) -> Result<State> {
        let mut locals: Vec<Option<VType>> = vec![None; ctx.max_locals as usize];
        let mut slot = 0_usize;
        if !ctx.is_static {
            if locals.is_empty() {
                return Err(fail(0, "max_locals leaves no room for the receiver"));
            }
            locals[0] = Some(VType::Ref(RefType::Named(Arc::from(ctx.class_name))));
            slot = 1;
        }
        for param in &ctx.desc.params {
            if slot >= locals.len() {
                return Err(fail(0, "max_locals leaves no room for the parameters"));
            }
            locals[slot] = Some(VType::of_param(param));
            slot += 1;
        }
        Ok(State {
            stack: Vec::new(),
            locals,
        })
    }

    fn flow_to(
        &self,
        index: usize,
        state: State,
        in_states: &mut [Option<State>],
        work: &mut VecDeque<usize>,
    ) -> Result<()> {
        match &mut in_states[index] {
            slot @ None => {
                *slot = Some(state);
                work.push_back(index);
            }
            Some(existing) => {
                let merged = self.merge(index, existing, &state)?;
                if merged != *existing {
                    *existing = merged;
                    work.push_back(index);
                }
            }
        }
        Ok(())
    }

    fn merge(&self, index: usize, a: &State, b: &State) -> Result<State> {
        if a.stack.len() != b.stack.len() {
            return Err(fail(
                index,
                &format!(
                    "operand stack depth differs at join ({} vs {})",
                    a.stack.len(),
                    b.stack.len()
                ),
            ));
        }
        let mut stack = Vec::with_capacity(a.stack.len());
        for (left, right) in a.stack.iter().zip(&b.stack) {
            let merged = self.merge_vtype(left, right).ok_or_else(|| {
                fail(
                    index,
                    &format!(
                        "incompatible stack entries at join ({:?} vs {:?})",
                        left.kind(),
                        right.kind()
                    ),
                )
            })?;
            stack.push(merged);
        }

        let mut locals = Vec::with_capacity(a.locals.len());
        for (left, right) in a.locals.iter().zip(&b.locals) {
            let merged = match (left, right) {
                (Some(l), Some(r)) => self.merge_vtype(l, r),
                _ => None,
            };
            locals.push(merged);
        }
        Ok(State { stack, locals })
    }

    fn merge_vtype(&self, a: &VType, b: &VType) -> Option<VType> {
        match (a, b) {
            (VType::Ref(left), VType::Ref(right)) => Some(VType::Ref(self.merge_ref(left, right))),
            (left, right) if left == right => Some(left.clone()),
            _ => None,
        }
    }

    fn merge_ref(&self, a: &RefType, b: &RefType) -> RefType {
        match (a, b) {
            (RefType::Null, other) | (other, RefType::Null) => other.clone(),
            (RefType::Universal, _) | (_, RefType::Universal) => RefType::Universal,
            (RefType::Named(left), RefType::Named(right)) => {
                if left == right {
                    RefType::Named(left.clone())
                } else {
                    match self.resolver.common_ancestor(left, right) {
                        Some(name) => RefType::Named(name),
                        None => RefType::Universal,
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn transfer(
        &self,
        ctx: &MethodContext<'_>,
        index: usize,
        op: &Op,
        state: &mut State,
        member_descs: &HashMap<u16, MethodDesc>,
    ) -> Result<()> {
        let pop = |state: &mut State, kind: ValueKind| -> Result<VType> {
            let value = state
                .stack
                .pop()
                .ok_or_else(|| fail(index, "operand stack underflow"))?;
            if value.kind() != kind {
                return Err(fail(
                    index,
                    &format!("expected {kind} on the stack, found {}", value.kind()),
                ));
            }
            Ok(value)
        };

        match op {
            Op::Nop => {}
            Op::LdcI32(_) => state.stack.push(VType::I32),
            Op::LdcI64(_) => state.stack.push(VType::I64),
            Op::LdcF32(_) => state.stack.push(VType::F32),
            Op::LdcF64(_) => state.stack.push(VType::F64),
            Op::LdcStr(_) => state.stack.push(VType::Ref(RefType::Universal)),
            Op::LdcNull => state.stack.push(VType::Ref(RefType::Null)),
            Op::Load(kind, slot) => {
                let value = state
                    .locals
                    .get(*slot as usize)
                    .ok_or_else(|| fail(index, &format!("local slot {slot} out of range")))?
                    .clone()
                    .ok_or_else(|| fail(index, &format!("local slot {slot} is undefined here")))?;
                if value.kind() != *kind {
                    return Err(fail(
                        index,
                        &format!("local slot {slot} holds {}, not {kind}", value.kind()),
                    ));
                }
                state.stack.push(value);
            }
            Op::Store(kind, slot) => {
                let value = pop(state, *kind)?;
                let slot = *slot as usize;
                if slot >= state.locals.len() {
                    return Err(fail(index, &format!("local slot {slot} out of range")));
                }
                state.locals[slot] = Some(value);
            }
            Op::Pop => {
                state
                    .stack
                    .pop()
                    .ok_or_else(|| fail(index, "operand stack underflow"))?;
            }
            Op::Dup => {
                let top = state
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| fail(index, "operand stack underflow"))?;
                state.stack.push(top);
            }
            Op::GetField(member) | Op::GetStatic(member) => {
                let desc = &member_descs[member];
                if !desc.params.is_empty() {
                    return Err(fail(index, "field access through a method descriptor"));
                }
                if matches!(op, Op::GetField(_)) {
                    pop(state, ValueKind::Ref)?;
                }
                match &desc.ret {
                    ReturnKind::Void => {
                        return Err(fail(index, "field of void kind"));
                    }
                    ReturnKind::Value(kind) => state.stack.push(VType::of_param(kind)),
                }
            }
            Op::PutField(member) | Op::PutStatic(member) => {
                let desc = &member_descs[member];
                if !desc.params.is_empty() {
                    return Err(fail(index, "field access through a method descriptor"));
                }
                let kind = match &desc.ret {
                    ReturnKind::Void => {
                        return Err(fail(index, "field of void kind"));
                    }
                    ReturnKind::Value(kind) => ValueKind::from(kind),
                };
                pop(state, kind)?;
                if matches!(op, Op::PutField(_)) {
                    pop(state, ValueKind::Ref)?;
                }
            }
            Op::InvokeVirtual(member) | Op::InvokeStatic(member) => {
                let desc = &member_descs[member];
                for param in desc.params.iter().rev() {
                    pop(state, ValueKind::from(param))?;
                }
                if matches!(op, Op::InvokeVirtual(_)) {
                    pop(state, ValueKind::Ref)?;
                }
                if let Some(kind) = ValueKind::of_return(&desc.ret) {
                    state.stack.push(VType::of_kind(kind));
                }
            }
            Op::Br(_) => {}
            Op::BrFalse(_) => {
                pop(state, ValueKind::I32)?;
            }
            Op::Ret(kind) => match (kind, &ctx.desc.ret) {
                (None, ReturnKind::Void) => {}
                (Some(actual), ReturnKind::Value(declared)) => {
                    let declared = ValueKind::from(declared);
                    if *actual != declared {
                        return Err(fail(
                            index,
                            &format!("returns {actual} from a method declared {declared}"),
                        ));
                    }
                    pop(state, *actual)?;
                }
                (None, ReturnKind::Value(_)) => {
                    return Err(fail(index, "void return from a value-returning method"));
                }
                (Some(_), ReturnKind::Void) => {
                    return Err(fail(index, "value return from a void method"));
                }
            },
            Op::Throw => {
                pop(state, ValueKind::Ref)?;
            }
        }
        Ok(())
    }
}

fn branch_target(op: &Op, index: usize, len: usize) -> Result<usize> {
    let target = match op {
        Op::Br(target) | Op::BrFalse(target) => *target as usize,
        _ => return Err(fail(index, "branch target requested for a non-branch")),
    };
    if target >= len {
        return Err(fail(index, &format!("branch target {target} out of the body")));
    }
    Ok(target)
}

fn handler_index(eh: &[EhRange], len: usize) -> Result<Vec<Vec<EhRange>>> {
    let mut covering: Vec<Vec<EhRange>> = vec![Vec::new(); len];
    for range in eh {
        if range.start >= range.end || range.end > len || range.handler >= len {
            return Err(fail(
                range.start,
                &format!(
                    "malformed exception range {}..{} -> {}",
                    range.start, range.end, range.handler
                ),
            ));
        }
        for slot in covering.iter_mut().take(range.end).skip(range.start) {
            slot.push(*range);
        }
    }
    Ok(covering)
}

fn fail(index: usize, message: &str) -> Error {
    #[allow(clippy::cast_possible_truncation)]
    Error::Verification {
        offset: index as u32,
        message: message.to_string(),
    }
}

/// Verifies a parsed method against its declared limits.
///
/// Convenience wrapper that lifts the body into index form, runs the
/// [`Verifier`], and additionally checks the declared `max_stack` covers the
/// computed ceiling. Abstract methods verify trivially.
///
/// # Errors
/// Decoding errors from lifting, or [`Error::Verification`] as above.
pub fn verify_method(
    class_name: &str,
    method: &Method,
    pool: &ConstantPool,
    resolver: &dyn AncestorResolver,
) -> Result<Verified> {
    if method.is_abstract() {
        return Ok(Verified { max_stack: 0 });
    }
    let editor = CodeEditor::from_method(method, pool)?;
    let ctx = MethodContext {
        class_name,
        desc: &method.desc,
        is_static: method.is_static(),
        max_locals: method.max_locals,
    };
    let verified = Verifier::new(pool, resolver).verify(&ctx, &editor)?;
    if verified.max_stack > method.max_stack {
        return Err(fail(
            0,
            &format!(
                "declared max_stack {} but execution reaches depth {}",
                method.max_stack, verified.max_stack
            ),
        ));
    }
    Ok(verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::ancestry::{ClassRegistry, RegistryResolver, UniversalBase};
    use crate::class::MemberFlags;

    fn make_method(desc: &str, max_stack: u16, max_locals: u16, ops: &[Op]) -> (Method, ConstantPool) {
        let pool = ConstantPool::new();
        let mut method = Method {
            flags: MemberFlags::PUBLIC,
            name: "a".into(),
            desc: MethodDesc::parse(desc).unwrap(),
            max_stack,
            max_locals,
            code: Vec::new(),
            exceptions: Vec::new(),
        };
        let editor = CodeEditor::from_parts(ops.to_vec(), vec![]);
        editor.store(&mut method).unwrap();
        (method, pool)
    }

    #[test]
    fn test_trivial_void_method() {
        let (method, pool) = make_method("()v", 0, 1, &[Op::Ret(None)]);
        let verified = verify_method("cq", &method, &pool, &UniversalBase).unwrap();
        assert_eq!(verified.max_stack, 0);
    }

    #[test]
    fn test_stack_depth_computed() {
        let ops = [Op::LdcI32(1), Op::Dup, Op::Pop, Op::Pop, Op::Ret(None)];
        let (method, pool) = make_method("()v", 2, 1, &ops);
        let verified = verify_method("cq", &method, &pool, &UniversalBase).unwrap();
        assert_eq!(verified.max_stack, 2);
    }

    #[test]
    fn test_declared_max_stack_enforced() {
        let ops = [Op::LdcI32(1), Op::Dup, Op::Pop, Op::Pop, Op::Ret(None)];
        let (method, pool) = make_method("()v", 1, 1, &ops);
        assert!(verify_method("cq", &method, &pool, &UniversalBase).is_err());
    }

    #[test]
    fn test_underflow_rejected() {
        let (method, pool) = make_method("()v", 1, 1, &[Op::Pop, Op::Ret(None)]);
        assert!(verify_method("cq", &method, &pool, &UniversalBase).is_err());
    }

    #[test]
    fn test_falls_off_end_rejected() {
        let (method, pool) = make_method("()v", 1, 1, &[Op::Nop]);
        assert!(verify_method("cq", &method, &pool, &UniversalBase).is_err());
    }

    #[test]
    fn test_return_kind_mismatch_rejected() {
        let (method, pool) = make_method("()i", 1, 1, &[Op::Ret(None)]);
        assert!(verify_method("cq", &method, &pool, &UniversalBase).is_err());
        let (method, pool) = make_method("()v", 1, 1, &[Op::LdcI32(0), Op::Ret(Some(ValueKind::I32))]);
        assert!(verify_method("cq", &method, &pool, &UniversalBase).is_err());
    }

    #[test]
    fn test_branch_join_consistent_stack() {
        // if (param) { x = 1 } else { x = 2 }; return x
        let ops = [
            Op::Load(ValueKind::I32, 1),  // 0
            Op::BrFalse(4),               // 1
            Op::LdcI32(1),                // 2
            Op::Br(5),                    // 3
            Op::LdcI32(2),                // 4
            Op::Ret(Some(ValueKind::I32)), // 5: join
        ];
        let (method, pool) = make_method("(i)i", 1, 2, &ops);
        verify_method("cq", &method, &pool, &UniversalBase).unwrap();
    }

    #[test]
    fn test_branch_join_depth_mismatch_rejected() {
        let ops = [
            Op::Load(ValueKind::I32, 1),  // 0
            Op::BrFalse(3),               // 1: fallthrough pushes, target does not
            Op::LdcI32(1),                // 2
            Op::Nop,                      // 3: join with depth 0 vs 1
            Op::Ret(None),                // 4
        ];
        let (method, pool) = make_method("(i)v", 1, 2, &ops);
        assert!(verify_method("cq", &method, &pool, &UniversalBase).is_err());
    }

    #[test]
    fn test_local_kind_mismatch_rejected() {
        let ops = [
            Op::LdcF32(1.0),
            Op::Store(ValueKind::F32, 0),
            Op::Load(ValueKind::I32, 0),
            Op::Pop,
            Op::Ret(None),
        ];
        let (method, pool) = make_method("()v", 1, 1, &ops);
        let mut method = method;
        method.flags |= MemberFlags::STATIC;
        assert!(verify_method("cq", &method, &pool, &UniversalBase).is_err());
    }

    #[test]
    fn test_invoke_effects() {
        let mut pool = ConstantPool::new();
        let member = pool.intern_member("cq", "x", "(f)v").unwrap();
        let ops = [
            Op::Load(ValueKind::Ref, 0),
            Op::LdcF32(2.0),
            Op::InvokeVirtual(member),
            Op::Ret(None),
        ];
        let mut method = Method {
            flags: MemberFlags::PUBLIC,
            name: "a".into(),
            desc: MethodDesc::parse("()v").unwrap(),
            max_stack: 2,
            max_locals: 1,
            code: Vec::new(),
            exceptions: Vec::new(),
        };
        CodeEditor::from_parts(ops.to_vec(), vec![]).store(&mut method).unwrap();
        let verified = verify_method("cq", &method, &pool, &UniversalBase).unwrap();
        assert_eq!(verified.max_stack, 2);
    }

    #[test]
    fn test_exception_handler_entry_state() {
        let mut pool = ConstantPool::new();
        let member = pool.intern_member("cq", "risky", "()v").unwrap();
        // try { this.risky() } catch { pop; return }  return
        let ops = [
            Op::Load(ValueKind::Ref, 0), // 0
            Op::InvokeVirtual(member),   // 1
            Op::Ret(None),               // 2
            Op::Pop,                     // 3: handler, stack = [ref]
            Op::Ret(None),               // 4
        ];
        let mut method = Method {
            flags: MemberFlags::PUBLIC,
            name: "a".into(),
            desc: MethodDesc::parse("()v").unwrap(),
            max_stack: 1,
            max_locals: 1,
            code: Vec::new(),
            exceptions: Vec::new(),
        };
        CodeEditor::from_parts(
            ops.to_vec(),
            vec![EhRange { start: 0, end: 2, handler: 3 }],
        )
        .store(&mut method)
        .unwrap();
        verify_method("cq", &method, &pool, &UniversalBase).unwrap();
    }

    #[test]
    fn test_ref_merge_uses_resolver() {
        // Two branches load differently-named refs into the same slot; the
        // registry-backed resolver meets them at their recorded parent, the
        // conservative one flattens to universal. Both must verify.
        let mut pool = ConstantPool::new();
        let player = pool.intern_member("w", "p", "()Laxg;").unwrap();
        let animal = pool.intern_member("w", "t", "()Lcii;").unwrap();
        let ops = [
            Op::Load(ValueKind::I32, 1),   // 0
            Op::BrFalse(5),                // 1
            Op::Load(ValueKind::Ref, 0),   // 2
            Op::InvokeVirtual(player),     // 3
            Op::Br(7),                     // 4
            Op::Load(ValueKind::Ref, 0),   // 5
            Op::InvokeVirtual(animal),     // 6
            Op::Store(ValueKind::Ref, 2),  // 7: join of axg and cii
            Op::Ret(None),                 // 8
        ];
        let mut method = Method {
            flags: MemberFlags::PUBLIC,
            name: "a".into(),
            desc: MethodDesc::parse("(i)v").unwrap(),
            max_stack: 1,
            max_locals: 3,
            code: Vec::new(),
            exceptions: Vec::new(),
        };
        CodeEditor::from_parts(ops.to_vec(), vec![]).store(&mut method).unwrap();

        verify_method("w", &method, &pool, &UniversalBase).unwrap();

        let registry = ClassRegistry::new();
        registry.record("cq", Some("ce"));
        registry.record("axg", Some("cq"));
        registry.record("cii", Some("cq"));
        let resolver = RegistryResolver::new(std::sync::Arc::new(registry));
        verify_method("w", &method, &pool, &resolver).unwrap();
    }
}
