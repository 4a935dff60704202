//! The four rewrite actions, as edits over index-form bodies.
//!
//! Each function mutates a [`CodeEditor`] (and interns what it needs into
//! the class pool) but never encodes, never verifies - the engine does both
//! after the edit, and reverts the method wholesale if either step objects.

use crate::bytecode::{CodeEditor, Op, ValueKind};
use crate::class::{ConstantPool, Field, MemberFlags, Method, ParamKind, ReturnKind};
use crate::transform::rule::{DefaultReturn, FieldValue, HOOK_OWNER};
use crate::Result;

fn desc_char(kind: ValueKind) -> char {
    match kind {
        ValueKind::I32 => 'i',
        ValueKind::I64 => 'l',
        ValueKind::F32 => 'f',
        ValueKind::F64 => 'd',
        ValueKind::Ref => 'A',
    }
}

fn ret_char(ret: &ReturnKind) -> char {
    match ret {
        ReturnKind::Void => 'v',
        ReturnKind::Value(kind) => desc_char(ValueKind::from(kind)),
    }
}

fn receiver_op(method: &Method) -> Op {
    if method.is_static() {
        Op::LdcNull
    } else {
        Op::Load(ValueKind::Ref, 0)
    }
}

fn default_return_ops(default: DefaultReturn) -> Vec<Op> {
    match default {
        DefaultReturn::Void => vec![Op::Ret(None)],
        DefaultReturn::False | DefaultReturn::Zero => {
            vec![Op::LdcI32(0), Op::Ret(Some(ValueKind::I32))]
        }
        DefaultReturn::Null => vec![Op::LdcNull, Op::Ret(Some(ValueKind::Ref))],
    }
}

fn default_matches_ret(default: DefaultReturn, ret: &ReturnKind) -> bool {
    match default {
        DefaultReturn::Void => *ret == ReturnKind::Void,
        DefaultReturn::False | DefaultReturn::Zero => {
            matches!(ret, ReturnKind::Value(kind) if ValueKind::from(kind) == ValueKind::I32)
        }
        DefaultReturn::Null => {
            matches!(ret, ReturnKind::Value(kind) if ValueKind::from(kind) == ValueKind::Ref)
        }
    }
}

/// Prepends `if hook(receiver, primaryArgument) return <default>;`.
///
/// The primary argument is the first declared parameter; methods without
/// parameters pass null. The hook answers `true` to cancel.
///
/// # Errors
/// [`crate::Error::Malformed`] when the rule's default return does not match
/// the method's return kind; pool errors if interning fails.
pub(crate) fn guarded_callout(
    editor: &mut CodeEditor,
    method: &Method,
    pool: &mut ConstantPool,
    hook: &'static str,
    default: DefaultReturn,
) -> Result<()> {
    if !default_matches_ret(default, &method.desc.ret) {
        return Err(malformed_error!(
            "Guarded call-out default {default:?} does not fit method '{}' returning {:?}",
            method.name,
            method.desc.ret
        ));
    }

    let mut prefix = vec![receiver_op(method)];
    let primary = match method.desc.params.first() {
        Some(kind) => {
            let kind = ValueKind::from(kind);
            let slot = u16::from(!method.is_static());
            prefix.push(Op::Load(kind, slot));
            desc_char(kind)
        }
        None => {
            prefix.push(Op::LdcNull);
            'A'
        }
    };

    let member = pool.intern_member(HOOK_OWNER, hook, &format!("(A{primary})i"))?;
    prefix.push(Op::InvokeStatic(member));

    let default_ops = default_return_ops(default);
    // Skip past the br.false itself and the cancelled-path return sequence.
    #[allow(clippy::cast_possible_truncation)]
    let original_start = (prefix.len() + 1 + default_ops.len()) as u32;
    prefix.push(Op::BrFalse(original_start));
    prefix.extend(default_ops);

    editor.insert(0, &prefix);
    Ok(())
}

/// Replaces the entire body with `return hook(receiver, params...);`.
///
/// # Errors
/// Pool errors if interning the hook reference fails.
pub(crate) fn full_replace(
    editor: &mut CodeEditor,
    method: &Method,
    pool: &mut ConstantPool,
    hook: &'static str,
) -> Result<()> {
    let mut ops = vec![receiver_op(method)];
    let mut param_chars = String::from("A");
    let base = u16::from(!method.is_static());
    for (index, kind) in method.desc.params.iter().enumerate() {
        let kind = ValueKind::from(kind);
        #[allow(clippy::cast_possible_truncation)]
        ops.push(Op::Load(kind, base + index as u16));
        param_chars.push(desc_char(kind));
    }

    let desc = format!("({param_chars}){}", ret_char(&method.desc.ret));
    let member = pool.intern_member(HOOK_OWNER, hook, &desc)?;
    ops.push(Op::InvokeStatic(member));
    ops.push(Op::Ret(crate::bytecode::ValueKind::of_return(&method.desc.ret)));

    editor.replace_all(ops);
    Ok(())
}

/// Forces `field = value` immediately before every return instruction.
///
/// The field must be declared by the class being transformed; static fields
/// assign through `putstatic`, instance fields load the receiver first (and
/// therefore require an instance method).
///
/// # Errors
/// [`crate::Error::StructuralMismatch`] when the field is not declared or
/// the constant's kind does not fit it - the engine skips the rule.
pub(crate) fn field_override(
    editor: &mut CodeEditor,
    class_name: &str,
    fields: &[Field],
    method: &Method,
    pool: &mut ConstantPool,
    field_name: &str,
    value: &FieldValue,
) -> Result<()> {
    let field = fields
        .iter()
        .find(|f| f.name == field_name)
        .ok_or_else(|| crate::Error::StructuralMismatch {
            class: class_name.to_string(),
            operation: format!("field_override({field_name})"),
        })?;

    let field_kind = match &field.desc.ret {
        ReturnKind::Value(kind) => ValueKind::from(kind),
        ReturnKind::Void => {
            return Err(malformed_error!("Field '{field_name}' declares a void kind"))
        }
    };
    let value_fits = match value {
        FieldValue::Str(_) => field_kind == ValueKind::Ref,
        FieldValue::I32(_) => field_kind == ValueKind::I32,
    };
    if !value_fits {
        return Err(crate::Error::StructuralMismatch {
            class: class_name.to_string(),
            operation: format!("field_override({field_name}): constant kind mismatch"),
        });
    }

    let is_static = field.flags.contains(MemberFlags::STATIC);
    if !is_static && method.is_static() {
        return Err(malformed_error!(
            "Instance field '{field_name}' cannot be assigned from a static method"
        ));
    }

    let desc = match &field.desc.ret {
        ReturnKind::Value(ParamKind::Ref(Some(name))) => format!("()L{name};"),
        ReturnKind::Value(kind) => format!("(){}", desc_char(ValueKind::from(kind))),
        ReturnKind::Void => unreachable!(),
    };
    let member = pool.intern_member(class_name, field_name, &desc)?;

    let constant = match value {
        FieldValue::Str(text) => Op::LdcStr(pool.intern_utf8(text)?),
        FieldValue::I32(number) => Op::LdcI32(*number),
    };

    let sequence = if is_static {
        vec![constant, Op::PutStatic(member)]
    } else {
        vec![Op::Load(ValueKind::Ref, 0), constant, Op::PutField(member)]
    };

    for index in editor.ret_indices().into_iter().rev() {
        editor.insert(index, &sequence);
    }
    Ok(())
}

/// Calls `hook(receiver)` immediately before every return instruction.
///
/// Handles any number of exit paths; throw edges and the exception table are
/// left untouched (returns inside a covered range stay covered).
///
/// # Errors
/// Pool errors if interning the hook reference fails.
pub(crate) fn pre_return_inject(
    editor: &mut CodeEditor,
    method: &Method,
    pool: &mut ConstantPool,
    hook: &'static str,
) -> Result<()> {
    let member = pool.intern_member(HOOK_OWNER, hook, "(A)v")?;
    let receiver = receiver_op(method);
    for index in editor.ret_indices().into_iter().rev() {
        editor.insert(index, &[receiver.clone(), Op::InvokeStatic(member)]);
    }
    Ok(())
}
