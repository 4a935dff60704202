//! Transform rules: what to rewrite, and how.
//!
//! Rules are static, defined once at startup, and hand-pinned to one host
//! version - there is no discovery. A rule identifies its target by
//! `(class name, method name pattern, parameter shape)`: method names inside
//! the host are meaningless strings, so shape carries half the match.

use crate::adapter::RetShape;
use crate::bytecode::ValueKind;
use crate::class::{Method, ParamKind, ReturnKind};

/// Pool owner name of every injected dispatch call.
///
/// The symbolic class the rewriter's `invokestatic` references; the agent
/// registers each hook under `"<HOOK_OWNER>.<hook>"` in the linkage table so
/// these references resolve from any loading context the host creates.
pub const HOOK_OWNER: &str = "hostgraft/Hooks";

/// One parameter position of a method pattern.
///
/// Same-named methods on a target class frequently differ only in which
/// opaque message type they take, so a pattern can pin a reference down to
/// its class name, not just its category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamPattern {
    /// Any parameter of the given category
    Kind(ValueKind),
    /// A reference parameter declared with exactly this class name
    RefTo(String),
}

impl ParamPattern {
    /// Shorthand for a named-reference position.
    pub fn ref_to(name: &str) -> ParamPattern {
        ParamPattern::RefTo(name.to_string())
    }

    fn matches(&self, declared: &ParamKind) -> bool {
        match self {
            ParamPattern::Kind(kind) => ValueKind::from(declared) == *kind,
            ParamPattern::RefTo(name) => {
                matches!(declared, ParamKind::Ref(Some(declared_name))
                    if declared_name.as_ref() == name.as_str())
            }
        }
    }
}

/// Structural pattern selecting one method of the target class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPattern {
    /// Pinned method name
    pub name: String,
    /// Expected parameter shapes, in order
    pub params: Vec<ParamPattern>,
    /// Expected return shape
    pub ret: RetShape,
}

impl MethodPattern {
    /// Builds a pattern.
    pub fn new(name: &str, params: &[ParamPattern], ret: RetShape) -> MethodPattern {
        MethodPattern {
            name: name.to_string(),
            params: params.to_vec(),
            ret,
        }
    }

    /// Whether a declared method matches this pattern.
    pub fn matches(&self, method: &Method) -> bool {
        if method.name != self.name || method.desc.params.len() != self.params.len() {
            return false;
        }
        let params_match = method
            .desc
            .params
            .iter()
            .zip(&self.params)
            .all(|(declared, expected)| expected.matches(declared));
        if !params_match {
            return false;
        }
        match self.ret {
            RetShape::Void => method.desc.ret == ReturnKind::Void,
            RetShape::Numeric => method.desc.ret.is_numeric(),
            RetShape::Kind(kind) => match &method.desc.ret {
                ReturnKind::Void => false,
                ReturnKind::Value(value) => ValueKind::from(value) == kind,
            },
        }
    }
}

/// What a cancelled guarded call-out returns in place of the original body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultReturn {
    /// Return immediately from a void method
    Void,
    /// Return `false` from a boolean method
    False,
    /// Return the null reference
    Null,
    /// Return integer zero
    Zero,
}

/// Constant forced into a field by a field-override rewrite.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A string constant
    Str(String),
    /// An integer constant
    I32(i32),
}

/// The four rewrite actions.
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteAction {
    /// Before the original body, call `hook(receiver, primaryArgument)`; if
    /// it signals cancellation, return `default` instead of running the body.
    GuardedCallout {
        /// Dispatch entry name under [`HOOK_OWNER`]
        hook: &'static str,
        /// What the cancelled path returns
        default: DefaultReturn,
    },
    /// Discard the body entirely; the method becomes a single call to the
    /// hook (receiver and parameters forwarded) whose result is returned.
    FullReplace {
        /// Dispatch entry name under [`HOOK_OWNER`]
        hook: &'static str,
    },
    /// Leave the body intact but force an assignment to `field` immediately
    /// before every return.
    FieldOverride {
        /// Name of a field declared by the target class
        field: String,
        /// The constant to assign
        value: FieldValue,
    },
    /// Call `hook(receiver)` immediately before every return instruction.
    PreReturnInject {
        /// Dispatch entry name under [`HOOK_OWNER`]
        hook: &'static str,
    },
}

/// One complete transform rule.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRule {
    /// Name of the class this rule applies to
    pub target_class: String,
    /// Which method of that class to rewrite
    pub method: MethodPattern,
    /// How to rewrite it
    pub action: RewriteAction,
}

impl TransformRule {
    /// Builds a rule.
    pub fn new(target_class: &str, method: MethodPattern, action: RewriteAction) -> TransformRule {
        TransformRule {
            target_class: target_class.to_string(),
            method,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{MemberFlags, MethodDesc};

    fn method(name: &str, desc: &str) -> Method {
        Method {
            flags: MemberFlags::PUBLIC,
            name: name.into(),
            desc: MethodDesc::parse(desc).unwrap(),
            max_stack: 0,
            max_locals: 0,
            code: vec![0x40],
            exceptions: Vec::new(),
        }
    }

    #[test]
    fn test_pattern_matches_by_name_and_shape() {
        let pattern = MethodPattern::new("a", &[ParamPattern::Kind(ValueKind::Ref)], RetShape::Void);
        assert!(pattern.matches(&method("a", "(A)v")));
        assert!(pattern.matches(&method("a", "(Lpacket;)v")));
        assert!(!pattern.matches(&method("b", "(A)v")));
        assert!(!pattern.matches(&method("a", "(i)v")));
        assert!(!pattern.matches(&method("a", "(A)i")));
        assert!(!pattern.matches(&method("a", "(AA)v")));
    }

    #[test]
    fn test_named_ref_pattern_separates_same_named_methods() {
        let chat = MethodPattern::new("a", &[ParamPattern::ref_to("aik")], RetShape::Void);
        assert!(chat.matches(&method("a", "(Laik;)v")));
        assert!(!chat.matches(&method("a", "(Lajb;)v")));
        assert!(!chat.matches(&method("a", "(A)v")));
    }

    #[test]
    fn test_numeric_ret_pattern() {
        let pattern = MethodPattern::new("a", &[], RetShape::Numeric);
        assert!(pattern.matches(&method("a", "()i")));
        assert!(pattern.matches(&method("a", "()d")));
        assert!(!pattern.matches(&method("a", "()v")));
        assert!(!pattern.matches(&method("a", "()A")));
    }
}
