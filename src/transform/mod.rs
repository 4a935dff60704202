//! Load-time rewriting of host classes.
//!
//! The engine pattern-matches `(class name, method name, parameter shape)`
//! against a static rule set and applies one of four rewrite actions:
//!
//! 1. **Guarded call-out** - cancellable interception at method entry
//! 2. **Full replace** - responsibility displaced entirely into a hook
//! 3. **Field override** - a pinned field forced to a constant at each exit
//! 4. **Pre-return injection** - a hook call before every return
//!
//! All edits run in index form over [`CodeEditor`](crate::bytecode::CodeEditor)
//! and must pass structural verification before they are committed; a rule
//! that fails any step leaves its method exactly as the host compiled it.
//!
//! # Key Types
//! - [`TransformRule`] / [`MethodPattern`] / [`RewriteAction`] - The rule model
//! - [`TransformEngine`] - Matching, rewriting, verification, failure policy
//! - [`HOOK_OWNER`] - The symbolic owner of every injected dispatch call

mod engine;
mod rewriter;
mod rule;

pub use engine::TransformEngine;
pub use rule::{
    DefaultReturn, FieldValue, MethodPattern, ParamPattern, RewriteAction, TransformRule,
    HOOK_OWNER,
};
