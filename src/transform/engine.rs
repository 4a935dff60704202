//! The class transform engine.
//!
//! Sits in the host's class-loading path: every class blob flows through
//! [`TransformEngine::transform`], which answers `None` ("load the original
//! bytes") far more often than it rewrites. The engine's failure policy is
//! absolute - a missing match is silence, a bad rule is a logged skip, and
//! nothing, including a panic in this crate's own code, may surface into the
//! host's loader.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::bytecode::{AncestorResolver, CodeEditor, MethodContext, UniversalBase, Verifier};
use crate::class::ClassFile;
use crate::transform::rewriter;
use crate::transform::rule::{RewriteAction, TransformRule};
use crate::Result;

/// Applies a pinned rule set to classes as the host loads them.
pub struct TransformEngine {
    rules: Vec<TransformRule>,
    resolver: Arc<dyn AncestorResolver>,
}

impl TransformEngine {
    /// Creates an engine using the conservative universal-base resolver.
    pub fn new(rules: Vec<TransformRule>) -> TransformEngine {
        TransformEngine {
            rules,
            resolver: Arc::new(UniversalBase),
        }
    }

    /// Creates an engine verifying through the given ancestor resolver.
    pub fn with_resolver(
        rules: Vec<TransformRule>,
        resolver: Arc<dyn AncestorResolver>,
    ) -> TransformEngine {
        TransformEngine { rules, resolver }
    }

    /// The rule set, as pinned at startup.
    pub fn rules(&self) -> &[TransformRule] {
        &self.rules
    }

    /// Transforms one class blob.
    ///
    /// Returns `Some(bytes)` only when at least one rule applied and the
    /// rewritten class re-verified; `None` means "keep the original". This
    /// function never panics and never errors.
    pub fn transform(&self, class_name: &str, data: &[u8]) -> Option<Vec<u8>> {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.transform_inner(class_name, data)));
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(class = class_name, "transform panicked; class left unmodified");
                None
            }
        }
    }

    fn transform_inner(&self, class_name: &str, data: &[u8]) -> Option<Vec<u8>> {
        let matching: Vec<&TransformRule> = self
            .rules
            .iter()
            .filter(|rule| rule.target_class == class_name)
            .collect();
        if matching.is_empty() {
            return None;
        }

        let mut class = match ClassFile::from_bytes(data) {
            Ok(class) => class,
            Err(err) => {
                tracing::warn!(class = class_name, error = %err, "unparseable class; left unmodified");
                return None;
            }
        };

        let mut changed = false;
        for rule in matching {
            match self.apply_rule(&mut class, rule) {
                Ok(true) => changed = true,
                Ok(false) => {
                    tracing::debug!(
                        class = class_name,
                        method = %rule.method.name,
                        "transform skipped: no method of the pinned shape"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        class = class_name,
                        method = %rule.method.name,
                        error = %err,
                        "rule failed; method left unmodified"
                    );
                }
            }
        }
        if !changed {
            return None;
        }

        match class.to_bytes() {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(class = class_name, error = %err, "re-encode failed; class left unmodified");
                None
            }
        }
    }

    /// Applies one rule. `Ok(false)` is the silent no-match case; any error
    /// leaves the class untouched because all edits happen on clones that
    /// are only committed after verification.
    fn apply_rule(&self, class: &mut ClassFile, rule: &TransformRule) -> Result<bool> {
        let Some(position) = class
            .methods
            .iter()
            .position(|method| !method.is_abstract() && rule.method.matches(method))
        else {
            return Ok(false);
        };

        let mut method = class.methods[position].clone();
        let mut pool = class.pool.clone();
        let mut editor = CodeEditor::from_method(&method, &pool)?;

        match &rule.action {
            RewriteAction::GuardedCallout { hook, default } => {
                rewriter::guarded_callout(&mut editor, &method, &mut pool, hook, *default)?;
            }
            RewriteAction::FullReplace { hook } => {
                rewriter::full_replace(&mut editor, &method, &mut pool, hook)?;
            }
            RewriteAction::FieldOverride { field, value } => {
                rewriter::field_override(
                    &mut editor,
                    &class.name,
                    &class.fields,
                    &method,
                    &mut pool,
                    field,
                    value,
                )?;
            }
            RewriteAction::PreReturnInject { hook } => {
                rewriter::pre_return_inject(&mut editor, &method, &mut pool, hook)?;
            }
        }

        let ctx = MethodContext {
            class_name: &class.name,
            desc: &method.desc,
            is_static: method.is_static(),
            max_locals: method.max_locals,
        };
        let verified = Verifier::new(&pool, self.resolver.as_ref()).verify(&ctx, &editor)?;

        editor.store(&mut method)?;
        method.max_stack = method.max_stack.max(verified.max_stack);
        class.methods[position] = method;
        class.pool = pool;
        Ok(true)
    }
}
