//! Ancestor resolution for reference-type merges.
//!
//! When the verifier merges two different reference types at a control flow
//! join it needs their common ancestor. Asking the host's own type system
//! would be the precise answer, but doing so during a rewrite risks reentrant
//! class loading inside the load pipeline - the crash the original design
//! explicitly worked around by flattening every such merge to the universal
//! base type.
//!
//! This module keeps that conservative answer available ([`UniversalBase`])
//! but defaults to something better: a resolver backed by the
//! [`ClassRegistry`] of classes the loader has *already observed*. It answers
//! from recorded facts only and never triggers loading, falling back to the
//! universal base the moment a chain leaves the recorded universe.

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

/// Resolves the common ancestor of two reference types.
///
/// Returning `None` means "the universal base type" - the answer every
/// resolver gives when it cannot do better.
pub trait AncestorResolver: Send + Sync {
    /// Common ancestor class name of `a` and `b`, or `None` for the
    /// universal base. Callers only invoke this for `a != b`.
    fn common_ancestor(&self, a: &str, b: &str) -> Option<Arc<str>>;
}

/// The conservative resolver: every merge flattens to the universal base.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniversalBase;

impl AncestorResolver for UniversalBase {
    fn common_ancestor(&self, _a: &str, _b: &str) -> Option<Arc<str>> {
        None
    }
}

/// Superclass facts recorded for every class the loader has seen.
///
/// Populated by the agent as class blobs flow through the load pipeline,
/// before any rewriting happens, so by the time a method that mentions a
/// class is being verified, that class's link in the chain is usually
/// already recorded. Lock-free; concurrent recorders of the same class are
/// harmless because the recorded fact is identical.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    supers: SkipMap<Arc<str>, Option<Arc<str>>>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ClassRegistry::default()
    }

    /// Records a class and its superclass.
    pub fn record(&self, name: &str, superclass: Option<&str>) {
        self.supers
            .insert(Arc::from(name), superclass.map(Arc::from));
    }

    /// True when the class has been observed.
    pub fn contains(&self, name: &str) -> bool {
        self.supers.contains_key(name)
    }

    /// The recorded superclass chain starting at `name` itself.
    ///
    /// The walk stops at the first unrecorded class (or a cycle, which a
    /// well-formed host never produces but a hostile blob might).
    pub fn chain(&self, name: &str) -> Vec<Arc<str>> {
        let mut chain: Vec<Arc<str>> = vec![Arc::from(name)];
        let mut current: Arc<str> = Arc::from(name);
        loop {
            let Some(entry) = self.supers.get(current.as_ref()) else {
                break;
            };
            let Some(parent) = entry.value().clone() else {
                break;
            };
            if chain.iter().any(|seen| *seen == parent) {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }
}

/// Resolver backed by recorded superclass chains.
#[derive(Debug, Clone)]
pub struct RegistryResolver {
    registry: Arc<ClassRegistry>,
}

impl RegistryResolver {
    /// Creates a resolver over the given registry.
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        RegistryResolver { registry }
    }
}

impl AncestorResolver for RegistryResolver {
    fn common_ancestor(&self, a: &str, b: &str) -> Option<Arc<str>> {
        let left = self.registry.chain(a);
        for candidate in self.registry.chain(b) {
            if left.iter().any(|name| *name == candidate) {
                return Some(candidate);
            }
        }
        None
    }
}
