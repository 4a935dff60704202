//! Structural member resolution with per-class memoization.
//!
//! Given a live object's concrete class and a logical operation, the locator
//! scans the class's declared members - then its superclasses' - against the
//! profile's pinned filter and takes the first structural match. The scan is
//! the expensive part, so its outcome (hit *or* miss) is cached keyed by the
//! concrete class identity. The cache entry is computed at most once even
//! under concurrent first callers, and a resolved handle is never
//! re-resolved for that class.

use std::sync::Arc;

use dashmap::DashMap;

use crate::adapter::profile::{HostProfile, LogicalOp};
use crate::host::{HostClass, MemberHandle};

/// Concurrent cache from `(concrete class, logical operation)` to a resolved
/// member handle.
pub struct MemberLocator {
    profile: Arc<HostProfile>,
    cache: DashMap<(Arc<str>, LogicalOp), Option<MemberHandle>>,
}

impl MemberLocator {
    /// Creates a locator resolving through the given profile.
    pub fn new(profile: Arc<HostProfile>) -> Self {
        MemberLocator {
            profile,
            cache: DashMap::new(),
        }
    }

    /// Resolves a logical operation against a concrete class.
    ///
    /// Returns `None` when the profile has no pin for the operation or no
    /// member of the pinned shape exists anywhere on the class chain - the
    /// StructuralMismatch case the adapter layer turns into defaults.
    pub fn resolve(&self, class: &Arc<HostClass>, op: LogicalOp) -> Option<MemberHandle> {
        let key = (class.name().clone(), op);
        self.cache
            .entry(key)
            .or_insert_with(|| self.scan(class, op))
            .value()
            .clone()
    }

    fn scan(&self, class: &Arc<HostClass>, op: LogicalOp) -> Option<MemberHandle> {
        let spec = self.profile.spec(op)?;
        let mut current = Some(class.clone());
        while let Some(owner) = current {
            for (index, member) in owner.members() {
                if spec.matches(member) {
                    return Some(MemberHandle {
                        owner: owner.clone(),
                        index,
                    });
                }
            }
            current = owner.superclass().cloned();
        }
        None
    }

    /// Number of `(class, operation)` pairs resolved so far, hits and misses.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::MethodDesc;
    use crate::host::{HostMember, MemberKind};

    fn profile() -> Arc<HostProfile> {
        Arc::new(HostProfile::pinned())
    }

    fn living_class() -> Arc<HostClass> {
        let entity = HostClass::root("ce");
        entity.push_member(HostMember::method("cY", MethodDesc::parse("()A").unwrap()));
        let living = HostClass::new("cq", Some(entity), Vec::new());
        living.push_member(HostMember::method("eZ", MethodDesc::parse("()f").unwrap()));
        living.push_member(HostMember::method("a", MethodDesc::parse("(f)i").unwrap()));
        living
    }

    #[test]
    fn test_resolves_declared_member() {
        let locator = MemberLocator::new(profile());
        let class = living_class();
        let handle = locator.resolve(&class, LogicalOp::Health).unwrap();
        assert_eq!(handle.member().unwrap().name, "eZ");
        assert_eq!(handle.owner.name().as_ref(), "cq");
    }

    #[test]
    fn test_resolves_inherited_member() {
        let locator = MemberLocator::new(profile());
        let class = living_class();
        let handle = locator.resolve(&class, LogicalOp::EntityUuid).unwrap();
        assert_eq!(handle.owner.name().as_ref(), "ce");
    }

    #[test]
    fn test_overloads_separated_by_shape() {
        let locator = MemberLocator::new(profile());
        // A player class declaring both "a"(A)v and inheriting "a"(f)i.
        let living = living_class();
        let player = HostClass::new("axg", Some(living), Vec::new());
        player.push_member(HostMember::method("a", MethodDesc::parse("(A)v").unwrap()));

        let send = locator.resolve(&player, LogicalOp::SendMessage).unwrap();
        let hurt = locator.resolve(&player, LogicalOp::Hurt).unwrap();
        assert_eq!(send.owner.name().as_ref(), "axg");
        assert_eq!(hurt.owner.name().as_ref(), "cq");
        assert_eq!(send.member().unwrap().name, hurt.member().unwrap().name);
    }

    #[test]
    fn test_miss_is_cached_too() {
        let locator = MemberLocator::new(profile());
        let class = living_class();
        assert!(locator.resolve(&class, LogicalOp::ServerVersion).is_none());
        assert!(locator.resolve(&class, LogicalOp::ServerVersion).is_none());
        assert_eq!(locator.cached_count(), 1);
    }

    #[test]
    fn test_cache_keyed_by_class_and_op() {
        let locator = MemberLocator::new(profile());
        let class = living_class();
        locator.resolve(&class, LogicalOp::Health);
        locator.resolve(&class, LogicalOp::Health);
        locator.resolve(&class, LogicalOp::Hurt);
        assert_eq!(locator.cached_count(), 2);
    }

    #[test]
    fn test_field_vs_method_kind_filtering() {
        let locator = MemberLocator::new(profile());
        // RemoteAddress pins a *field* named "l"; a method named "l" must not match.
        let conn = HostClass::root("nw");
        conn.push_member(HostMember::method("l", MethodDesc::parse("()A").unwrap()));
        assert!(locator.resolve(&conn, LogicalOp::RemoteAddress).is_none());

        let conn2 = HostClass::root("nw2");
        conn2.push_member(HostMember::field("l", MethodDesc::parse("()A").unwrap()));
        let handle = locator.resolve(&conn2, LogicalOp::RemoteAddress).unwrap();
        assert_eq!(handle.member().unwrap().kind, MemberKind::Field);
    }
}
