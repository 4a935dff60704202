//! Classification of concrete host classes into API variants.
//!
//! The host never says what an object *is* - the only evidence is its
//! ancestor chain. Classification walks that chain (superclasses depth-first,
//! then interfaces) against a small ordered table of target ancestor names,
//! most specific first: a tameable-animal ancestor is checked before the
//! generic living-entity ancestor, so a tamed wolf classifies as `Tameable`,
//! not merely `Living`.
//!
//! The walk runs at most once per distinct concrete class; the result is
//! memoized keyed by exact class name, so two classes sharing every ancestor
//! still occupy two cache entries.

use std::sync::Arc;

use dashmap::DashMap;
use strum::Display;

use crate::host::HostClass;

/// The public API variant a concrete host class maps to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassCategory {
    /// A connected player
    Player,
    /// A tameable animal
    Tameable,
    /// A projectile in flight
    Projectile,
    /// Any other living entity
    Living,
    /// An entity with no more specific variant
    GenericEntity,
}

/// Memoized concrete-class to category mapping.
///
/// `O(ancestor-depth)` on the first sighting of a class, `O(1)` after.
pub struct ClassificationCache {
    /// Target ancestor names, most specific category first
    targets: Vec<(Arc<str>, ClassCategory)>,
    cache: DashMap<Arc<str>, ClassCategory>,
}

impl ClassificationCache {
    /// Creates a cache over an ordered target table.
    pub fn new(targets: Vec<(Arc<str>, ClassCategory)>) -> Self {
        ClassificationCache {
            targets,
            cache: DashMap::new(),
        }
    }

    /// Classifies a concrete class, populating the cache on first sight.
    pub fn classify(&self, class: &Arc<HostClass>) -> ClassCategory {
        if let Some(hit) = self.cache.get(class.name()) {
            return *hit;
        }

        let category = self
            .targets
            .iter()
            .find(|(target, _)| has_ancestor(class, target))
            .map_or(ClassCategory::GenericEntity, |(_, category)| *category);

        self.cache.insert(class.name().clone(), category);
        category
    }

    /// Number of distinct classes classified so far.
    pub fn entry_count(&self) -> usize {
        self.cache.len()
    }
}

/// Walks superclasses depth-first, then interfaces, looking for `target`.
fn has_ancestor(class: &Arc<HostClass>, target: &str) -> bool {
    let mut current = Some(class);
    while let Some(c) = current {
        if c.name().as_ref() == target {
            return true;
        }
        for iface in c.interfaces() {
            if interface_matches(iface, target) {
                return true;
            }
        }
        current = c.superclass();
    }
    false
}

fn interface_matches(iface: &Arc<HostClass>, target: &str) -> bool {
    if iface.name().as_ref() == target {
        return true;
    }
    iface
        .interfaces()
        .iter()
        .any(|parent| interface_matches(parent, target))
}
