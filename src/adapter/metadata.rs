//! Per-entity key-value tags.
//!
//! Wrappers are created fresh on every access, so tags cannot live on them -
//! they key off the host-stable entity identity instead. An entity's map is
//! created on first `set` and removed again the moment it empties, so the
//! store never grows beyond the set of entities that currently carry tags.

use dashmap::DashMap;
use uuid::Uuid;

use crate::host::HostValue;

/// Process-wide tag store keyed by stable entity identity.
#[derive(Default)]
pub struct MetadataStore {
    store: DashMap<Uuid, DashMap<String, HostValue>>,
}

impl MetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MetadataStore::default()
    }

    /// Whether the entity carries a tag under `key`.
    pub fn has(&self, entity: Uuid, key: &str) -> bool {
        self.store
            .get(&entity)
            .is_some_and(|map| map.contains_key(key))
    }

    /// Sets a tag, creating the entity's map on first use.
    pub fn set(&self, entity: Uuid, key: &str, value: HostValue) {
        self.store
            .entry(entity)
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Reads a tag.
    pub fn get(&self, entity: Uuid, key: &str) -> Option<HostValue> {
        self.store
            .get(&entity)
            .and_then(|map| map.get(key).map(|value| value.value().clone()))
    }

    /// Removes a tag; drops the entity's map when it empties.
    pub fn remove(&self, entity: Uuid, key: &str) {
        if let Some(map) = self.store.get(&entity) {
            map.remove(key);
        }
        self.store.remove_if(&entity, |_, map| map.is_empty());
    }

    /// Removes every tag an entity carries.
    pub fn clear(&self, entity: Uuid) {
        self.store.remove(&entity);
    }

    /// Number of entities currently carrying tags.
    pub fn entity_count(&self) -> usize {
        self.store.len()
    }
}
