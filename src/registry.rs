//! Metadata registry
//!
//! Maps entity kinds to their static metadata so the projector can follow
//! relations into entity types it wasn't instantiated with.

use std::collections::HashMap;

use crate::orm::{DatabaseEntity, EntityMetadata};

#[derive(Debug, Default, Clone)]
pub struct MetadataRegistry {
    by_kind: HashMap<&'static str, &'static EntityMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with<E: DatabaseEntity>(mut self) -> Self {
        self.register::<E>();
        self
    }

    pub fn register<E: DatabaseEntity>(&mut self) {
        self.register_metadata(E::metadata());
    }

    /// Register a metadata record directly. A later record for the same kind wins.
    pub fn register_metadata(&mut self, meta: &'static EntityMetadata) {
        if self.by_kind.insert(meta.kind, meta).is_some() {
            tracing::debug!(kind = meta.kind, "Replaced entity metadata");
        }
    }

    pub fn get(&self, kind: &str) -> Option<&'static EntityMetadata> {
        self.by_kind.get(kind).copied()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.by_kind.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.by_kind.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}
