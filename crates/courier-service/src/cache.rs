//! An in-memory store for the last successful payload of every request.

use moka::sync::Cache;

use crate::types::{Payload, ResourceKey};

/// Keeps the last successful [`Payload`] per [`ResourceKey`].
///
/// The store is unbounded and entries never expire, they live as long as the coordinator
/// that owns the store. Cloning the store is cheap and yields a handle to the same entries.
#[derive(Clone, Debug)]
pub struct CacheStore {
    entries: Cache<ResourceKey, Payload>,
}

impl CacheStore {
    pub fn new() -> Self {
        let entries = Cache::builder().name("responses").build();
        Self { entries }
    }

    /// Stores `payload` under `key`, overwriting any previous entry, and returns it unchanged.
    pub fn save(&self, key: ResourceKey, payload: Payload) -> Payload {
        tracing::trace!(%key, "Caching response payload");
        self.entries.insert(key, payload.clone());
        payload
    }

    /// Returns the payload stored under `key`, if any.
    pub fn lookup(&self, key: &ResourceKey) -> Option<Payload> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.contains_key(key)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}
