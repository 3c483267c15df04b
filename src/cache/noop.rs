//! Pass-through cache store.

use async_trait::async_trait;

use super::{CacheStore, StoredEntry};

/// A store that never holds anything.
///
/// Lets the manager (and its statistics) stay in place while caching is
/// disabled; every read is a miss, every write a no-op.
pub struct NoopStore;

impl NoopStore {
    pub fn new() -> Self {
        NoopStore
    }
}

impl Default for NoopStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for NoopStore {
    async fn get(&self, _key: &str) -> Option<StoredEntry> {
        None
    }

    async fn set(&self, _key: &str, _entry: StoredEntry) {}

    async fn delete(&self, _key: &str) -> bool {
        false
    }

    async fn has(&self, _key: &str) -> bool {
        false
    }

    async fn len(&self) -> usize {
        0
    }

    async fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    async fn clear(&self) {}
}
