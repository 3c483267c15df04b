//! Bounded in-memory cache store.
//!
//! TTL-expiring entries with approximate memory accounting and
//! least-recently-used eviction once usage crosses a threshold fraction of
//! the configured maximum.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CacheStore, StoredEntry};

struct MemoryEntry {
    entry: StoredEntry,
    size_bytes: usize,
    last_access: u64,
}

struct Inner {
    map: HashMap<String, MemoryEntry>,
    usage_bytes: usize,
    // Logical clock for LRU ordering; bumped on every touching read/write.
    access_clock: u64,
}

/// In-memory [`CacheStore`] with TTL expiry and LRU eviction.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    max_bytes: usize,
    eviction_threshold: f64,
}

// Per-entry bookkeeping overhead added to the serialized footprint.
const ENTRY_OVERHEAD_BYTES: usize = 64;

impl MemoryStore {
    /// A store bounded at `max_bytes`, evicting once usage exceeds
    /// `eviction_threshold * max_bytes`.
    pub fn new(max_bytes: usize, eviction_threshold: f64) -> Self {
        MemoryStore {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                usage_bytes: 0,
                access_clock: 0,
            }),
            max_bytes,
            eviction_threshold: eviction_threshold.clamp(0.0, 1.0),
        }
    }

    /// A store with the default size bound.
    pub fn with_defaults() -> Self {
        Self::new(
            crate::config::CACHE_MAX_BYTES,
            crate::config::CACHE_EVICTION_THRESHOLD,
        )
    }

    /// Approximate bytes currently held.
    pub async fn usage_bytes(&self) -> usize {
        self.inner.lock().await.usage_bytes
    }

    fn entry_size(key: &str, entry: &StoredEntry) -> usize {
        let value_len = serde_json::to_string(&entry.value)
            .map(|s| s.len())
            .unwrap_or(0);
        key.len() + value_len + ENTRY_OVERHEAD_BYTES
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn remove_entry(inner: &mut Inner, key: &str) -> bool {
        if let Some(old) = inner.map.remove(key) {
            inner.usage_bytes = inner.usage_bytes.saturating_sub(old.size_bytes);
            true
        } else {
            false
        }
    }

    fn evict_if_needed(&self, inner: &mut Inner) {
        let limit = (self.max_bytes as f64 * self.eviction_threshold) as usize;
        while inner.usage_bytes > limit && !inner.map.is_empty() {
            let lru_key = inner
                .map
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            match lru_key {
                Some(key) => {
                    log::debug!("Evicting LRU cache entry {}", key);
                    Self::remove_entry(inner, &key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<StoredEntry> {
        let mut inner = self.inner.lock().await;
        let now_ms = Self::now_ms();

        let expired = match inner.map.get(key) {
            Some(e) => e.entry.is_expired(now_ms),
            None => return None,
        };
        if expired {
            Self::remove_entry(&mut inner, key);
            return None;
        }

        inner.access_clock += 1;
        let clock = inner.access_clock;
        let entry = inner.map.get_mut(key)?;
        entry.last_access = clock;
        Some(entry.entry.clone())
    }

    async fn set(&self, key: &str, entry: StoredEntry) {
        let size_bytes = Self::entry_size(key, &entry);
        let mut inner = self.inner.lock().await;
        Self::remove_entry(&mut inner, key);
        inner.access_clock += 1;
        let clock = inner.access_clock;
        inner.map.insert(
            key.to_string(),
            MemoryEntry {
                entry,
                size_bytes,
                last_access: clock,
            },
        );
        inner.usage_bytes += size_bytes;
        self.evict_if_needed(&mut inner);
    }

    async fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        Self::remove_entry(&mut inner, key)
    }

    async fn has(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let now_ms = Self::now_ms();
        let expired = match inner.map.get(key) {
            Some(e) => e.entry.is_expired(now_ms),
            None => return false,
        };
        if expired {
            Self::remove_entry(&mut inner, key);
            return false;
        }
        true
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.map.len()
    }

    async fn keys(&self) -> Vec<String> {
        self.inner.lock().await.map.keys().cloned().collect()
    }

    async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.map.clear();
        inner.usage_bytes = 0;
    }
}
