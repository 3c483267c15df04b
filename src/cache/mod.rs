//! TTL signal cache with pluggable backing store.
//!
//! Every signal provider consults this layer before touching its remote
//! source. The manager ([`SignalCache`]) adds per-factor key prefixing,
//! TTL defaulting, hit/miss accounting, and a typed `get_or_set`; the
//! backing store is either a bounded in-memory LRU ([`MemoryStore`]) or a
//! pass-through that never stores ([`NoopStore`]).
//!
//! Caching here is a performance optimization, never a correctness
//! dependency: every backend problem, including corrupted entries,
//! degrades to a miss.

mod memory;
mod noop;

pub use memory::MemoryStore;
pub use noop::NoopStore;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error_handling::SignalError;
use crate::signal::RiskFactorType;

/// A serialized entry as held by a backing store.
///
/// Values are stored as JSON so a store never needs to know provider
/// payload types; the manager deserializes on the way out and purges
/// entries that no longer deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// The cached value.
    pub value: serde_json::Value,
    /// Unix milliseconds when the entry was written.
    pub cached_at_ms: i64,
    /// Unix milliseconds past which the entry is dead.
    pub expires_at_ms: i64,
}

impl StoredEntry {
    /// Whether the entry is past its TTL at `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Entry age in whole seconds at `now_ms`.
    pub fn age_secs(&self, now_ms: i64) -> u64 {
        u64::try_from((now_ms - self.cached_at_ms) / 1000).unwrap_or(0)
    }
}

/// A cache backing store.
///
/// Implementations swallow their own failures: a store that cannot read
/// returns `None`, a store that cannot write drops the entry. Nothing in
/// this trait can surface an error to a provider.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry. Expired entries are deleted and reported absent.
    async fn get(&self, key: &str) -> Option<StoredEntry>;

    /// Insert or replace an entry.
    async fn set(&self, key: &str, entry: StoredEntry);

    /// Remove an entry. Returns whether one existed.
    async fn delete(&self, key: &str) -> bool;

    /// Whether a live entry exists.
    async fn has(&self, key: &str) -> bool;

    /// Number of entries currently held (including not-yet-collected
    /// expired ones).
    async fn len(&self) -> usize;

    /// All held keys.
    async fn keys(&self) -> Vec<String>;

    /// Drop everything.
    async fn clear(&self);
}

/// Hit/miss counters for one manager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    /// Reads answered from the store.
    pub hits: u64,
    /// Reads that fell through to the caller.
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 when nothing was read yet.
    pub hit_rate: f64,
}

/// A successful typed read, with the entry's age for confidence math.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    /// The deserialized value.
    pub value: T,
    /// Seconds since the entry was written.
    pub age_secs: u64,
}

/// The manager layer every provider talks to.
///
/// Keys are namespaced per factor (`reputation:<key>`, `ssl:<key>`, ...)
/// so one `clear` cascades across every provider's entries, and each
/// factor gets its own default TTL.
pub struct SignalCache {
    store: Arc<dyn CacheStore>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SignalCache {
    /// Wraps an explicit backing store.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        SignalCache {
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A manager over the default bounded in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::with_defaults()))
    }

    /// A manager that never caches, for disabling caching without changing
    /// call sites.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopStore::new()))
    }

    /// Default TTL for a factor's entries.
    pub fn default_ttl(factor: RiskFactorType) -> Duration {
        match factor {
            RiskFactorType::Reputation => crate::config::REPUTATION_CACHE_TTL,
            RiskFactorType::DomainAge => crate::config::DOMAIN_AGE_CACHE_TTL,
            RiskFactorType::SslCertificate => crate::config::SSL_CACHE_TTL,
            RiskFactorType::AiAnalysis | RiskFactorType::TechnicalIndicators => {
                crate::config::AI_CACHE_TTL
            }
        }
    }

    fn namespaced(factor: RiskFactorType, key: &str) -> String {
        format!("{}:{}", factor, key)
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Typed read. Corrupted entries are purged and counted as misses.
    pub async fn get<T: DeserializeOwned>(
        &self,
        factor: RiskFactorType,
        key: &str,
    ) -> Option<CacheHit<T>> {
        let full_key = Self::namespaced(factor, key);
        let now_ms = Self::now_ms();
        let entry = self.store.get(&full_key).await;

        let entry = match entry {
            Some(e) if !e.is_expired(now_ms) => e,
            Some(_) => {
                // Store returned a dead entry; treat as miss and collect it.
                self.store.delete(&full_key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_value::<T>(entry.value.clone()) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(CacheHit {
                    value,
                    age_secs: entry.age_secs(now_ms),
                })
            }
            Err(e) => {
                log::debug!("Purging corrupted cache entry {}: {}", full_key, e);
                self.store.delete(&full_key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Typed write. A value that fails to serialize is silently not cached.
    pub async fn set<T: Serialize>(
        &self,
        factor: RiskFactorType,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("Not caching unserializable value for {}: {}", key, e);
                return;
            }
        };
        let ttl = ttl.unwrap_or_else(|| Self::default_ttl(factor));
        let now_ms = Self::now_ms();
        let entry = StoredEntry {
            value,
            cached_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(
                i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            ),
        };
        self.store.set(&Self::namespaced(factor, key), entry).await;
    }

    /// Removes one entry. Returns whether it existed.
    pub async fn delete(&self, factor: RiskFactorType, key: &str) -> bool {
        self.store.delete(&Self::namespaced(factor, key)).await
    }

    /// Whether a live entry exists. Does not touch hit/miss counters.
    pub async fn has(&self, factor: RiskFactorType, key: &str) -> bool {
        self.store.has(&Self::namespaced(factor, key)).await
    }

    /// Entries currently held across all factors.
    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    /// All held keys, prefixed.
    pub async fn keys(&self) -> Vec<String> {
        self.store.keys().await
    }

    /// Drops every entry for every factor.
    pub async fn clear(&self) {
        self.store.clear().await;
    }

    /// Hit/miss counters since construction.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::SeqCst);
        let misses = self.misses.load(Ordering::SeqCst);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    /// Returns the cached value, or runs `factory` once, caches its
    /// success, and returns it.
    ///
    /// On a hit the second tuple element carries the entry age; on a fresh
    /// value it is `None`. Factory failures propagate uncached. Two
    /// concurrent misses for one key may both run the factory; providers
    /// are idempotent, so the duplicate work is accepted rather than
    /// serialized behind a per-key lock.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        factor: RiskFactorType,
        key: &str,
        ttl: Option<Duration>,
        factory: F,
    ) -> Result<(T, Option<u64>), SignalError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, SignalError>>,
    {
        if let Some(hit) = self.get::<T>(factor, key).await {
            return Ok((hit.value, Some(hit.age_secs)));
        }
        let value = factory().await?;
        self.set(factor, key, &value, ttl).await;
        Ok((value, None))
    }
}
