//! Key set cache capability.
//!
//! The cache is supplied by the application and shared across requests for
//! the life of the process. Reads and writes are best-effort: a miss simply
//! triggers a fetch, and concurrent misses may fetch more than once.

use jsonwebtoken::jwk::JwkSet;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Trait for key set caches, keyed by JWKS URI.
///
/// Implementations must be safe to call from concurrent requests.
pub trait KeySetCache: Send + Sync {
    /// Get a live (unexpired) key set.
    fn get(&self, key: &str) -> Option<JwkSet>;

    /// Store a key set for `ttl`.
    fn set(&self, key: &str, value: JwkSet, ttl: Duration);

    /// Drop a cached key set.
    fn delete(&self, key: &str);
}

/// Cache entry with metadata
#[derive(Debug, Clone)]
struct CacheEntry {
    value: JwkSet,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_valid(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// In-process [`KeySetCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, live or expired.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeySetCache for MemoryCache {
    fn get(&self, key: &str) -> Option<JwkSet> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.is_valid())
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: JwkSet, ttl: Duration) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.retain(|_, entry| entry.is_valid());
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    fn delete(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
    }
}
