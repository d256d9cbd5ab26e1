//! Content-addressed result cache

use crate::error::Result;
use crate::result::DocumentResult;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Cache key for a document's bytes and extraction language
pub fn cache_key(content_hash: &str, language: &str) -> String {
    format!("extraction:{}:{}", content_hash, language)
}

/// Stored form of a cached extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub result: DocumentResult,
    pub cached_at: DateTime<Utc>,
    pub content_hash: String,
}

/// Key-value store with per-entry expiry.
///
/// An `Err` means the store could not be reached; callers treat it as a miss.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Store `value` under `key` for `ttl`. Returns whether it was stored.
    fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Drop `key`. Returns whether it was present.
    fn invalidate(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Counters reported by [`MemoryCache::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

struct StoredValue {
    value: String,
    expires_at: Instant,
}

struct CacheInner {
    lru: LruCache<String, StoredValue>,
    total_bytes: usize,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn remove(&mut self, key: &str) -> Option<StoredValue> {
        let stored = self.lru.pop(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(stored.value.len());
        Some(stored)
    }
}

/// In-process [`CacheStore`] bounded by entry count and byte budget
pub struct MemoryCache {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl MemoryCache {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
                hits: 0,
                misses: 0,
            }),
            max_bytes,
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let found = inner
            .lru
            .get(key)
            .map(|stored| (stored.expires_at > now).then(|| stored.value.clone()));

        match found {
            Some(Some(value)) => {
                inner.hits += 1;
                Some(value)
            }
            Some(None) => {
                inner.remove(key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    fn store(&self, key: &str, value: String, ttl: Duration) -> bool {
        let new_size = value.len();

        // Entries larger than the whole budget are never stored
        if new_size > self.max_bytes {
            return false;
        }

        let mut inner = self.inner.lock();
        inner.remove(key);

        while inner.total_bytes + new_size > self.max_bytes {
            match inner.lru.pop_lru() {
                Some((_, evicted)) => {
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.value.len());
                }
                None => break,
            }
        }

        // The key was removed above, so anything `push` returns was evicted
        let stored = StoredValue {
            value,
            expires_at: Instant::now() + ttl,
        };
        if let Some((_, evicted)) = inner.lru.push(key.to_string(), stored) {
            inner.total_bytes = inner.total_bytes.saturating_sub(evicted.value.len());
        }
        inner.total_bytes += new_size;
        true
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lru.clear();
        inner.total_bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.lru.len(),
            total_bytes: inner.total_bytes,
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lookup(key))
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<bool> {
        Ok(self.store(key, value, ttl))
    }

    async fn invalidate(&self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().remove(key).is_some())
    }
}
