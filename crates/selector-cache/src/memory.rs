//! Bounded in-process cache with write and access expiry.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autoheal_core_types::CachedSelector;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{CacheConfig, CacheType};
use crate::errors::CacheError;
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::SelectorCache;

#[derive(Clone, Debug)]
struct MemoryEntry {
    selector: CachedSelector,
    written_at: Instant,
    accessed_at: Instant,
}

impl MemoryEntry {
    fn new(selector: CachedSelector) -> Self {
        let now = Instant::now();
        Self {
            selector,
            written_at: now,
            accessed_at: now,
        }
    }

    fn is_expired(&self, now: Instant, write_ttl: Duration, access_ttl: Duration) -> bool {
        now.duration_since(self.written_at) >= write_ttl
            || now.duration_since(self.accessed_at) >= access_ttl
    }
}

#[derive(Clone)]
pub struct InMemorySelectorCache {
    inner: Arc<Mutex<LruCache<String, MemoryEntry>>>,
    write_ttl: Duration,
    access_ttl: Duration,
    metrics: CacheMetrics,
}

impl InMemorySelectorCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = usize::try_from(config.max_size).unwrap_or(usize::MAX).max(1);
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        info!(
            max_size = config.max_size,
            expire_after_write = ?config.expire_after_write,
            "in-memory selector cache initialised"
        );
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            write_ttl: config.expire_after_write,
            access_ttl: config.expire_after_access,
            metrics: CacheMetrics::new(config.record_stats),
        }
    }

    /// Entry lookup used by layered caches; does not touch metrics.
    pub(crate) fn peek_fresh(&self, key: &str) -> Option<CachedSelector> {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let expired = match guard.get_mut(key) {
            Some(entry) if !entry.is_expired(now, self.write_ttl, self.access_ttl) => {
                entry.accessed_at = now;
                return Some(entry.selector.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            guard.pop(key);
            self.metrics.record_eviction();
        }
        None
    }

    pub(crate) fn insert(&self, key: &str, selector: CachedSelector) {
        let mut guard = self.inner.lock();
        if let Some((evicted_key, _)) = guard.push(key.to_string(), MemoryEntry::new(selector)) {
            if evicted_key != key {
                debug!(key = %evicted_key, "selector cache entry evicted (capacity)");
                self.metrics.record_eviction();
            }
        }
    }
}

#[async_trait]
impl SelectorCache for InMemorySelectorCache {
    async fn get(&self, key: &str) -> Result<Option<CachedSelector>, CacheError> {
        let found = self.peek_fresh(key);
        if found.is_some() {
            self.metrics.record_hit();
            debug!(%key, "selector cache hit");
        } else {
            self.metrics.record_miss();
            debug!(%key, "selector cache miss");
        }
        Ok(found)
    }

    async fn put(&self, key: &str, selector: CachedSelector) -> Result<(), CacheError> {
        let started = std::time::Instant::now();
        self.insert(key, selector);
        self.metrics.record_load(started.elapsed());
        debug!(%key, "cached selector");
        Ok(())
    }

    async fn update_success(&self, key: &str, success: bool) -> Result<(), CacheError> {
        if let Some(entry) = self.inner.lock().peek_mut(key) {
            entry.selector.record_usage(success);
            debug!(%key, success, "updated cached selector success rate");
        }
        Ok(())
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn evict_expired(&self) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.write_ttl, self.access_ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            guard.pop(key);
        }
        let count = expired.len() as u64;
        self.metrics.record_evictions(count);
        debug!(count, "evicted expired selector cache entries");
        Ok(count)
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        let mut guard = self.inner.lock();
        let removed = guard.len() as u64;
        guard.clear();
        self.metrics.record_evictions(removed);
        info!(removed, "selector cache cleared");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.inner.lock().pop(key).is_some();
        if removed {
            self.metrics.record_eviction();
            debug!(%key, "selector cache entry removed");
        }
        Ok(removed)
    }

    async fn size(&self) -> Result<u64, CacheError> {
        Ok(self.inner.lock().len() as u64)
    }

    fn kind(&self) -> CacheType {
        CacheType::InMemory
    }
}
