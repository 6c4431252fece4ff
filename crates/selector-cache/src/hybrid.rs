//! Two-level cache: in-memory L1 in front of a persistent L2.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use autoheal_core_types::CachedSelector;
use tracing::{debug, warn};

use crate::config::{CacheConfig, CacheType};
use crate::errors::CacheError;
use crate::memory::InMemorySelectorCache;
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::SelectorCache;

/// Reads go L1 then L2 and promote L2 hits into L1. Writes go to both
/// levels; an L2 write failure is logged and the L1 copy is kept.
pub struct HybridSelectorCache {
    l1: InMemorySelectorCache,
    l2: Arc<dyn SelectorCache>,
    metrics: CacheMetrics,
}

impl HybridSelectorCache {
    pub fn new(config: &CacheConfig, l2: Arc<dyn SelectorCache>) -> Self {
        debug!(l2 = %l2.kind(), "hybrid selector cache initialised");
        Self {
            l1: InMemorySelectorCache::new(config),
            l2,
            metrics: CacheMetrics::new(config.record_stats),
        }
    }

    pub fn l2_kind(&self) -> CacheType {
        self.l2.kind()
    }
}

#[async_trait]
impl SelectorCache for HybridSelectorCache {
    async fn get(&self, key: &str) -> Result<Option<CachedSelector>, CacheError> {
        if let Some(found) = self.l1.peek_fresh(key) {
            self.metrics.record_hit();
            debug!(%key, level = "l1", "selector cache hit");
            return Ok(Some(found));
        }

        match self.l2.get(key).await {
            Ok(Some(found)) => {
                self.l1.insert(key, found.clone());
                self.metrics.record_hit();
                debug!(%key, level = "l2", "selector cache hit, promoted to l1");
                Ok(Some(found))
            }
            Ok(None) => {
                self.metrics.record_miss();
                Ok(None)
            }
            Err(err) => {
                warn!(%key, %err, "l2 cache read failed");
                self.metrics.record_miss();
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, selector: CachedSelector) -> Result<(), CacheError> {
        let started = Instant::now();
        self.l1.insert(key, selector.clone());
        if let Err(err) = self.l2.put(key, selector).await {
            warn!(%key, %err, "l2 cache write failed; entry kept in l1 only");
        }
        self.metrics.record_load(started.elapsed());
        Ok(())
    }

    async fn update_success(&self, key: &str, success: bool) -> Result<(), CacheError> {
        self.l1.update_success(key, success).await?;
        if let Err(err) = self.l2.update_success(key, success).await {
            warn!(%key, %err, "l2 cache success update failed");
        }
        Ok(())
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        snapshot.evictions += self.l1.metrics().evictions + self.l2.metrics().evictions;
        snapshot
    }

    async fn evict_expired(&self) -> Result<u64, CacheError> {
        let l1 = self.l1.evict_expired().await?;
        let l2 = self.l2.evict_expired().await?;
        Ok(l1 + l2)
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        self.l1.clear_all().await?;
        self.l2.clear_all().await
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let in_l1 = self.l1.remove(key).await?;
        let in_l2 = self.l2.remove(key).await?;
        Ok(in_l1 || in_l2)
    }

    async fn size(&self) -> Result<u64, CacheError> {
        let l1 = self.l1.size().await?;
        let l2 = self.l2.size().await?;
        Ok(l1.max(l2))
    }

    fn kind(&self) -> CacheType {
        CacheType::Hybrid
    }
}
