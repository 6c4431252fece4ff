//! Redis-backed cache, compiled with the `redis` feature.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use autoheal_core_types::CachedSelector;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::config::{CacheConfig, CacheType};
use crate::errors::CacheError;
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::SelectorCache;

#[derive(Clone)]
pub struct RedisSelectorCache {
    manager: ConnectionManager,
    prefix: Arc<String>,
    ttl_secs: u64,
    metrics: CacheMetrics,
}

impl RedisSelectorCache {
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|err| CacheError::Unavailable(format!("redis client: {err}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| CacheError::Unavailable(format!("redis connect: {err}")))?;
        info!(url = %config.redis_url, prefix = %config.key_prefix, "redis selector cache connected");
        Ok(Self {
            manager,
            prefix: Arc::new(config.key_prefix.clone()),
            ttl_secs: config.expire_after_write.as_secs().max(1),
            metrics: CacheMetrics::new(config.record_stats),
        })
    }

    fn namespaced_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn read(&self, key: &str) -> Result<Option<CachedSelector>, CacheError> {
        let mut conn = self.manager.clone();
        let data: Option<Vec<u8>> = conn
            .get(self.namespaced_key(key))
            .await
            .map_err(|err| CacheError::Unavailable(format!("redis get: {err}")))?;
        match data {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn scan_keys(&self) -> Result<Vec<String>, CacheError> {
        let mut conn = self.manager.clone();
        let pattern = format!("{}*", self.prefix);
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<String> = conn
            .scan_match(pattern)
            .await
            .map_err(|err| CacheError::Unavailable(format!("redis scan: {err}")))?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

#[async_trait]
impl SelectorCache for RedisSelectorCache {
    async fn get(&self, key: &str) -> Result<Option<CachedSelector>, CacheError> {
        match self.read(key).await {
            Ok(Some(selector)) => {
                self.metrics.record_hit();
                debug!(%key, "redis cache hit");
                Ok(Some(selector))
            }
            Ok(None) => {
                self.metrics.record_miss();
                debug!(%key, "redis cache miss");
                Ok(None)
            }
            Err(err) => {
                self.metrics.record_miss();
                Err(err)
            }
        }
    }

    async fn put(&self, key: &str, selector: CachedSelector) -> Result<(), CacheError> {
        let started = Instant::now();
        let payload = serde_json::to_vec(&selector)?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(self.namespaced_key(key), payload, self.ttl_secs)
            .await
            .map_err(|err| CacheError::Unavailable(format!("redis set: {err}")))?;
        self.metrics.record_load(started.elapsed());
        debug!(%key, ttl_secs = self.ttl_secs, "redis cache store");
        Ok(())
    }

    async fn update_success(&self, key: &str, success: bool) -> Result<(), CacheError> {
        let Some(mut selector) = self.read(key).await? else {
            return Ok(());
        };
        selector.record_usage(success);
        let namespaced = self.namespaced_key(key);
        let mut conn = self.manager.clone();
        let ttl: i64 = conn
            .ttl(&namespaced)
            .await
            .map_err(|err| CacheError::Unavailable(format!("redis ttl: {err}")))?;
        if ttl > 0 {
            let payload = serde_json::to_vec(&selector)?;
            conn.set_ex::<_, _, ()>(namespaced, payload, ttl as u64)
                .await
                .map_err(|err| CacheError::Unavailable(format!("redis set: {err}")))?;
        }
        Ok(())
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn evict_expired(&self) -> Result<u64, CacheError> {
        // Redis expires keys on its own.
        Ok(0)
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        let keys = self.scan_keys().await?;
        if !keys.is_empty() {
            let mut conn = self.manager.clone();
            conn.del::<_, ()>(&keys)
                .await
                .map_err(|err| CacheError::Unavailable(format!("redis del: {err}")))?;
        }
        self.metrics.record_evictions(keys.len() as u64);
        info!(removed = keys.len(), "redis selector cache cleared");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        let deleted: u64 = conn
            .del(self.namespaced_key(key))
            .await
            .map_err(|err| CacheError::Unavailable(format!("redis del: {err}")))?;
        if deleted > 0 {
            self.metrics.record_eviction();
        }
        Ok(deleted > 0)
    }

    async fn size(&self) -> Result<u64, CacheError> {
        Ok(self.scan_keys().await?.len() as u64)
    }

    fn kind(&self) -> CacheType {
        CacheType::Redis
    }
}
