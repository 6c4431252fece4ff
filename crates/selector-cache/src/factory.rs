use std::sync::Arc;

use tracing::warn;

use crate::config::{CacheConfig, CacheType};
use crate::errors::CacheError;
use crate::file::FileSelectorCache;
use crate::hybrid::HybridSelectorCache;
use crate::memory::InMemorySelectorCache;
use crate::SelectorCache;

/// Build the configured cache backend. Persistent backends that fail to
/// initialise degrade to the in-memory cache with a warning.
pub async fn create_cache(config: &CacheConfig) -> Arc<dyn SelectorCache> {
    match try_create_cache(config).await {
        Ok(cache) => cache,
        Err(err) => {
            warn!(
                cache_type = %config.cache_type,
                %err,
                "selector cache backend unavailable, falling back to in-memory"
            );
            Arc::new(InMemorySelectorCache::new(config))
        }
    }
}

/// Strict variant of [`create_cache`] that reports initialisation errors.
pub async fn try_create_cache(config: &CacheConfig) -> Result<Arc<dyn SelectorCache>, CacheError> {
    if config.max_size == 0 {
        return Err(CacheError::Config("cache.max_size must be greater than 0".into()));
    }
    match config.cache_type {
        CacheType::InMemory => Ok(Arc::new(InMemorySelectorCache::new(config))),
        CacheType::PersistentFile => Ok(Arc::new(FileSelectorCache::open(config).await?)),
        CacheType::Redis => redis_backend(config).await,
        CacheType::Hybrid => {
            let l2 = match redis_backend(config).await {
                Ok(redis) => redis,
                Err(err) => {
                    warn!(%err, "redis unavailable for hybrid cache, using file cache as l2");
                    Arc::new(FileSelectorCache::open(config).await?)
                }
            };
            Ok(Arc::new(HybridSelectorCache::new(config, l2)))
        }
    }
}

#[cfg(feature = "redis")]
async fn redis_backend(config: &CacheConfig) -> Result<Arc<dyn SelectorCache>, CacheError> {
    Ok(Arc::new(crate::redis::RedisSelectorCache::connect(config).await?))
}

#[cfg(not(feature = "redis"))]
async fn redis_backend(_config: &CacheConfig) -> Result<Arc<dyn SelectorCache>, CacheError> {
    Err(CacheError::Unavailable(
        "built without the `redis` feature".to_string(),
    ))
}
