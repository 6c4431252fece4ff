//! Healing cache: last-known-good selectors per logical element.
//!
//! Every backend implements [`SelectorCache`] and keeps its own
//! [`CacheMetrics`]. [`create_cache`] builds the backend named by
//! [`CacheConfig::cache_type`], falling back to the in-memory cache when a
//! persistent backend cannot be initialised.

pub mod config;
pub mod errors;
pub mod factory;
pub mod file;
pub mod hybrid;
pub mod key;
pub mod memory;
pub mod metrics;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use autoheal_core_types::CachedSelector;

pub use config::{CacheConfig, CacheType};
pub use errors::CacheError;
pub use factory::{create_cache, try_create_cache};
pub use file::FileSelectorCache;
pub use hybrid::HybridSelectorCache;
pub use key::contextual_key;
pub use memory::InMemorySelectorCache;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
#[cfg(feature = "redis")]
pub use redis::RedisSelectorCache;

#[async_trait]
pub trait SelectorCache: Send + Sync {
    /// Look up a key, recording a hit or miss.
    async fn get(&self, key: &str) -> Result<Option<CachedSelector>, CacheError>;

    async fn put(&self, key: &str, selector: CachedSelector) -> Result<(), CacheError>;

    /// Record the outcome of reusing a cached selector. Unknown keys are
    /// ignored.
    async fn update_success(&self, key: &str, success: bool) -> Result<(), CacheError>;

    fn metrics(&self) -> CacheMetricsSnapshot;

    /// Drop expired entries, returning how many were removed.
    async fn evict_expired(&self) -> Result<u64, CacheError>;

    async fn clear_all(&self) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    async fn size(&self) -> Result<u64, CacheError>;

    fn kind(&self) -> CacheType;
}
