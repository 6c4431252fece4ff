//! Cache configuration

use std::path::PathBuf;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Storage backend for healed selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    /// Bounded LRU in process memory
    #[default]
    #[serde(alias = "caffeine", alias = "memory")]
    InMemory,
    /// JSON files under `cache_directory`
    #[serde(alias = "file")]
    PersistentFile,
    Redis,
    /// In-memory L1 in front of a persistent L2
    Hybrid,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CacheType::InMemory => "in_memory",
            CacheType::PersistentFile => "persistent_file",
            CacheType::Redis => "redis",
            CacheType::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_type: CacheType,
    pub max_size: u64,
    #[serde(with = "autoheal_core_types::duration")]
    #[schemars(with = "String")]
    pub expire_after_write: Duration,
    #[serde(with = "autoheal_core_types::duration")]
    #[schemars(with = "String")]
    pub expire_after_access: Duration,
    pub record_stats: bool,
    pub cache_directory: PathBuf,
    pub redis_url: String,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            max_size: 10_000,
            expire_after_write: Duration::from_secs(24 * 60 * 60),
            expire_after_access: Duration::from_secs(2 * 60 * 60),
            record_stats: true,
            cache_directory: default_cache_directory(),
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "autoheal:selector:".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn in_memory(max_size: u64) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    pub fn with_type(mut self, cache_type: CacheType) -> Self {
        self.cache_type = cache_type;
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.cache_directory = directory.into();
        self
    }

    pub fn with_ttls(mut self, write: Duration, access: Duration) -> Self {
        self.expire_after_write = write;
        self.expire_after_access = access;
        self
    }
}

fn default_cache_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autoheal")
        .join("cache")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.cache_type, CacheType::InMemory);
        assert_eq!(config.max_size, 10_000);
        assert_eq!(config.expire_after_write, Duration::from_secs(86_400));
        assert_eq!(config.expire_after_access, Duration::from_secs(7_200));
        assert!(config.cache_directory.ends_with("autoheal/cache"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"cache_type":"caffeine","expire_after_write":"30m"}"#).unwrap();
        assert_eq!(config.cache_type, CacheType::InMemory);
        assert_eq!(config.expire_after_write, Duration::from_secs(1800));
        assert_eq!(config.key_prefix, "autoheal:selector:");
    }
}
