//! Persistent cache: one JSON file per entry, sharded by key hash.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use autoheal_core_types::CachedSelector;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, CacheType};
use crate::errors::CacheError;
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::SelectorCache;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    key: String,
    stored_at_ms: i64,
    selector: CachedSelector,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    stored_at_ms: i64,
    accessed_at_ms: i64,
}

#[derive(Clone)]
pub struct FileSelectorCache {
    root: PathBuf,
    index: Arc<DashMap<String, IndexEntry>>,
    /// Serialises writers of one key.
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    max_size: u64,
    write_ttl_ms: i64,
    access_ttl_ms: i64,
    metrics: CacheMetrics,
}

impl FileSelectorCache {
    /// Open (or create) the cache directory and index the entries already on
    /// disk. Expired and unreadable files are deleted.
    pub async fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        let root = config.cache_directory.clone();
        fs::create_dir_all(&root).await?;
        let cache = Self {
            root,
            index: Arc::new(DashMap::new()),
            locks: Arc::new(DashMap::new()),
            max_size: config.max_size.max(1),
            write_ttl_ms: duration_ms(config.expire_after_write),
            access_ttl_ms: duration_ms(config.expire_after_access),
            metrics: CacheMetrics::new(config.record_stats),
        };
        let loaded = cache.load_index().await?;
        info!(
            directory = %cache.root.display(),
            entries = loaded,
            "file selector cache initialised"
        );
        Ok(cache)
    }

    pub fn directory(&self) -> &Path {
        &self.root
    }

    async fn load_index(&self) -> Result<usize, CacheError> {
        let now = Utc::now().timestamp_millis();
        let mut shards = fs::read_dir(&self.root).await?;
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let path = file.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                match read_entry(&path).await {
                    Ok(entry) => {
                        let accessed = entry
                            .selector
                            .last_used
                            .timestamp_millis()
                            .max(entry.stored_at_ms);
                        let index_entry = IndexEntry {
                            stored_at_ms: entry.stored_at_ms,
                            accessed_at_ms: accessed,
                        };
                        if self.is_expired(&index_entry, now) {
                            let _ = fs::remove_file(&path).await;
                            continue;
                        }
                        self.index.insert(entry.key, index_entry);
                    }
                    Err(err) => {
                        warn!(%err, path = %path.display(), "dropping unreadable cache entry");
                        let _ = fs::remove_file(&path).await;
                    }
                }
            }
        }
        Ok(self.index.len())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = hex::encode(hasher.finalize());
        self.root.join(&hash[..2]).join(format!("{hash}.json"))
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn is_expired(&self, entry: &IndexEntry, now_ms: i64) -> bool {
        now_ms - entry.stored_at_ms >= self.write_ttl_ms
            || now_ms - entry.accessed_at_ms >= self.access_ttl_ms
    }

    async fn write_entry(&self, entry: &FileEntry) -> Result<(), CacheError> {
        let path = self.entry_path(&entry.key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(entry)?;
        write_atomic(path, payload).await?;
        Ok(())
    }

    async fn delete_entry(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self.index.remove(key).is_some();
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(existed),
            Err(err) => Err(err.into()),
        }
    }

    /// Drop the least recently accessed entries until the index fits.
    async fn enforce_capacity(&self) -> Result<(), CacheError> {
        while self.index.len() as u64 > self.max_size {
            let oldest = self
                .index
                .iter()
                .min_by_key(|item| item.value().accessed_at_ms)
                .map(|item| item.key().clone());
            let Some(key) = oldest else {
                break;
            };
            self.delete_entry(&key).await?;
            self.metrics.record_eviction();
            debug!(%key, "file cache entry evicted (capacity)");
        }
        Ok(())
    }
}

#[async_trait]
impl SelectorCache for FileSelectorCache {
    async fn get(&self, key: &str) -> Result<Option<CachedSelector>, CacheError> {
        let now = Utc::now().timestamp_millis();
        let Some(entry) = self.index.get(key).map(|item| *item.value()) else {
            self.metrics.record_miss();
            debug!(%key, "file cache miss");
            return Ok(None);
        };

        if self.is_expired(&entry, now) {
            self.delete_entry(key).await?;
            self.metrics.record_eviction();
            self.metrics.record_miss();
            debug!(%key, "file cache entry expired");
            return Ok(None);
        }

        match read_entry(&self.entry_path(key)).await {
            Ok(file_entry) => {
                if let Some(mut item) = self.index.get_mut(key) {
                    item.accessed_at_ms = now;
                }
                self.metrics.record_hit();
                debug!(%key, "file cache hit");
                Ok(Some(file_entry.selector))
            }
            Err(CacheError::Io(err)) => {
                warn!(%key, %err, "cache file vanished; dropping index entry");
                self.index.remove(key);
                self.metrics.record_miss();
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
        let now = Utc::now().timestamp_millis();
        let entry = FileEntry {
            key: key.to_string(),
            stored_at_ms: now,
            selector,
        };
        let lock = self.key_lock(key);
        let guard = lock.lock().await;
        self.write_entry(&entry).await?;
        self.index.insert(
            key.to_string(),
            IndexEntry {
                stored_at_ms: now,
                accessed_at_ms: now,
            },
        );
        drop(guard);
        self.enforce_capacity().await?;
        self.metrics.record_load(started.elapsed());
        debug!(%key, "file cache store");
        Ok(())
    }

    async fn update_success(&self, key: &str, success: bool) -> Result<(), CacheError> {
        if !self.index.contains_key(key) {
            return Ok(());
        }
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        let path = self.entry_path(key);
        let mut entry = read_entry(&path).await?;
        entry.selector.record_usage(success);
        self.write_entry(&entry).await?;
        debug!(%key, success, "updated cached selector success rate");
        Ok(())
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn evict_expired(&self) -> Result<u64, CacheError> {
        let now = Utc::now().timestamp_millis();
        let expired: Vec<String> = self
            .index
            .iter()
            .filter(|item| self.is_expired(item.value(), now))
            .map(|item| item.key().clone())
            .collect();
        for key in &expired {
            self.delete_entry(key).await?;
        }
        let count = expired.len() as u64;
        self.metrics.record_evictions(count);
        Ok(count)
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        let keys: Vec<String> = self.index.iter().map(|item| item.key().clone()).collect();
        for key in &keys {
            self.delete_entry(key).await?;
        }
        self.metrics.record_evictions(keys.len() as u64);
        info!(removed = keys.len(), "file selector cache cleared");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.delete_entry(key).await?;
        if removed {
            self.metrics.record_eviction();
        }
        Ok(removed)
    }

    async fn size(&self) -> Result<u64, CacheError> {
        Ok(self.index.len() as u64)
    }

    fn kind(&self) -> CacheType {
        CacheType::PersistentFile
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

async fn read_entry(path: &Path) -> Result<FileEntry, CacheError> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write through a uniquely named temp file in the target directory, then
/// rename it over `path`.
async fn write_atomic(path: PathBuf, data: Vec<u8>) -> std::io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_data()?;
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}
