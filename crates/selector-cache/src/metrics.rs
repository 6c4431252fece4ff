use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hit/miss/eviction counters shared by every cache backend.
#[derive(Clone)]
pub struct CacheMetrics {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    enabled: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    loads: AtomicU64,
    total_load_time_us: AtomicU64,
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CacheMetrics {
    pub fn new(enabled: bool) -> Self {
        let inner = Inner::default();
        inner.enabled.store(enabled, Ordering::Relaxed);
        Self {
            inner: Arc::new(inner),
        }
    }

    fn enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    pub fn record_hit(&self) {
        if self.enabled() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_miss(&self) {
        if self.enabled() {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_evictions(&self, count: u64) {
        if self.enabled() && count > 0 {
            self.inner.evictions.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_eviction(&self) {
        self.record_evictions(1);
    }

    pub fn record_load(&self, elapsed: Duration) {
        if self.enabled() {
            self.inner.loads.fetch_add(1, Ordering::Relaxed);
            self.inner
                .total_load_time_us
                .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            loads: self.inner.loads.load(Ordering::Relaxed),
            total_load_time_us: self.inner.total_load_time_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub loads: u64,
    pub total_load_time_us: u64,
}

impl CacheMetricsSnapshot {
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }

    pub fn miss_rate(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            total => self.misses as f64 / total as f64,
        }
    }

    pub fn average_load_time_ms(&self) -> f64 {
        if self.loads == 0 {
            return 0.0;
        }
        self.total_load_time_us as f64 / 1000.0 / self.loads as f64
    }

    /// Sum of two snapshots, used by layered caches.
    pub fn merge(&self, other: &CacheMetricsSnapshot) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            evictions: self.evictions + other.evictions,
            loads: self.loads + other.loads,
            total_load_time_us: self.total_load_time_us + other.total_load_time_us,
        }
    }
}
