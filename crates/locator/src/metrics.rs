//! Locator counters, the aggregated metrics snapshot and Prometheus
//! collectors.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use autoheal_ai_service::{AiServiceMetricsSnapshot, CostMetricsSnapshot, RequestKind};
use autoheal_core_types::AiProvider;
use autoheal_selector_cache::CacheMetricsSnapshot;
use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, HistogramOpts, HistogramVec, IntCounterVec, Registry};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Default)]
struct Counters {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    total_execution_ms: AtomicU64,
}

/// Request counters kept by the facade and by each strategy.
#[derive(Debug, Clone, Default)]
pub struct LocatorMetrics {
    inner: Arc<Counters>,
}

impl LocatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, success: bool, elapsed: Duration, from_cache: bool) {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.successful_requests.fetch_add(1, Ordering::Relaxed);
        }
        if from_cache {
            self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .total_execution_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LocatorMetricsSnapshot {
        LocatorMetricsSnapshot {
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            successful_requests: self.inner.successful_requests.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.inner.cache_misses.load(Ordering::Relaxed),
            total_execution_ms: self.inner.total_execution_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorMetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_execution_ms: u64,
}

impl LocatorMetricsSnapshot {
    pub fn success_rate(&self) -> f64 {
        ratio(self.successful_requests, self.total_requests)
    }

    pub fn cache_hit_rate(&self) -> f64 {
        ratio(self.cache_hits, self.total_requests)
    }

    pub fn average_execution_time_ms(&self) -> f64 {
        ratio(self.total_execution_ms, self.total_requests)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Everything the monitor and the CLI report on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoHealMetrics {
    pub locator: LocatorMetricsSnapshot,
    pub cache: CacheMetricsSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiServiceMetricsSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostMetricsSnapshot>,
}

impl AutoHealMetrics {
    /// Flat `section.name` view for monitoring systems.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        let mut put = |key: &str, value: f64| {
            map.insert(key.to_string(), value);
        };

        put("locator.total_requests", self.locator.total_requests as f64);
        put("locator.success_rate", self.locator.success_rate());
        put("locator.cache_hit_rate", self.locator.cache_hit_rate());
        put("locator.avg_execution_time", self.locator.average_execution_time_ms());

        put("cache.hits", self.cache.hits as f64);
        put("cache.misses", self.cache.misses as f64);
        put("cache.hit_rate", self.cache.hit_rate());
        put("cache.evictions", self.cache.evictions as f64);
        put("cache.avg_load_time", self.cache.average_load_time_ms());

        if let Some(ai) = &self.ai {
            put("ai.total_requests", ai.total_requests as f64);
            put("ai.success_rate", ai.success_rate());
            put("ai.avg_response_time", ai.average_response_time_ms());
            put("ai.circuit_breaker_opens", ai.circuit_breaker_opens as f64);
        }
        map
    }
}

lazy_static! {
    static ref LOCATE_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!("autoheal_locate_total", "Element lookups grouped by strategy and outcome"),
        &["strategy", "outcome"]
    )
    .unwrap();
    static ref CACHE_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!("autoheal_cache_events_total", "Healing cache events"),
        &["event"]
    )
    .unwrap();
    static ref AI_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!("autoheal_ai_requests_total", "AI analysis requests made by locator strategies"),
        &["provider", "kind", "outcome"]
    )
    .unwrap();
    static ref LOCATE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "autoheal_locate_duration_seconds",
            "Element lookup latency by resolving strategy"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["strategy"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register locator metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, LOCATE_TOTAL.clone());
    register(registry, CACHE_EVENTS_TOTAL.clone());
    register(registry, AI_REQUESTS_TOTAL.clone());
    register(registry, LOCATE_DURATION_SECONDS.clone());
}

fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// `strategy` is the resolving strategy name, or `failed`.
pub fn record_locate(strategy: &str, success: bool, elapsed: Duration) {
    LOCATE_TOTAL
        .with_label_values(&[strategy, outcome_label(success)])
        .inc();
    LOCATE_DURATION_SECONDS
        .with_label_values(&[strategy])
        .observe(elapsed.as_secs_f64());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Hit,
    Miss,
    Stale,
    Store,
    StoreFailed,
}

impl CacheEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEvent::Hit => "hit",
            CacheEvent::Miss => "miss",
            CacheEvent::Stale => "stale",
            CacheEvent::Store => "store",
            CacheEvent::StoreFailed => "store_failed",
        }
    }
}

pub fn record_cache_event(event: CacheEvent) {
    CACHE_EVENTS_TOTAL.with_label_values(&[event.as_str()]).inc();
}

pub fn record_ai_request(provider: AiProvider, kind: RequestKind, success: bool) {
    AI_REQUESTS_TOTAL
        .with_label_values(&[provider.name(), kind.as_str(), outcome_label(success)])
        .inc();
}

#[cfg(test)]
mod tests {
    use prometheus::Encoder;

    use super::*;

    #[test]
    fn test_locator_metrics_rates() {
        let metrics = LocatorMetrics::new();
        assert_eq!(metrics.snapshot().success_rate(), 0.0);
        assert_eq!(metrics.snapshot().average_execution_time_ms(), 0.0);

        metrics.record_request(true, Duration::from_millis(100), true);
        metrics.record_request(true, Duration::from_millis(200), false);
        metrics.record_request(false, Duration::from_millis(300), false);
        metrics.record_request(true, Duration::from_millis(400), false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 4);
        assert_eq!(snapshot.success_rate(), 0.75);
        assert_eq!(snapshot.cache_hit_rate(), 0.25);
        assert_eq!(snapshot.cache_misses, 3);
        assert_eq!(snapshot.average_execution_time_ms(), 250.0);
    }

    #[test]
    fn test_to_map_omits_ai_without_ai_metrics() {
        let metrics = AutoHealMetrics::default();
        let map = metrics.to_map();
        assert!(map.contains_key("locator.total_requests"));
        assert!(map.contains_key("cache.avg_load_time"));
        assert!(!map.contains_key("ai.total_requests"));

        let with_ai = AutoHealMetrics {
            ai: Some(AiServiceMetricsSnapshot::default()),
            ..AutoHealMetrics::default()
        };
        let map = with_ai.to_map();
        assert_eq!(map.len(), 13);
        assert_eq!(map["ai.circuit_breaker_opens"], 0.0);
    }

    #[test]
    fn test_prometheus_collectors_render() {
        let registry = Registry::new();
        register_metrics(&registry);
        register_metrics(&registry);

        record_locate("dom_analysis", true, Duration::from_millis(120));
        record_cache_event(CacheEvent::Hit);
        record_ai_request(AiProvider::Mock, RequestKind::Dom, true);

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("autoheal_locate_total"));
        assert!(text.contains("autoheal_cache_events_total{event=\"hit\"}"));
        assert!(text.contains("autoheal_ai_requests_total"));
        assert!(text.contains("autoheal_locate_duration_seconds_bucket"));
    }
}
