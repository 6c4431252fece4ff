//! Periodic metrics snapshots, alerting and listener fan-out

use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::health::HealthStatus;
use crate::metrics::AutoHealMetrics;

const LOW_SUCCESS_RATE: f64 = 0.8;
const LOW_CACHE_HIT_RATE: f64 = 0.5;
const HIGH_RESPONSE_TIME_MS: f64 = 5000.0;

/// Anything that can be asked for a metrics snapshot and its health.
pub trait MetricsSource: Send + Sync {
    fn metrics(&self) -> AutoHealMetrics;

    fn health_status(&self) -> HealthStatus;
}

pub trait MetricsListener: Send + Sync {
    fn on_metrics_update(&self, metrics: &AutoHealMetrics, health: &HealthStatus) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    LowSuccessRate,
    LowCacheHitRate,
    SystemUnhealthy,
    HighResponseTime,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowSuccessRate => "LOW_SUCCESS_RATE",
            AlertKind::LowCacheHitRate => "LOW_CACHE_HIT_RATE",
            AlertKind::SystemUnhealthy => "SYSTEM_UNHEALTHY",
            AlertKind::HighResponseTime => "HIGH_RESPONSE_TIME",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub struct AutoHealMonitor {
    source: Weak<dyn MetricsSource>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn MetricsListener>)>>,
    next_id: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoHealMonitor {
    /// The monitor holds the source weakly; the task ends once the source
    /// is dropped.
    pub fn new(source: Weak<dyn MetricsSource>) -> Arc<Self> {
        Arc::new(Self {
            source,
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            task: Mutex::new(None),
        })
    }

    /// Spawn the periodic check. Calling it again while running is a no-op.
    pub fn start(self: &Arc<Self>, period: Duration) {
        let mut guard = self.task.lock();
        if guard.is_some() {
            return;
        }
        let weak = Arc::downgrade(self);
        let period = period.max(Duration::from_millis(10));
        info!(period = ?period, "Starting AutoHeal monitor");
        *guard = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(monitor) = weak.upgrade() else {
                    break;
                };
                if !monitor.collect() {
                    debug!("Metrics source dropped, stopping monitor");
                    break;
                }
            }
        }));
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// One snapshot, alert pass and listener round. False once the source
    /// is gone.
    pub fn collect(&self) -> bool {
        let Some(source) = self.source.upgrade() else {
            return false;
        };
        let metrics = source.metrics();
        let health = source.health_status();
        Self::check_alerts(&metrics, &health);
        self.notify(&metrics, &health);
        true
    }

    pub fn check_alerts(metrics: &AutoHealMetrics, health: &HealthStatus) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let success_rate = metrics.locator.success_rate();
        let has_traffic = metrics.locator.total_requests > 0;

        if has_traffic && success_rate < LOW_SUCCESS_RATE {
            alerts.push(Alert {
                kind: AlertKind::LowSuccessRate,
                message: format!("Success rate is {:.1}%", success_rate * 100.0),
            });
        }
        let cache_hit_rate = metrics.locator.cache_hit_rate();
        if has_traffic && cache_hit_rate < LOW_CACHE_HIT_RATE {
            alerts.push(Alert {
                kind: AlertKind::LowCacheHitRate,
                message: format!("Cache hit rate is {:.1}%", cache_hit_rate * 100.0),
            });
        }
        if !health.overall {
            alerts.push(Alert {
                kind: AlertKind::SystemUnhealthy,
                message: format!("System health is {}", health.severity()),
            });
        }
        if let Some(ai) = &metrics.ai {
            let average = ai.average_response_time_ms();
            if average > HIGH_RESPONSE_TIME_MS {
                alerts.push(Alert {
                    kind: AlertKind::HighResponseTime,
                    message: format!("Average AI response time is {average:.0}ms"),
                });
            }
        }

        for alert in &alerts {
            warn!(alert = %alert.kind, "{}", alert.message);
        }
        alerts
    }

    pub fn add_listener(&self, listener: Arc<dyn MetricsListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn notify(&self, metrics: &AutoHealMetrics, health: &HealthStatus) {
        let listeners: Vec<_> = self.listeners.read().clone();
        for (id, listener) in listeners {
            match panic::catch_unwind(panic::AssertUnwindSafe(|| {
                listener.on_metrics_update(metrics, health)
            })) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(listener = id.0, error = %err, "Metrics listener failed"),
                Err(_) => error!(listener = id.0, "Metrics listener panicked; continuing"),
            }
        }
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("AutoHeal monitor stopped");
        }
    }
}

impl Drop for AutoHealMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use autoheal_ai_service::AiServiceMetricsSnapshot;

    use super::*;
    use crate::metrics::LocatorMetricsSnapshot;

    struct FixedSource {
        metrics: AutoHealMetrics,
    }

    impl MetricsSource for FixedSource {
        fn metrics(&self) -> AutoHealMetrics {
            self.metrics.clone()
        }

        fn health_status(&self) -> HealthStatus {
            HealthStatus::from_metrics(&self.metrics, true)
        }
    }

    #[derive(Default)]
    struct CountingListener {
        calls: AtomicUsize,
    }

    impl MetricsListener for CountingListener {
        fn on_metrics_update(&self, _: &AutoHealMetrics, _: &HealthStatus) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PanickingListener;

    impl MetricsListener for PanickingListener {
        fn on_metrics_update(&self, _: &AutoHealMetrics, _: &HealthStatus) -> anyhow::Result<()> {
            panic!("listener bug");
        }
    }

    struct FailingListener;

    impl MetricsListener for FailingListener {
        fn on_metrics_update(&self, _: &AutoHealMetrics, _: &HealthStatus) -> anyhow::Result<()> {
            anyhow::bail!("sink unavailable")
        }
    }

    fn poor_metrics() -> AutoHealMetrics {
        AutoHealMetrics {
            locator: LocatorMetricsSnapshot {
                total_requests: 10,
                successful_requests: 5,
                cache_hits: 1,
                cache_misses: 9,
                total_execution_ms: 100,
            },
            ai: Some(AiServiceMetricsSnapshot {
                total_requests: 2,
                successful_requests: 2,
                failed_requests: 0,
                total_response_time_ms: 12_000,
                circuit_breaker_opens: 0,
            }),
            ..AutoHealMetrics::default()
        }
    }

    fn source(metrics: AutoHealMetrics) -> Arc<dyn MetricsSource> {
        Arc::new(FixedSource { metrics })
    }

    #[test]
    fn test_all_alerts() {
        let metrics = poor_metrics();
        let health = HealthStatus::from_metrics(&metrics, true);
        let kinds: Vec<AlertKind> = AutoHealMonitor::check_alerts(&metrics, &health)
            .into_iter()
            .map(|alert| alert.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AlertKind::LowSuccessRate,
                AlertKind::LowCacheHitRate,
                AlertKind::SystemUnhealthy,
                AlertKind::HighResponseTime
            ]
        );
    }

    #[test]
    fn test_no_alerts_without_traffic() {
        let metrics = AutoHealMetrics::default();
        let health = HealthStatus::from_metrics(&metrics, true);
        assert!(AutoHealMonitor::check_alerts(&metrics, &health).is_empty());
    }

    #[test]
    fn test_bad_listeners_do_not_stop_others() {
        let source = source(poor_metrics());
        let monitor = AutoHealMonitor::new(Arc::downgrade(&source));
        let counter = Arc::new(CountingListener::default());

        monitor.add_listener(Arc::new(PanickingListener));
        monitor.add_listener(Arc::new(FailingListener));
        let id = monitor.add_listener(counter.clone());

        assert!(monitor.collect());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

        assert!(monitor.remove_listener(id));
        assert!(!monitor.remove_listener(id));
        assert!(monitor.collect());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.listener_count(), 2);
    }

    #[test]
    fn test_collect_after_source_dropped() {
        let source = source(AutoHealMetrics::default());
        let monitor = AutoHealMonitor::new(Arc::downgrade(&source));
        drop(source);
        assert!(!monitor.collect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_task_and_shutdown() {
        let source = source(AutoHealMetrics::default());
        let monitor = AutoHealMonitor::new(Arc::downgrade(&source));
        let counter = Arc::new(CountingListener::default());
        monitor.add_listener(counter.clone());

        monitor.start(Duration::from_secs(1));
        assert!(monitor.is_running());
        tokio::time::sleep(Duration::from_millis(3500)).await;
        let calls = counter.calls.load(Ordering::SeqCst);
        assert!(calls >= 3, "{calls}");

        monitor.shutdown();
        tokio::task::yield_now().await;
        assert!(!monitor.is_running());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), calls);
    }
}
