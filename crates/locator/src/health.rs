use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::AutoHealMetrics;

const HEALTHY_SUCCESS_RATE: f64 = 0.8;
const DEGRADED_SUCCESS_RATE: f64 = 0.9;
const DEGRADED_CACHE_HIT_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthSeverity {
    Healthy,
    Degraded,
    Critical,
}

impl fmt::Display for HealthSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthSeverity::Healthy => "HEALTHY",
            HealthSeverity::Degraded => "DEGRADED",
            HealthSeverity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub overall: bool,
    pub ai_service_healthy: bool,
    pub success_rate: f64,
    pub cache_hit_rate: f64,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl HealthStatus {
    /// Health derived from a metrics snapshot. A locator that has served
    /// nothing yet counts as healthy.
    pub fn from_metrics(metrics: &AutoHealMetrics, ai_service_healthy: bool) -> Self {
        let success_rate = metrics.locator.success_rate();
        let overall = metrics.locator.total_requests == 0 || success_rate > HEALTHY_SUCCESS_RATE;

        let mut details = BTreeMap::new();
        details.insert(
            "total_requests".to_string(),
            serde_json::json!(metrics.locator.total_requests),
        );
        details.insert(
            "avg_execution_time_ms".to_string(),
            serde_json::json!(metrics.locator.average_execution_time_ms()),
        );
        details.insert(
            "cache_evictions".to_string(),
            serde_json::json!(metrics.cache.evictions),
        );
        if let Some(ai) = &metrics.ai {
            details.insert(
                "ai_success_rate".to_string(),
                serde_json::json!(ai.success_rate()),
            );
            details.insert(
                "ai_circuit_breaker_opens".to_string(),
                serde_json::json!(ai.circuit_breaker_opens),
            );
        }

        Self {
            overall,
            ai_service_healthy,
            success_rate,
            cache_hit_rate: metrics.locator.cache_hit_rate(),
            details,
        }
    }

    pub fn severity(&self) -> HealthSeverity {
        if !self.overall {
            HealthSeverity::Critical
        } else if self.success_rate < DEGRADED_SUCCESS_RATE
            || self.cache_hit_rate < DEGRADED_CACHE_HIT_RATE
            || !self.ai_service_healthy
        {
            HealthSeverity::Degraded
        } else {
            HealthSeverity::Healthy
        }
    }
}
