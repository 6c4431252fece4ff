//! Request and cost accounting for AI calls

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const DOM_COST_PER_REQUEST: f64 = 0.02;
pub const VISUAL_COST_PER_REQUEST: f64 = 0.10;
pub const COST_PER_INPUT_TOKEN: f64 = 0.15 / 1_000_000.0;
pub const COST_PER_OUTPUT_TOKEN: f64 = 0.60 / 1_000_000.0;

#[derive(Clone, Default)]
pub struct AiServiceMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time_ms: AtomicU64,
    circuit_breaker_opens: AtomicU64,
}

impl AiServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, success: bool, elapsed: Duration) {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .total_response_time_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_circuit_breaker_open(&self) {
        self.inner.circuit_breaker_opens.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AiServiceMetricsSnapshot {
        AiServiceMetricsSnapshot {
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            successful_requests: self.inner.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.inner.failed_requests.load(Ordering::Relaxed),
            total_response_time_ms: self.inner.total_response_time_ms.load(Ordering::Relaxed),
            circuit_breaker_opens: self.inner.circuit_breaker_opens.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AiServiceMetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_response_time_ms: u64,
    pub circuit_breaker_opens: u64,
}

impl AiServiceMetricsSnapshot {
    pub fn success_rate(&self) -> f64 {
        match self.total_requests {
            0 => 0.0,
            total => self.successful_requests as f64 / total as f64,
        }
    }

    pub fn average_response_time_ms(&self) -> f64 {
        match self.total_requests {
            0 => 0.0,
            total => self.total_response_time_ms as f64 / total as f64,
        }
    }
}

/// Which kind of analysis a cost entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Dom,
    Visual,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Dom => "dom",
            RequestKind::Visual => "visual",
        }
    }

    fn flat_cost(&self) -> f64 {
        match self {
            RequestKind::Dom => DOM_COST_PER_REQUEST,
            RequestKind::Visual => VISUAL_COST_PER_REQUEST,
        }
    }
}

/// Estimated spend on AI analysis. Costs are floats so they live behind a
/// mutex rather than in atomics.
#[derive(Clone, Default)]
pub struct CostMetrics {
    inner: Arc<Mutex<CostMetricsSnapshot>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostMetricsSnapshot {
    pub total_requests: u64,
    pub dom_requests: u64,
    pub visual_requests: u64,
    pub total_cost: f64,
    pub dom_cost: f64,
    pub visual_cost: f64,
    pub total_tokens_used: u64,
    pub dom_tokens_used: u64,
    pub visual_tokens_used: u64,
}

impl CostMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flat per-request estimate, for providers that report no usage.
    pub fn record_request(&self, kind: RequestKind) {
        self.record(kind, kind.flat_cost(), 0);
    }

    pub fn record_request_with_tokens(&self, kind: RequestKind, input_tokens: u64, output_tokens: u64) {
        let cost = token_cost(input_tokens, output_tokens);
        self.record(kind, cost, input_tokens + output_tokens);
    }

    fn record(&self, kind: RequestKind, cost: f64, tokens: u64) {
        let mut state = self.inner.lock();
        state.total_requests += 1;
        state.total_cost += cost;
        state.total_tokens_used += tokens;
        match kind {
            RequestKind::Dom => {
                state.dom_requests += 1;
                state.dom_cost += cost;
                state.dom_tokens_used += tokens;
            }
            RequestKind::Visual => {
                state.visual_requests += 1;
                state.visual_cost += cost;
                state.visual_tokens_used += tokens;
            }
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = CostMetricsSnapshot::default();
    }

    pub fn snapshot(&self) -> CostMetricsSnapshot {
        *self.inner.lock()
    }
}

pub fn token_cost(input_tokens: u64, output_tokens: u64) -> f64 {
    input_tokens as f64 * COST_PER_INPUT_TOKEN + output_tokens as f64 * COST_PER_OUTPUT_TOKEN
}

impl CostMetricsSnapshot {
    pub fn average_cost_per_request(&self) -> f64 {
        match self.total_requests {
            0 => 0.0,
            total => self.total_cost / total as f64,
        }
    }

    /// What running DOM and visual analysis for every request would have
    /// cost, minus what was actually spent.
    pub fn savings_vs_parallel(&self) -> f64 {
        let parallel = self.total_requests as f64 * (DOM_COST_PER_REQUEST + VISUAL_COST_PER_REQUEST);
        parallel - self.total_cost
    }
}
