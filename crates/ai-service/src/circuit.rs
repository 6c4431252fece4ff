//! Circuit breaker guarding provider calls

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    /// Letting a trial request through after the open timeout
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    timeout: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            timeout,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Whether a request may proceed. An open breaker moves to half-open
    /// once the timeout has passed since the last failure.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed > self.timeout {
                    inner.state = CircuitState::HalfOpen;
                    info!("AI circuit breaker half-open; allowing a trial request");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!("AI circuit breaker closed");
        }
        inner.failure_count = 0;
        inner.state = CircuitState::Closed;
    }

    /// Count a failure. Returns true when this failure opened the breaker.
    pub fn record_failure(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        let should_open = inner.state == CircuitState::HalfOpen
            || (inner.state == CircuitState::Closed && inner.failure_count >= self.failure_threshold);
        if should_open {
            inner.state = CircuitState::Open;
            warn!(
                failures = inner.failure_count,
                timeout = ?self.timeout,
                "AI circuit breaker opened"
            );
        }
        should_open
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Time left before an open breaker admits a trial request.
    pub fn retry_after(&self) -> Duration {
        let inner = self.inner.lock();
        match (inner.state, inner.last_failure) {
            (CircuitState::Open, Some(at)) => self.timeout.saturating_sub(at.elapsed()),
            _ => Duration::ZERO,
        }
    }
}
