//! Canned AI answers for offline runs and tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use autoheal_core_types::{AiAnalysisResult, AiProvider, WebElement};
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::AiError;
use crate::metrics::{
    AiServiceMetrics, AiServiceMetricsSnapshot, CostMetrics, CostMetricsSnapshot, RequestKind,
};
use crate::selection::heuristic_pick;
use crate::AiService;

pub const MOCK_DOM_SELECTOR: &str = "button[data-testid='mock-element']";
pub const MOCK_VISUAL_SELECTOR: &str = "visual-mock-selector";

pub struct MockAiService {
    dom_responses: RwLock<HashMap<String, AiAnalysisResult>>,
    visual_responses: RwLock<HashMap<String, AiAnalysisResult>>,
    failing: RwLock<HashSet<String>>,
    healthy: AtomicBool,
    latency: Duration,
    metrics: AiServiceMetrics,
    cost: CostMetrics,
}

impl Default for MockAiService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAiService {
    pub fn new() -> Self {
        Self {
            dom_responses: RwLock::new(HashMap::new()),
            visual_responses: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            healthy: AtomicBool::new(true),
            latency: Duration::ZERO,
            metrics: AiServiceMetrics::new(),
            cost: CostMetrics::new(),
        }
    }

    /// Simulated processing time for every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn add_mock_response(&self, description: impl Into<String>, selector: impl Into<String>, confidence: f64) {
        let description = description.into();
        let result = AiAnalysisResult::builder(selector)
            .confidence(confidence)
            .reasoning(format!("Mock AI response for: {description}"))
            .build();
        self.add_mock_result(description, result);
    }

    pub fn add_mock_result(&self, description: impl Into<String>, result: AiAnalysisResult) {
        let description = description.into();
        debug!(description = %description, selector = %result.recommended_selector, "Added mock AI response");
        self.dom_responses.write().insert(description, result);
    }

    pub fn add_visual_result(&self, description: impl Into<String>, result: AiAnalysisResult) {
        self.visual_responses.write().insert(description.into(), result);
    }

    /// Make every call for `description` fail.
    pub fn add_failure(&self, description: impl Into<String>) {
        self.failing.write().insert(description.into());
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn check_failure(&self, description: &str, started: Instant) -> Result<(), AiError> {
        if self.failing.read().contains(description) {
            self.metrics.record_request(false, started.elapsed());
            return Err(AiError::Unavailable(format!(
                "mock failure configured for: {description}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AiService for MockAiService {
    async fn analyze_dom(
        &self,
        _html: &str,
        description: &str,
        _previous_selector: Option<&str>,
    ) -> Result<AiAnalysisResult, AiError> {
        let started = Instant::now();
        self.simulate_latency().await;
        self.check_failure(description, started)?;

        let result = self
            .dom_responses
            .read()
            .get(description)
            .cloned()
            .unwrap_or_else(|| {
                AiAnalysisResult::builder(MOCK_DOM_SELECTOR)
                    .confidence(0.85)
                    .reasoning(format!("Mock AI analysis for: {description}"))
                    .build()
            });
        self.metrics.record_request(true, started.elapsed());
        self.cost.record_request(RequestKind::Dom);
        debug!(description, selector = %result.recommended_selector, "Mock AI analyzed DOM");
        Ok(result)
    }

    async fn analyze_visual(&self, _screenshot: &[u8], description: &str) -> Result<AiAnalysisResult, AiError> {
        let started = Instant::now();
        self.simulate_latency().await;
        self.check_failure(description, started)?;

        let result = self
            .visual_responses
            .read()
            .get(description)
            .cloned()
            .unwrap_or_else(|| {
                AiAnalysisResult::builder(MOCK_VISUAL_SELECTOR)
                    .confidence(0.75)
                    .reasoning(format!("Mock visual analysis for: {description}"))
                    .build()
            });
        self.metrics.record_request(true, started.elapsed());
        self.cost.record_request(RequestKind::Visual);
        debug!(description, selector = %result.recommended_selector, "Mock AI visual analysis");
        Ok(result)
    }

    async fn select_best_matching_element(
        &self,
        elements: &[WebElement],
        description: &str,
    ) -> Result<WebElement, AiError> {
        match elements {
            [] => Err(AiError::NoElements),
            [only] => Ok(only.clone()),
            _ => {
                self.simulate_latency().await;
                if self.failing.read().contains(description) {
                    return Err(AiError::Unavailable(format!(
                        "mock failure configured for: {description}"
                    )));
                }
                debug!(count = elements.len(), description, "Mock AI disambiguation");
                heuristic_pick(elements, description)
                    .cloned()
                    .ok_or(AiError::NoElements)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    fn metrics(&self) -> AiServiceMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn cost_metrics(&self) -> Option<CostMetricsSnapshot> {
        Some(self.cost.snapshot())
    }

    fn provider(&self) -> AiProvider {
        AiProvider::Mock
    }
}
