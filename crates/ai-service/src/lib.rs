//! AI element analysis for the self-healing locator.
//!
//! [`AiService`] is what the locator strategies talk to. Two implementations
//! ship here: [`ResilientAiService`], which wraps one provider HTTP client
//! with retries, a per-call timeout and a [`CircuitBreaker`], and
//! [`MockAiService`] for offline runs and tests. [`create_ai_service`] picks
//! between them from an [`AiConfig`].

pub mod anthropic;
pub mod circuit;
pub mod config;
pub mod errors;
pub mod gemini;
pub mod metrics;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod resilient;
pub mod selection;
pub mod utils;

use std::sync::Arc;

use async_trait::async_trait;
use autoheal_core_types::{AiAnalysisResult, AiProvider, WebElement};

pub use circuit::{CircuitBreaker, CircuitState};
pub use config::{AiConfig, ResilienceConfig};
pub use errors::AiError;
pub use metrics::{
    AiServiceMetrics, AiServiceMetricsSnapshot, CostMetrics, CostMetricsSnapshot, RequestKind,
};
pub use mock::MockAiService;
pub use provider::{build_provider, ChatProvider, Completion, CompletionRequest};
pub use resilient::ResilientAiService;
pub use selection::heuristic_pick;

#[async_trait]
pub trait AiService: Send + Sync {
    /// Suggest a selector for `description` from the page HTML.
    async fn analyze_dom(
        &self,
        html: &str,
        description: &str,
        previous_selector: Option<&str>,
    ) -> Result<AiAnalysisResult, AiError>;

    /// Suggest a selector for `description` from a PNG screenshot.
    async fn analyze_visual(&self, screenshot: &[u8], description: &str) -> Result<AiAnalysisResult, AiError>;

    /// Pick the element best matching `description`. Errors on an empty
    /// slice; a single element is returned as is.
    async fn select_best_matching_element(
        &self,
        elements: &[WebElement],
        description: &str,
    ) -> Result<WebElement, AiError>;

    fn is_healthy(&self) -> bool;

    fn metrics(&self) -> AiServiceMetricsSnapshot;

    fn cost_metrics(&self) -> Option<CostMetricsSnapshot> {
        None
    }

    fn provider(&self) -> AiProvider;
}

/// Mock service for the mock provider, a resilient HTTP-backed one
/// otherwise.
pub fn create_ai_service(
    config: &AiConfig,
    resilience: &ResilienceConfig,
) -> Result<Arc<dyn AiService>, AiError> {
    match config.provider {
        AiProvider::Mock => Ok(Arc::new(MockAiService::new())),
        _ => Ok(Arc::new(ResilientAiService::from_config(config, resilience)?)),
    }
}
