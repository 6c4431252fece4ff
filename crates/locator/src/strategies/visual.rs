use std::sync::Arc;

use async_trait::async_trait;
use autoheal_ai_service::{AiService, RequestKind};
use autoheal_core_types::LocatorStrategy;
use autoheal_web_adapter::WebAutomationAdapter;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::errors::LocatorError;
use crate::metrics::{record_ai_request, LocatorMetrics, LocatorMetricsSnapshot};
use crate::registry::ElementLocator;
use crate::scorer::select_best_element;
use crate::types::{LocatorRequest, LocatorResult};

const REASONING_PREFIX: &str = "Enhanced Visual AI analysis";

/// Heals from a screenshot, trying the primary suggestion and then each
/// alternative by descending confidence.
pub struct VisualElementLocator {
    ai: Arc<dyn AiService>,
    metrics: LocatorMetrics,
}

impl VisualElementLocator {
    pub fn new(ai: Arc<dyn AiService>) -> Self {
        Self {
            ai,
            metrics: LocatorMetrics::new(),
        }
    }

    async fn analyze(
        &self,
        request: &LocatorRequest,
        adapter: &dyn WebAutomationAdapter,
    ) -> Result<LocatorResult, LocatorError> {
        if !request.options.enable_visual_analysis {
            return Err(LocatorError::VisualAnalysisDisabled);
        }

        let screenshot = adapter.take_screenshot().await?;
        debug!(bytes = screenshot.len(), "Sending screenshot for visual analysis");

        let analysis = self
            .ai
            .analyze_visual(&screenshot, &request.description)
            .await;
        record_ai_request(self.ai.provider(), RequestKind::Visual, analysis.is_ok());
        let analysis = analysis?;
        let tokens = analysis.token_usage.map(|usage| usage.total());

        let primary = analysis.recommended_selector.clone();
        let mut attempts = vec![(
            primary.clone(),
            analysis.confidence,
            "primary".to_string(),
        )];
        for candidate in analysis.alternatives_by_confidence() {
            attempts.push((
                candidate.selector.clone(),
                candidate.confidence,
                format!("{} fallback", fallback_kind(&candidate.description)),
            ));
        }

        for (selector, confidence, label) in &attempts {
            if selector.trim().is_empty() {
                continue;
            }
            let elements = match adapter.find_elements(selector).await {
                Ok(elements) => elements,
                Err(err) => {
                    debug!(selector = %selector, error = %err, "Visual candidate lookup failed");
                    continue;
                }
            };
            let Some(element) = select_best_element(&elements, &request.description) else {
                debug!(selector = %selector, "Visual candidate matched nothing");
                continue;
            };

            return Ok(
                LocatorResult::new(element.clone(), selector.clone(), LocatorStrategy::VisualAnalysis)
                    .with_confidence(*confidence)
                    .with_reasoning(format!(
                        "{REASONING_PREFIX} ({label}): {}",
                        analysis.reasoning
                    ))
                    .with_tokens(tokens),
            );
        }

        let alternatives: Vec<&str> = attempts
            .iter()
            .skip(1)
            .map(|(selector, _, _)| selector.as_str())
            .collect();
        Err(LocatorError::ElementNotFound(format!(
            "Visual analysis selectors matched no elements (primary: {primary}, alternatives: [{}])",
            alternatives.join(", ")
        )))
    }
}

fn fallback_kind(description: &str) -> &'static str {
    if description.contains("text-based") {
        "text-based"
    } else if description.contains("attribute-based") {
        "attribute-based"
    } else {
        "alternative"
    }
}

#[async_trait]
impl ElementLocator for VisualElementLocator {
    async fn locate(
        &self,
        request: &LocatorRequest,
        adapter: &dyn WebAutomationAdapter,
    ) -> Result<LocatorResult, LocatorError> {
        let started = Instant::now();
        let outcome = self.analyze(request, adapter).await;
        let elapsed = started.elapsed();
        self.metrics.record_request(outcome.is_ok(), elapsed, false);

        let result = outcome?;
        info!(
            original = %request.original_selector,
            healed = %result.actual_selector,
            confidence = result.confidence,
            "Visual analysis located element"
        );
        Ok(result.with_execution_time(elapsed))
    }

    fn strategy(&self) -> LocatorStrategy {
        LocatorStrategy::VisualAnalysis
    }

    fn can_handle(&self, request: &LocatorRequest) -> bool {
        request.options.enable_visual_analysis && self.ai.is_healthy()
    }

    fn metrics(&self) -> LocatorMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use autoheal_ai_service::MockAiService;
    use autoheal_core_types::{AiAnalysisResult, ElementCandidate, WebElement};
    use autoheal_web_adapter::MockWebAutomationAdapter;

    use super::*;
    use crate::types::LocatorOptions;

    fn request() -> LocatorRequest {
        LocatorRequest::new("#cart", "cart icon")
    }

    #[tokio::test]
    async fn test_disabled_fails_fast() {
        let ai = Arc::new(MockAiService::new());
        let locator = VisualElementLocator::new(ai.clone());
        let request = request().with_options(LocatorOptions::default().with_visual_analysis(false));

        assert!(!locator.can_handle(&request));
        let err = locator
            .locate(&request, &MockWebAutomationAdapter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::VisualAnalysisDisabled));
        assert_eq!(ai.metrics().total_requests, 0);
    }

    #[tokio::test]
    async fn test_primary_selector() {
        let ai = Arc::new(MockAiService::new());
        let adapter = MockWebAutomationAdapter::new();
        adapter.add_mock_element(
            autoheal_ai_service::mock::MOCK_VISUAL_SELECTOR,
            WebElement::new("v1", "a"),
        );

        let result = VisualElementLocator::new(ai)
            .locate(&request(), &adapter)
            .await
            .unwrap();
        assert_eq!(result.strategy, LocatorStrategy::VisualAnalysis);
        assert_eq!(result.confidence, 0.75);
        assert!(result
            .reasoning
            .starts_with("Enhanced Visual AI analysis (primary): "));
    }

    #[tokio::test]
    async fn test_falls_back_to_alternatives_by_confidence() {
        let ai = Arc::new(MockAiService::new());
        ai.add_visual_result(
            "cart icon",
            AiAnalysisResult::builder("#gone")
                .confidence(0.9)
                .reasoning("cart in header")
                .alternatives(vec![
                    ElementCandidate::new("#also-gone", 0.4, "alternative"),
                    ElementCandidate::new("a[aria-label='Cart']", 0.7, "attribute-based match"),
                ])
                .build(),
        );
        let adapter = MockWebAutomationAdapter::new();
        adapter.add_mock_element("a[aria-label='Cart']", WebElement::new("c1", "a"));

        let result = VisualElementLocator::new(ai)
            .locate(&request(), &adapter)
            .await
            .unwrap();
        assert_eq!(result.actual_selector, "a[aria-label='Cart']");
        assert_eq!(result.confidence, 0.7);
        assert_eq!(
            result.reasoning,
            "Enhanced Visual AI analysis (attribute-based fallback): cart in header"
        );
    }

    #[tokio::test]
    async fn test_error_lists_all_selectors() {
        let ai = Arc::new(MockAiService::new());
        ai.add_visual_result(
            "cart icon",
            AiAnalysisResult::builder("#gone")
                .alternatives(vec![ElementCandidate::new("#text-gone", 0.5, "text-based")])
                .build(),
        );

        let locator = VisualElementLocator::new(ai);
        let err = locator
            .locate(&request(), &MockWebAutomationAdapter::new())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("#gone"));
        assert!(message.contains("#text-gone"));
        assert_eq!(locator.metrics().successful_requests, 0);
    }

    #[test]
    fn test_unhealthy_ai_cannot_handle() {
        let ai = Arc::new(MockAiService::new());
        ai.set_healthy(false);
        assert!(!VisualElementLocator::new(ai).can_handle(&request()));
    }
}
