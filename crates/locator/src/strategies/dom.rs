use std::sync::Arc;

use async_trait::async_trait;
use autoheal_ai_service::{AiService, RequestKind};
use autoheal_core_types::LocatorStrategy;
use autoheal_web_adapter::WebAutomationAdapter;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::LocatorError;
use crate::metrics::{record_ai_request, LocatorMetrics, LocatorMetricsSnapshot};
use crate::registry::ElementLocator;
use crate::types::{LocatorRequest, LocatorResult};

/// Heals by asking the AI to read the page source.
pub struct DomElementLocator {
    ai: Arc<dyn AiService>,
    metrics: LocatorMetrics,
}

impl DomElementLocator {
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
        let html = adapter.page_source().await?;
        debug!(
            selector = %request.original_selector,
            html_len = html.len(),
            "Sending page source for DOM analysis"
        );

        let analysis = self
            .ai
            .analyze_dom(&html, &request.description, Some(&request.original_selector))
            .await;
        record_ai_request(self.ai.provider(), RequestKind::Dom, analysis.is_ok());
        let analysis = analysis?;

        let selector = analysis.recommended_selector.clone();
        let elements = adapter.find_elements(&selector).await?;
        let element = match elements.len() {
            0 => {
                return Err(LocatorError::ElementNotFound(format!(
                    "AI suggested selector found no elements: {selector}"
                )))
            }
            1 => elements.into_iter().next(),
            count => {
                debug!(selector = %selector, count, "Disambiguating DOM analysis matches");
                match self
                    .ai
                    .select_best_matching_element(&elements, &request.description)
                    .await
                {
                    Ok(element) => Some(element),
                    Err(err) => {
                        warn!(error = %err, "AI disambiguation failed, using first match");
                        elements.into_iter().next()
                    }
                }
            }
        };
        let element = element.ok_or_else(|| {
            LocatorError::ElementNotFound(format!(
                "AI suggested selector found no elements: {selector}"
            ))
        })?;

        Ok(LocatorResult::new(element, selector, LocatorStrategy::DomAnalysis)
            .with_confidence(analysis.confidence)
            .with_reasoning(analysis.reasoning.clone())
            .with_tokens(analysis.token_usage.map(|usage| usage.total())))
    }
}

#[async_trait]
impl ElementLocator for DomElementLocator {
    async fn locate(
        &self,
        request: &LocatorRequest,
        adapter: &dyn WebAutomationAdapter,
    ) -> Result<LocatorResult, LocatorError> {
        let started = Instant::now();
        let outcome = self.analyze(request, adapter).await;
        let elapsed = started.elapsed();
        self.metrics.record_request(outcome.is_ok(), elapsed, false);

        match outcome {
            Ok(result) => {
                info!(
                    original = %request.original_selector,
                    healed = %result.actual_selector,
                    confidence = result.confidence,
                    "DOM analysis located element"
                );
                Ok(result.with_execution_time(elapsed))
            }
            Err(err) => {
                debug!(selector = %request.original_selector, error = %err, "DOM analysis failed");
                Err(err)
            }
        }
    }

    fn strategy(&self) -> LocatorStrategy {
        LocatorStrategy::DomAnalysis
    }

    fn metrics(&self) -> LocatorMetricsSnapshot {
        self.metrics.snapshot()
    }
}
