//! Cost-aware orchestration of the registered locator strategies

use std::sync::Arc;

use async_trait::async_trait;
use autoheal_core_types::{ExecutionStrategy, LocatorStrategy};
use autoheal_web_adapter::WebAutomationAdapter;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::LocatorError;
use crate::metrics::{LocatorMetrics, LocatorMetricsSnapshot};
use crate::registry::{ElementLocator, StrategyRegistry};
use crate::scorer::ConfidenceScorer;
use crate::types::{LocatorRequest, LocatorResult};

/// Runs the registry's locators according to an [`ExecutionStrategy`] and
/// tags every success as a hybrid result.
pub struct CostOptimizedHybridLocator {
    registry: StrategyRegistry,
    execution_strategy: ExecutionStrategy,
    metrics: LocatorMetrics,
}

impl CostOptimizedHybridLocator {
    pub fn new(registry: StrategyRegistry, execution_strategy: ExecutionStrategy) -> Self {
        Self {
            registry,
            execution_strategy,
            metrics: LocatorMetrics::new(),
        }
    }

    pub fn execution_strategy(&self) -> ExecutionStrategy {
        self.execution_strategy
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    async fn run(
        &self,
        request: &LocatorRequest,
        adapter: &dyn WebAutomationAdapter,
    ) -> Result<LocatorResult, LocatorError> {
        match self.execution_strategy {
            ExecutionStrategy::Sequential => {
                self.sequential(&self.registry.ordered(), request, adapter).await
            }
            ExecutionStrategy::Parallel => self.parallel(request, adapter).await,
            ExecutionStrategy::SmartSequential => {
                self.lead_then_rest(LocatorStrategy::DomAnalysis, request, adapter)
                    .await
            }
            ExecutionStrategy::VisualFirst => {
                self.lead_then_rest(LocatorStrategy::VisualAnalysis, request, adapter)
                    .await
            }
            ExecutionStrategy::DomOnly => {
                let dom = self.registry.get(LocatorStrategy::DomAnalysis).ok_or_else(|| {
                    LocatorError::Configuration(
                        "DOM_ONLY execution needs a DOM analysis locator".to_string(),
                    )
                })?;
                dom.locate(request, adapter).await
            }
        }
    }

    async fn sequential(
        &self,
        locators: &[Arc<dyn ElementLocator>],
        request: &LocatorRequest,
        adapter: &dyn WebAutomationAdapter,
    ) -> Result<LocatorResult, LocatorError> {
        for locator in locators {
            if !locator.can_handle(request) {
                debug!(strategy = locator.name(), "Locator strategy cannot handle request");
                continue;
            }
            debug!(strategy = locator.name(), "Trying locator strategy");
            match locator.locate(request, adapter).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    warn!(strategy = locator.name(), error = %err, "Locator strategy failed");
                }
            }
        }
        Err(self.exhausted(request))
    }

    async fn parallel(
        &self,
        request: &LocatorRequest,
        adapter: &dyn WebAutomationAdapter,
    ) -> Result<LocatorResult, LocatorError> {
        let locators: Vec<_> = self
            .registry
            .ordered()
            .into_iter()
            .filter(|locator| locator.can_handle(request))
            .collect();
        let outcomes = join_all(
            locators
                .iter()
                .map(|locator| locator.locate(request, adapter)),
        )
        .await;

        let successes: Vec<LocatorResult> = locators
            .iter()
            .zip(outcomes)
            .filter_map(|(locator, outcome)| match outcome {
                Ok(result) => Some(result),
                Err(err) => {
                    debug!(strategy = locator.name(), error = %err, "Parallel strategy failed");
                    None
                }
            })
            .collect();
        debug!(succeeded = successes.len(), total = locators.len(), "Parallel strategies finished");

        ConfidenceScorer::best(successes, |strategy| self.registry.rank_of(strategy))
            .ok_or_else(|| self.exhausted(request))
    }

    /// `lead` first; if it is missing or fails, the remaining locators in
    /// priority order.
    async fn lead_then_rest(
        &self,
        lead: LocatorStrategy,
        request: &LocatorRequest,
        adapter: &dyn WebAutomationAdapter,
    ) -> Result<LocatorResult, LocatorError> {
        let Some(first) = self.registry.get(lead) else {
            return self.sequential(&self.registry.ordered(), request, adapter).await;
        };
        if !first.can_handle(request) {
            debug!(strategy = first.name(), "Lead strategy cannot handle request");
            let rest = self.registry.without(lead).ordered();
            return self.sequential(&rest, request, adapter).await;
        }

        match first.locate(request, adapter).await {
            Ok(result) => Ok(result),
            Err(err) => {
                info!(
                    strategy = first.name(),
                    error = %err,
                    "Lead strategy failed, falling back to remaining strategies"
                );
                let rest = self.registry.without(lead).ordered();
                self.sequential(&rest, request, adapter).await
            }
        }
    }

    fn exhausted(&self, request: &LocatorRequest) -> LocatorError {
        LocatorError::ElementNotFound(format!(
            "All locator strategies failed for selector: {}",
            request.original_selector
        ))
    }

    fn wrap(&self, inner: LocatorResult, elapsed: std::time::Duration) -> LocatorResult {
        let healed_by = inner.strategy;
        let reasoning = format!(
            "Cost-optimized {} strategy: {}",
            self.execution_strategy.name(),
            inner.reasoning
        );
        LocatorResult {
            strategy: LocatorStrategy::Hybrid,
            healed_by: Some(healed_by),
            from_cache: false,
            execution_time: elapsed,
            reasoning,
            ..inner
        }
    }
}

#[async_trait]
impl ElementLocator for CostOptimizedHybridLocator {
    async fn locate(
        &self,
        request: &LocatorRequest,
        adapter: &dyn WebAutomationAdapter,
    ) -> Result<LocatorResult, LocatorError> {
        let started = Instant::now();
        info!(
            selector = %request.original_selector,
            strategy = self.execution_strategy.name(),
            "Healing element"
        );

        let outcome = self.run(request, adapter).await;
        let elapsed = started.elapsed();
        self.metrics.record_request(outcome.is_ok(), elapsed, false);

        match outcome {
            Ok(inner) => Ok(self.wrap(inner, elapsed)),
            Err(err @ LocatorError::Configuration(_)) => Err(err),
            Err(err) => {
                debug!(error = %err, "Orchestration failed");
                Err(self.exhausted(request))
            }
        }
    }

    fn strategy(&self) -> LocatorStrategy {
        LocatorStrategy::Hybrid
    }

    fn metrics(&self) -> LocatorMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use autoheal_web_adapter::MockWebAutomationAdapter;

    use super::*;
    use crate::registry::tests::StaticLocator;

    fn registry(dom: StaticLocator, visual: StaticLocator) -> StrategyRegistry {
        let mut registry = StrategyRegistry::new();
        registry.register(0, Arc::new(dom));
        registry.register(1, Arc::new(visual));
        registry
    }

    fn request() -> LocatorRequest {
        LocatorRequest::new("#old", "submit button")
    }

    async fn locate(
        strategy: ExecutionStrategy,
        registry: StrategyRegistry,
    ) -> Result<LocatorResult, LocatorError> {
        CostOptimizedHybridLocator::new(registry, strategy)
            .locate(&request(), &MockWebAutomationAdapter::new())
            .await
    }

    #[tokio::test]
    async fn test_smart_sequential_wraps_dom_result() {
        let result = locate(
            ExecutionStrategy::SmartSequential,
            registry(
                StaticLocator::found(LocatorStrategy::DomAnalysis, "#dom", 0.8),
                StaticLocator::found(LocatorStrategy::VisualAnalysis, "#visual", 0.9),
            ),
        )
        .await
        .unwrap();

        assert_eq!(result.strategy, LocatorStrategy::Hybrid);
        assert_eq!(result.healed_by, Some(LocatorStrategy::DomAnalysis));
        assert_eq!(result.actual_selector, "#dom");
        assert!(!result.from_cache);
        assert_eq!(
            result.reasoning,
            "Cost-optimized SMART_SEQUENTIAL strategy: static dom_analysis"
        );
    }

    #[tokio::test]
    async fn test_smart_sequential_falls_back_to_visual() {
        let result = locate(
            ExecutionStrategy::SmartSequential,
            registry(
                StaticLocator::failing(LocatorStrategy::DomAnalysis),
                StaticLocator::found(LocatorStrategy::VisualAnalysis, "#visual", 0.6),
            ),
        )
        .await
        .unwrap();
        assert_eq!(result.healed_by, Some(LocatorStrategy::VisualAnalysis));
        assert!(result.reasoning.starts_with("Cost-optimized SMART_SEQUENTIAL strategy"));
    }

    #[tokio::test]
    async fn test_parallel_picks_highest_confidence() {
        let result = locate(
            ExecutionStrategy::Parallel,
            registry(
                StaticLocator::found(LocatorStrategy::DomAnalysis, "#dom", 0.7),
                StaticLocator::found(LocatorStrategy::VisualAnalysis, "#visual", 0.95),
            ),
        )
        .await
        .unwrap();
        assert_eq!(result.actual_selector, "#visual");

        let tie = locate(
            ExecutionStrategy::Parallel,
            registry(
                StaticLocator::found(LocatorStrategy::DomAnalysis, "#dom", 0.8),
                StaticLocator::found(LocatorStrategy::VisualAnalysis, "#visual", 0.8),
            ),
        )
        .await
        .unwrap();
        assert_eq!(tie.actual_selector, "#dom");
    }

    #[tokio::test]
    async fn test_visual_first_order() {
        let result = locate(
            ExecutionStrategy::VisualFirst,
            registry(
                StaticLocator::found(LocatorStrategy::DomAnalysis, "#dom", 0.8),
                StaticLocator::found(LocatorStrategy::VisualAnalysis, "#visual", 0.5),
            ),
        )
        .await
        .unwrap();
        assert_eq!(result.healed_by, Some(LocatorStrategy::VisualAnalysis));
    }

    #[tokio::test]
    async fn test_dom_only_never_uses_visual() {
        let err = locate(
            ExecutionStrategy::DomOnly,
            registry(
                StaticLocator::failing(LocatorStrategy::DomAnalysis),
                StaticLocator::found(LocatorStrategy::VisualAnalysis, "#visual", 0.9),
            ),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Element not found: All locator strategies failed for selector: #old"
        );

        let mut visual_only = StrategyRegistry::new();
        visual_only.register(
            0,
            Arc::new(StaticLocator::found(LocatorStrategy::VisualAnalysis, "#v", 0.9)),
        );
        let err = locate(ExecutionStrategy::DomOnly, visual_only).await.unwrap_err();
        assert!(matches!(err, LocatorError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_all_failures() {
        for strategy in ExecutionStrategy::all() {
            let err = locate(
                strategy,
                registry(
                    StaticLocator::failing(LocatorStrategy::DomAnalysis),
                    StaticLocator::failing(LocatorStrategy::VisualAnalysis),
                ),
            )
            .await
            .unwrap_err();
            assert!(
                matches!(err, LocatorError::ElementNotFound(_)),
                "{strategy:?}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_locators_that_cannot_handle_are_skipped() {
        let visual = Arc::new(StaticLocator::declining(
            LocatorStrategy::VisualAnalysis,
            "#visual",
            0.99,
        ));
        for strategy in [ExecutionStrategy::Parallel, ExecutionStrategy::VisualFirst] {
            let mut registry = StrategyRegistry::new();
            registry.register(
                0,
                Arc::new(StaticLocator::found(LocatorStrategy::DomAnalysis, "#dom", 0.5)),
            );
            registry.register(1, visual.clone());

            let result = locate(strategy, registry).await.unwrap();
            assert_eq!(result.actual_selector, "#dom", "{strategy:?}");
        }
        assert_eq!(visual.metrics.snapshot().total_requests, 0);
    }

    #[tokio::test]
    async fn test_sequential_without_lead_strategy() {
        let mut only_visual = StrategyRegistry::new();
        only_visual.register(
            3,
            Arc::new(StaticLocator::found(LocatorStrategy::VisualAnalysis, "#v", 0.4)),
        );
        let result = locate(ExecutionStrategy::SmartSequential, only_visual)
            .await
            .unwrap();
        assert_eq!(result.healed_by, Some(LocatorStrategy::VisualAnalysis));
    }
}
