//! Locator strategies and the priority-ordered registry that holds them

use std::sync::Arc;

use async_trait::async_trait;
use autoheal_ai_service::AiService;
use autoheal_core_types::LocatorStrategy;
use autoheal_web_adapter::WebAutomationAdapter;
use tracing::debug;

use crate::errors::LocatorError;
use crate::metrics::LocatorMetricsSnapshot;
use crate::strategies::{DomElementLocator, VisualElementLocator};
use crate::types::{LocatorRequest, LocatorResult};

/// One way of finding an element for a request.
#[async_trait]
pub trait ElementLocator: Send + Sync {
    async fn locate(
        &self,
        request: &LocatorRequest,
        adapter: &dyn WebAutomationAdapter,
    ) -> Result<LocatorResult, LocatorError>;

    fn strategy(&self) -> LocatorStrategy;

    /// Whether this locator can run for `request` at all; the orchestrator
    /// skips locators that cannot.
    fn can_handle(&self, _request: &LocatorRequest) -> bool {
        true
    }

    fn supports(&self, strategy: LocatorStrategy) -> bool {
        self.strategy() == strategy
    }

    fn name(&self) -> &'static str {
        self.strategy().name()
    }

    fn metrics(&self) -> LocatorMetricsSnapshot;
}

#[derive(Clone)]
struct Entry {
    priority: u32,
    locator: Arc<dyn ElementLocator>,
}

/// Locators kept in ascending priority order, one per strategy.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    entries: Vec<Entry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// DOM analysis first, visual analysis second.
    pub fn with_defaults(ai: Arc<dyn AiService>) -> Self {
        let mut registry = Self::new();
        registry.register(0, Arc::new(DomElementLocator::new(ai.clone())));
        registry.register(1, Arc::new(VisualElementLocator::new(ai)));
        registry
    }

    /// Add a locator; one already registered for the same strategy is
    /// replaced.
    pub fn register(&mut self, priority: u32, locator: Arc<dyn ElementLocator>) {
        let strategy = locator.strategy();
        self.entries.retain(|entry| entry.locator.strategy() != strategy);
        debug!(strategy = strategy.name(), priority, "Registered locator strategy");
        // Stable for equal priorities: insertion order is kept.
        let index = self
            .entries
            .iter()
            .position(|entry| entry.priority > priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, Entry { priority, locator });
    }

    pub fn get(&self, strategy: LocatorStrategy) -> Option<Arc<dyn ElementLocator>> {
        self.entries
            .iter()
            .find(|entry| entry.locator.supports(strategy))
            .map(|entry| entry.locator.clone())
    }

    pub fn ordered(&self) -> Vec<Arc<dyn ElementLocator>> {
        self.entries.iter().map(|entry| entry.locator.clone()).collect()
    }

    /// A copy of this registry without `strategy`.
    pub fn without(&self, strategy: LocatorStrategy) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|entry| !entry.locator.supports(strategy))
                .cloned()
                .collect(),
        }
    }

    pub fn strategies(&self) -> Vec<LocatorStrategy> {
        self.entries.iter().map(|entry| entry.locator.strategy()).collect()
    }

    /// Position of `strategy` in priority order, used to break ties.
    pub fn rank_of(&self, strategy: LocatorStrategy) -> usize {
        self.entries
            .iter()
            .position(|entry| entry.locator.supports(strategy))
            .unwrap_or(usize::MAX)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.strategies())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use autoheal_ai_service::MockAiService;
    use autoheal_core_types::WebElement;

    use super::*;
    use crate::metrics::LocatorMetrics;

    /// Locator with a fixed answer, for orchestration tests.
    pub(crate) struct StaticLocator {
        pub strategy: LocatorStrategy,
        pub selector: Option<&'static str>,
        pub confidence: f64,
        pub declines: bool,
        pub metrics: LocatorMetrics,
    }

    impl StaticLocator {
        pub(crate) fn found(strategy: LocatorStrategy, selector: &'static str, confidence: f64) -> Self {
            Self {
                strategy,
                selector: Some(selector),
                confidence,
                declines: false,
                metrics: LocatorMetrics::new(),
            }
        }

        /// Would succeed, but reports that it cannot handle any request.
        pub(crate) fn declining(strategy: LocatorStrategy, selector: &'static str, confidence: f64) -> Self {
            Self {
                declines: true,
                ..Self::found(strategy, selector, confidence)
            }
        }

        pub(crate) fn failing(strategy: LocatorStrategy) -> Self {
            Self {
                strategy,
                selector: None,
                confidence: 0.0,
                declines: false,
                metrics: LocatorMetrics::new(),
            }
        }
    }

    #[async_trait]
    impl ElementLocator for StaticLocator {
        async fn locate(
            &self,
            _request: &LocatorRequest,
            _adapter: &dyn WebAutomationAdapter,
        ) -> Result<LocatorResult, LocatorError> {
            let outcome = match self.selector {
                Some(selector) => Ok(LocatorResult::new(
                    WebElement::new(selector, "button"),
                    selector,
                    self.strategy,
                )
                .with_confidence(self.confidence)
                .with_reasoning(format!("static {}", self.strategy.name()))),
                None => Err(LocatorError::strategy_failed(self.name(), "static failure")),
            };
            self.metrics.record_request(
                outcome.is_ok(),
                std::time::Duration::ZERO,
                false,
            );
            outcome
        }

        fn strategy(&self) -> LocatorStrategy {
            self.strategy
        }

        fn can_handle(&self, _request: &LocatorRequest) -> bool {
            !self.declines
        }

        fn metrics(&self) -> LocatorMetricsSnapshot {
            self.metrics.snapshot()
        }
    }

    #[test]
    fn test_default_registry_order() {
        let registry = StrategyRegistry::with_defaults(Arc::new(MockAiService::new()));
        assert_eq!(
            registry.strategies(),
            vec![LocatorStrategy::DomAnalysis, LocatorStrategy::VisualAnalysis]
        );
        assert_eq!(
            registry.get(LocatorStrategy::VisualAnalysis).unwrap().name(),
            "visual_analysis"
        );
        assert!(registry.get(LocatorStrategy::Cached).is_none());
    }

    #[test]
    fn test_register_orders_and_replaces() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            5,
            Arc::new(StaticLocator::found(LocatorStrategy::VisualAnalysis, "#v", 0.5)),
        );
        registry.register(
            1,
            Arc::new(StaticLocator::found(LocatorStrategy::DomAnalysis, "#d", 0.5)),
        );
        assert_eq!(
            registry.strategies(),
            vec![LocatorStrategy::DomAnalysis, LocatorStrategy::VisualAnalysis]
        );

        registry.register(
            9,
            Arc::new(StaticLocator::found(LocatorStrategy::DomAnalysis, "#d2", 0.9)),
        );
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.strategies(),
            vec![LocatorStrategy::VisualAnalysis, LocatorStrategy::DomAnalysis]
        );
        assert_eq!(registry.rank_of(LocatorStrategy::DomAnalysis), 1);
    }

    #[test]
    fn test_static_locator_records_each_call() {
        let adapter = autoheal_web_adapter::MockWebAutomationAdapter::new();
        let request = LocatorRequest::new("#old", "submit");
        let found = StaticLocator::found(LocatorStrategy::DomAnalysis, "#d", 0.7);
        let failing = StaticLocator::failing(LocatorStrategy::VisualAnalysis);

        let result = tokio_test::block_on(found.locate(&request, &adapter)).unwrap();
        assert_eq!(result.actual_selector, "#d");
        assert!(tokio_test::block_on(failing.locate(&request, &adapter)).is_err());
        assert!(found.can_handle(&request));
        assert!(!StaticLocator::declining(LocatorStrategy::DomAnalysis, "#d", 0.7).can_handle(&request));
        assert_eq!(found.metrics().successful_requests, 1);
        assert_eq!(failing.metrics().total_requests, 1);
    }

    #[test]
    fn test_without_leaves_original_untouched() {
        let registry = StrategyRegistry::with_defaults(Arc::new(MockAiService::new()));
        let rest = registry.without(LocatorStrategy::DomAnalysis);
        assert_eq!(rest.strategies(), vec![LocatorStrategy::VisualAnalysis]);
        assert_eq!(registry.len(), 2);
    }
}
