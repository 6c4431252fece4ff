//! The self-healing locator facade

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use autoheal_ai_service::{create_ai_service, AiService};
use autoheal_core_types::{
    AiProvider, CachedSelector, ElementFingerprint, ExecutionStrategy, LocatorSpec,
    LocatorStrategy, PlaywrightLocator, WebElement,
};
use autoheal_selector_cache::{contextual_key, create_cache, CacheMetricsSnapshot, SelectorCache};
use autoheal_web_adapter::{AdapterError, WebAutomationAdapter};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::{AutoHealConfiguration, ConfigurationValidator};
use crate::errors::LocatorError;
use crate::health::HealthStatus;
use crate::metrics::{
    record_cache_event, record_locate, AutoHealMetrics, CacheEvent, LocatorMetrics,
    LocatorMetricsSnapshot,
};
use crate::monitor::{AutoHealMonitor, MetricsSource};
use crate::orchestrator::CostOptimizedHybridLocator;
use crate::registry::{ElementLocator, StrategyRegistry};
use crate::reporter::{AutoHealReporter, SelectorUsageRecord};
use crate::scorer::ConfidenceScorer;
use crate::types::{LocatorOptions, LocatorRequest, LocatorResult};

const DISAMBIGUATION_TIMEOUT: Duration = Duration::from_secs(5);
const CACHE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
const CACHE_TRUST_THRESHOLD: f64 = 0.7;

/// Finds elements by selector and heals the selector when the page has
/// drifted away from it.
///
/// A lookup tries the caller's selector, then a previously healed selector
/// from the cache, then the AI strategies through the orchestrator. The
/// whole flow is bounded by `performance.element_timeout`.
pub struct AutoHealLocator {
    adapter: Arc<dyn WebAutomationAdapter>,
    cache: Arc<dyn SelectorCache>,
    ai: Arc<dyn AiService>,
    orchestrator: CostOptimizedHybridLocator,
    config: AutoHealConfiguration,
    metrics: LocatorMetrics,
    reporter: Option<AutoHealReporter>,
    monitor: Mutex<Option<Arc<AutoHealMonitor>>>,
    permits: Semaphore,
}

#[derive(Default)]
pub struct AutoHealLocatorBuilder {
    adapter: Option<Arc<dyn WebAutomationAdapter>>,
    config: Option<AutoHealConfiguration>,
    cache: Option<Arc<dyn SelectorCache>>,
    ai: Option<Arc<dyn AiService>>,
    registry: Option<StrategyRegistry>,
}

impl AutoHealLocatorBuilder {
    pub fn with_adapter(mut self, adapter: Arc<dyn WebAutomationAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_configuration(mut self, config: AutoHealConfiguration) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn SelectorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_ai_service(mut self, ai: Arc<dyn AiService>) -> Self {
        self.ai = Some(ai);
        self
    }

    /// Replace the default DOM-then-visual strategy set.
    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub async fn build(self) -> Result<AutoHealLocator, LocatorError> {
        let adapter = self.adapter.ok_or_else(|| {
            LocatorError::Configuration("a web automation adapter is required".to_string())
        })?;
        let config = self.config.unwrap_or_default();

        // An injected AI service carries its own credentials.
        let mut validated = config.clone();
        if self.ai.is_some() {
            validated.ai.provider = AiProvider::Mock;
        }
        let report = ConfigurationValidator::validate(&validated);
        for warning in &report.warnings {
            warn!(warning = %warning, "Configuration warning");
        }
        if !report.is_valid() {
            return Err(LocatorError::Configuration(report.errors.join("; ")));
        }

        let cache = match self.cache {
            Some(cache) => cache,
            None => create_cache(&config.cache).await,
        };
        let ai = match self.ai {
            Some(ai) => ai,
            None => create_ai_service(&config.ai, &config.resilience)?,
        };
        let registry = self
            .registry
            .unwrap_or_else(|| StrategyRegistry::with_defaults(ai.clone()));
        let orchestrator =
            CostOptimizedHybridLocator::new(registry, config.performance.execution_strategy);
        let reporter = config
            .reporting
            .enabled
            .then(|| AutoHealReporter::new(config.reporting.clone()));

        info!(
            framework = %adapter.framework(),
            cache = ?cache.kind(),
            provider = %ai.provider(),
            strategy = config.performance.execution_strategy.name(),
            "AutoHeal locator initialized"
        );

        Ok(AutoHealLocator {
            adapter,
            cache,
            ai,
            orchestrator,
            metrics: LocatorMetrics::new(),
            reporter,
            monitor: Mutex::new(None),
            permits: Semaphore::new(config.performance.max_concurrent_requests.max(1)),
            config,
        })
    }
}

impl AutoHealLocator {
    pub fn builder() -> AutoHealLocatorBuilder {
        AutoHealLocatorBuilder::default()
    }

    pub fn config(&self) -> &AutoHealConfiguration {
        &self.config
    }

    pub fn execution_strategy(&self) -> ExecutionStrategy {
        self.orchestrator.execution_strategy()
    }

    pub fn adapter(&self) -> &Arc<dyn WebAutomationAdapter> {
        &self.adapter
    }

    pub async fn find_element(&self, selector: &str, description: &str) -> Result<WebElement, LocatorError> {
        self.find_element_with(selector, description, LocatorOptions::default())
            .await
    }

    pub async fn find_element_with(
        &self,
        selector: &str,
        description: &str,
        options: LocatorOptions,
    ) -> Result<WebElement, LocatorError> {
        self.locate_with(selector, description, options)
            .await
            .map(|result| result.element)
    }

    pub async fn locate(&self, selector: &str, description: &str) -> Result<LocatorResult, LocatorError> {
        self.locate_with(selector, description, LocatorOptions::default())
            .await
    }

    pub async fn locate_with(
        &self,
        selector: &str,
        description: &str,
        options: LocatorOptions,
    ) -> Result<LocatorResult, LocatorError> {
        self.locate_request(LocatorRequest::new(selector, description).with_options(options))
            .await
    }

    /// Run the healing flow for a fully specified request.
    pub async fn locate_request(&self, request: LocatorRequest) -> Result<LocatorResult, LocatorError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LocatorError::Configuration("locator has been shut down".to_string()))?;

        let started = Instant::now();
        let budget = self.config.performance.element_timeout;
        let outcome = match timeout(budget, self.heal(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(LocatorError::Timeout(format!(
                "Element location exceeded {budget:?} for selector: {}",
                request.original_selector
            ))),
        };
        let elapsed = started.elapsed();
        let outcome = outcome.map(|result| result.with_execution_time(elapsed));
        self.record_outcome(&request, &outcome, elapsed);
        outcome
    }

    async fn heal(&self, request: &LocatorRequest) -> Result<LocatorResult, LocatorError> {
        let key = request.cache_key();

        if let Some(result) = self.try_original(request, &key).await {
            return Ok(result);
        }
        if request.options.enable_caching {
            if let Some(result) = self.try_cached(request, &key).await {
                return Ok(result);
            }
        }

        info!(
            selector = %request.original_selector,
            description = %request.description,
            "Original selector failed, attempting to heal"
        );
        let healed = match timeout(
            request.options.timeout,
            self.orchestrator.locate(request, self.adapter.as_ref()),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(err @ LocatorError::Configuration(_))) => return Err(err),
            Ok(Err(err)) => {
                debug!(error = %err, "Healing strategies exhausted");
                return Err(LocatorError::ElementNotFound(format!(
                    "All healing strategies failed for selector: {}",
                    request.original_selector
                )));
            }
            Err(_) => {
                return Err(LocatorError::Timeout(format!(
                    "Healing exceeded {:?} for selector: {}",
                    request.options.timeout, request.original_selector
                )))
            }
        };

        if healed.confidence < request.options.confidence_threshold {
            warn!(
                selector = %healed.actual_selector,
                confidence = healed.confidence,
                threshold = request.options.confidence_threshold,
                "Healed selector has low confidence"
            );
        }
        if request.options.enable_caching {
            self.store(&key, &healed.actual_selector, &healed.element).await;
        }
        info!(
            original = %request.original_selector,
            healed = %healed.actual_selector,
            strategy = healed.effective_strategy().name(),
            "Element healed"
        );
        Ok(healed)
    }

    async fn try_original(&self, request: &LocatorRequest, key: &str) -> Option<LocatorResult> {
        let elements = match self.find_with_retry(&request.original_selector).await {
            Ok(elements) => elements,
            Err(err) => {
                debug!(selector = %request.original_selector, error = %err, "Original selector lookup failed");
                return None;
            }
        };
        let element = self.pick(elements, &request.description, None).await?;

        debug!(selector = %request.original_selector, "Original selector worked");
        if request.options.enable_caching {
            self.store(key, &request.original_selector, &element).await;
        }
        Some(
            LocatorResult::new(
                element,
                request.original_selector.clone(),
                LocatorStrategy::OriginalSelector,
            )
            .with_confidence(1.0)
            .with_reasoning("Original selector worked"),
        )
    }

    async fn try_cached(&self, request: &LocatorRequest, key: &str) -> Option<LocatorResult> {
        let cached = match self.cache.get(key).await {
            Ok(Some(cached)) => cached,
            Ok(None) => {
                record_cache_event(CacheEvent::Miss);
                return None;
            }
            Err(err) => {
                warn!(key, error = %err, "Cache lookup failed");
                return None;
            }
        };

        let success_rate = cached.current_success_rate();
        if success_rate <= CACHE_TRUST_THRESHOLD {
            debug!(key, success_rate, "Cached selector below trust threshold");
            record_cache_event(CacheEvent::Stale);
            return None;
        }

        let lookup = timeout(CACHE_LOOKUP_TIMEOUT, self.adapter.find_elements(&cached.selector)).await;
        let element = match lookup {
            Ok(Ok(elements)) => {
                self.pick(elements, &request.description, cached.fingerprint.as_ref())
                    .await
            }
            Ok(Err(err)) => {
                debug!(selector = %cached.selector, error = %err, "Cached selector lookup failed");
                None
            }
            Err(_) => {
                debug!(selector = %cached.selector, "Cached selector lookup timed out");
                None
            }
        };

        let found = element.is_some();
        if let Err(err) = self.cache.update_success(key, found).await {
            warn!(key, error = %err, "Failed to update cached selector outcome");
        }
        let Some(element) = element else {
            record_cache_event(CacheEvent::Stale);
            return None;
        };

        record_cache_event(CacheEvent::Hit);
        info!(selector = %cached.selector, success_rate, "Using cached selector");
        Some(
            LocatorResult::new(element, cached.selector, LocatorStrategy::Cached)
                .from_cache()
                .with_confidence(success_rate)
                .with_reasoning("Retrieved from cache"),
        )
    }

    /// Adapter lookup, retrying transient adapter failures. Playwright
    /// locator expressions go through the adapter's own translation.
    async fn find_with_retry(&self, selector: &str) -> Result<Vec<WebElement>, AdapterError> {
        let spec = (!PlaywrightLocator::is_locator_expression(selector))
            .then(|| LocatorSpec::from_selector(selector));
        let attempts = self.config.resilience.retry_max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let lookup = match &spec {
                Some(spec) => self.adapter.find_elements_by(spec).await,
                None => self.adapter.find_elements(selector).await,
            };
            match lookup {
                Ok(elements) => return Ok(elements),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    debug!(selector, attempt, error = %err, "Retrying element lookup");
                    sleep(self.config.resilience.retry_delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One element out of several, preferring the AI's choice. On any AI
    /// failure it falls back to the best match for `reference` when one is
    /// given, else the first element.
    async fn pick(
        &self,
        elements: Vec<WebElement>,
        description: &str,
        reference: Option<&ElementFingerprint>,
    ) -> Option<WebElement> {
        if elements.len() <= 1 {
            return elements.into_iter().next();
        }
        match timeout(
            DISAMBIGUATION_TIMEOUT,
            self.ai.select_best_matching_element(&elements, description),
        )
        .await
        {
            Ok(Ok(element)) => Some(element),
            Ok(Err(err)) => {
                warn!(count = elements.len(), error = %err, "AI disambiguation failed");
                fallback_choice(elements, description, reference)
            }
            Err(_) => {
                warn!(count = elements.len(), "AI disambiguation timed out");
                fallback_choice(elements, description, reference)
            }
        }
    }

    async fn store(&self, key: &str, selector: &str, element: &WebElement) {
        let fingerprint = match self.adapter.element_context(element).await {
            Ok(context) => context.fingerprint,
            Err(err) => {
                warn!(handle = %element.handle, error = %err, "Failed to capture element context");
                None
            }
        };
        match self.cache.put(key, CachedSelector::new(selector, fingerprint)).await {
            Ok(()) => record_cache_event(CacheEvent::Store),
            Err(err) => {
                record_cache_event(CacheEvent::StoreFailed);
                warn!(key, error = %err, "Failed to cache selector");
            }
        }
    }

    fn record_outcome(
        &self,
        request: &LocatorRequest,
        outcome: &Result<LocatorResult, LocatorError>,
        elapsed: Duration,
    ) {
        let (success, from_cache, label) = match outcome {
            Ok(result) => (
                true,
                result.strategy == LocatorStrategy::Cached,
                result.effective_strategy().name(),
            ),
            Err(_) => (false, false, "failed"),
        };
        self.metrics.record_request(success, elapsed, from_cache);
        if self.config.performance.enable_metrics {
            record_locate(label, success, elapsed);
        }

        if let Some(reporter) = &self.reporter {
            let record = match outcome {
                Ok(result) => {
                    SelectorUsageRecord::success(&request.original_selector, &request.description, result)
                }
                Err(err) => SelectorUsageRecord::failure(
                    &request.original_selector,
                    &request.description,
                    elapsed,
                    err,
                ),
            };
            reporter.record(record);
        }
    }

    pub async fn find_elements(&self, selector: &str, description: &str) -> Result<Vec<WebElement>, LocatorError> {
        self.find_elements_with(selector, description, LocatorOptions::default())
            .await
    }

    /// All elements for the selector that worked, or just the located
    /// element when that lookup fails or finds nothing.
    pub async fn find_elements_with(
        &self,
        selector: &str,
        description: &str,
        options: LocatorOptions,
    ) -> Result<Vec<WebElement>, LocatorError> {
        let result = self.locate_with(selector, description, options).await?;
        let working = result.actual_selector.as_str();
        match self.adapter.find_elements(working).await {
            Ok(elements) if !elements.is_empty() => Ok(elements),
            Ok(_) => Ok(vec![result.element]),
            Err(err) => {
                debug!(selector = %working, error = %err, "Bulk lookup failed, returning located element");
                Ok(vec![result.element])
            }
        }
    }

    pub async fn is_element_present(&self, selector: &str, description: &str) -> bool {
        self.find_element(selector, description).await.is_ok()
    }

    pub async fn clear_cache(&self) -> Result<(), LocatorError> {
        self.cache.clear_all().await?;
        info!("Selector cache cleared");
        Ok(())
    }

    pub async fn remove_cached_selector(&self, selector: &str, description: &str) -> Result<bool, LocatorError> {
        let key = contextual_key(selector, description, None);
        Ok(self.cache.remove(&key).await?)
    }

    pub async fn cache_size(&self) -> Result<u64, LocatorError> {
        Ok(self.cache.size().await?)
    }

    pub fn cache_metrics(&self) -> CacheMetricsSnapshot {
        self.cache.metrics()
    }

    pub async fn cleanup_expired_cache(&self) -> Result<u64, LocatorError> {
        let removed = self.cache.evict_expired().await?;
        debug!(removed, "Evicted expired cache entries");
        Ok(removed)
    }

    pub fn metrics(&self) -> AutoHealMetrics {
        AutoHealMetrics {
            locator: self.metrics.snapshot(),
            cache: self.cache.metrics(),
            ai: Some(self.ai.metrics()),
            cost: self.ai.cost_metrics(),
        }
    }

    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::from_metrics(&self.metrics(), self.ai.is_healthy())
    }

    /// Per-strategy request counters of the orchestrator and its locators.
    pub fn strategy_metrics(&self) -> Vec<(&'static str, LocatorMetricsSnapshot)> {
        let mut all = vec![(self.orchestrator.name(), self.orchestrator.metrics())];
        all.extend(
            self.orchestrator
                .registry()
                .ordered()
                .iter()
                .map(|locator| (locator.name(), locator.metrics())),
        );
        all
    }

    pub fn reporter(&self) -> Option<&AutoHealReporter> {
        self.reporter.as_ref()
    }

    /// Write the enabled report formats. Nothing is written when reporting
    /// is off.
    pub async fn generate_reports(&self) -> Result<Vec<PathBuf>, LocatorError> {
        match &self.reporter {
            Some(reporter) => reporter.generate_reports().await,
            None => Ok(Vec::new()),
        }
    }

    pub fn attach_monitor(&self, monitor: Arc<AutoHealMonitor>) {
        if let Some(previous) = self.monitor.lock().replace(monitor) {
            previous.shutdown();
        }
    }

    /// Start a monitor over this locator and attach it.
    pub fn start_monitoring(self: &Arc<Self>, period: Duration) -> Arc<AutoHealMonitor> {
        let source: Arc<dyn MetricsSource> = self.clone();
        let monitor = AutoHealMonitor::new(Arc::downgrade(&source));
        monitor.start(period);
        self.attach_monitor(monitor.clone());
        monitor
    }

    pub async fn shutdown(&self) {
        info!("Shutting down AutoHeal locator");
        if self.reporter.is_some() {
            match self.generate_reports().await {
                Ok(files) => info!(files = files.len(), "Generated final reports"),
                Err(err) => warn!(error = %err, "Failed to generate final reports"),
            }
        }
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.shutdown();
        }
        self.permits.close();
    }
}

fn fallback_choice(
    elements: Vec<WebElement>,
    description: &str,
    reference: Option<&ElementFingerprint>,
) -> Option<WebElement> {
    let Some(reference) = reference else {
        return elements.into_iter().next();
    };
    let mut best: Option<(f64, WebElement)> = None;
    for element in elements {
        let score = ConfidenceScorer::score_candidate(&element, description, Some(reference));
        if best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, element));
        }
    }
    best.map(|(_, element)| element)
}

impl MetricsSource for AutoHealLocator {
    fn metrics(&self) -> AutoHealMetrics {
        AutoHealLocator::metrics(self)
    }

    fn health_status(&self) -> HealthStatus {
        AutoHealLocator::health_status(self)
    }
}

#[cfg(test)]
mod tests {
    use autoheal_ai_service::MockAiService;
    use async_trait::async_trait;
    use autoheal_core_types::{AutomationFramework, ElementContext, Position};
    use autoheal_selector_cache::{CacheConfig, InMemorySelectorCache};
    use autoheal_web_adapter::MockWebAutomationAdapter;

    use super::*;

    async fn build(
        adapter: Arc<MockWebAutomationAdapter>,
        ai: Arc<MockAiService>,
    ) -> (AutoHealLocator, Arc<dyn SelectorCache>) {
        let cache: Arc<dyn SelectorCache> =
            Arc::new(InMemorySelectorCache::new(&CacheConfig::in_memory(100)));
        let locator = AutoHealLocator::builder()
            .with_adapter(adapter)
            .with_ai_service(ai)
            .with_cache(cache.clone())
            .build()
            .await
            .unwrap();
        (locator, cache)
    }

    #[tokio::test]
    async fn test_missing_adapter_is_configuration_error() {
        let err = AutoHealLocator::builder().build().await.err().unwrap();
        assert!(matches!(err, LocatorError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_invalid_configuration_fails_build() {
        let mut config = AutoHealConfiguration::default();
        config.ai.provider = AiProvider::Mock;
        config.cache.max_size = 0;
        let err = AutoHealLocator::builder()
            .with_adapter(Arc::new(MockWebAutomationAdapter::new()))
            .with_configuration(config)
            .build()
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("cache.max_size"));
    }

    #[tokio::test]
    async fn test_original_selector_caches_fingerprint() {
        let adapter = Arc::new(MockWebAutomationAdapter::new());
        adapter.add_mock_element("#login", WebElement::new("e1", "button"));
        let fingerprint = ElementFingerprint::builder().tag_name("button").build();
        adapter.set_element_context(
            "e1",
            ElementContext::new().with_fingerprint(fingerprint.clone()),
        );
        let (locator, cache) = build(adapter, Arc::new(MockAiService::new())).await;

        let result = locator.locate("#login", "login button").await.unwrap();
        assert_eq!(result.strategy, LocatorStrategy::OriginalSelector);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.reasoning, "Original selector worked");

        let cached = cache.get("#login|login button").await.unwrap().unwrap();
        assert_eq!(cached.selector, "#login");
        assert_eq!(cached.fingerprint, Some(fingerprint));
    }

    #[tokio::test]
    async fn test_caching_disabled_skips_cache() {
        let adapter = Arc::new(MockWebAutomationAdapter::new());
        adapter.add_mock_element("#login", WebElement::new("e1", "button"));
        let (locator, cache) = build(adapter, Arc::new(MockAiService::new())).await;

        locator
            .locate_with(
                "#login",
                "login button",
                LocatorOptions::default().with_caching(false),
            )
            .await
            .unwrap();
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_untrusted_cache_entry_is_skipped() {
        let adapter = Arc::new(MockWebAutomationAdapter::new());
        adapter.add_mock_element("#cached", WebElement::new("c1", "button"));
        let ai = Arc::new(MockAiService::new());
        ai.add_failure("login button");
        let (locator, cache) = build(adapter, ai).await;

        let mut entry = CachedSelector::new("#cached", None);
        entry.record_usage(false);
        entry.record_usage(false);
        cache.put("#gone|login button", entry).await.unwrap();

        let err = locator.locate("#gone", "login button").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Element not found: All healing strategies failed for selector: #gone"
        );
    }

    #[tokio::test]
    async fn test_remove_cached_selector_and_size() {
        let adapter = Arc::new(MockWebAutomationAdapter::new());
        adapter.add_mock_element("#login", WebElement::new("e1", "button"));
        let (locator, _) = build(adapter, Arc::new(MockAiService::new())).await;

        locator.find_element("#login", "login button").await.unwrap();
        assert_eq!(locator.cache_size().await.unwrap(), 1);
        assert!(locator.remove_cached_selector("#login", "login button").await.unwrap());
        assert!(!locator.remove_cached_selector("#login", "login button").await.unwrap());
        assert_eq!(locator.cache_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_metrics_and_health() {
        let adapter = Arc::new(MockWebAutomationAdapter::new());
        adapter.add_mock_element("#login", WebElement::new("e1", "button"));
        let (locator, _) = build(adapter, Arc::new(MockAiService::new())).await;

        assert!(locator.is_element_present("#login", "login").await);
        let metrics = locator.metrics();
        assert_eq!(metrics.locator.total_requests, 1);
        assert_eq!(metrics.locator.successful_requests, 1);
        assert!(metrics.ai.is_some());
        assert!(locator.health_status().overall);
        assert_eq!(locator.strategy_metrics()[0].0, "hybrid");
    }

    #[tokio::test]
    async fn test_cached_fingerprint_breaks_disambiguation_ties() {
        let adapter = Arc::new(MockWebAutomationAdapter::new());
        adapter.add_mock_element(
            "button",
            WebElement::new("cancel", "button")
                .with_text("Cancel")
                .with_rect(Position::new(0, 0, 80, 30)),
        );
        adapter.add_mock_element(
            "button",
            WebElement::new("save", "button")
                .with_text("Save")
                .with_rect(Position::new(500, 300, 80, 30)),
        );
        let ai = Arc::new(MockAiService::new());
        ai.add_failure("dialog action");
        let (locator, cache) = build(adapter, ai).await;

        let fingerprint = ElementFingerprint::builder()
            .tag_name("button")
            .text("Save")
            .position(Position::new(500, 300, 80, 30))
            .build();
        cache
            .put("#gone|dialog action", CachedSelector::new("button", Some(fingerprint)))
            .await
            .unwrap();

        let result = locator.locate("#gone", "dialog action").await.unwrap();
        assert_eq!(result.strategy, LocatorStrategy::Cached);
        assert_eq!(result.element.handle, "save");
    }

    /// Adapter that only resolves selectors through `find_elements`.
    struct TranslatingAdapter;

    #[async_trait]
    impl WebAutomationAdapter for TranslatingAdapter {
        fn framework(&self) -> AutomationFramework {
            AutomationFramework::Selenium
        }

        async fn find_elements(&self, selector: &str) -> autoheal_web_adapter::AdapterResult<Vec<WebElement>> {
            Ok(if selector.starts_with("getByRole") {
                vec![WebElement::new("pw-1", "button").with_text("Save")]
            } else {
                Vec::new()
            })
        }

        async fn find_elements_by(&self, _spec: &LocatorSpec) -> autoheal_web_adapter::AdapterResult<Vec<WebElement>> {
            Ok(Vec::new())
        }

        async fn page_source(&self) -> autoheal_web_adapter::AdapterResult<String> {
            Ok(String::new())
        }

        async fn take_screenshot(&self) -> autoheal_web_adapter::AdapterResult<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn element_context(&self, _element: &WebElement) -> autoheal_web_adapter::AdapterResult<ElementContext> {
            Ok(ElementContext::new())
        }
    }

    #[tokio::test]
    async fn test_playwright_original_selector_uses_adapter_translation() {
        let locator = AutoHealLocator::builder()
            .with_adapter(Arc::new(TranslatingAdapter))
            .with_ai_service(Arc::new(MockAiService::new()))
            .with_cache(Arc::new(InMemorySelectorCache::new(&CacheConfig::in_memory(10))))
            .build()
            .await
            .unwrap();

        let result = locator
            .locate("getByRole('button', { name: 'Save' })", "save button")
            .await
            .unwrap();
        assert_eq!(result.strategy, LocatorStrategy::OriginalSelector);
        assert_eq!(result.element.handle, "pw-1");
    }

    #[tokio::test]
    async fn test_find_elements_with_honours_options() {
        let adapter = Arc::new(MockWebAutomationAdapter::new());
        adapter.add_mock_element("#login", WebElement::new("e1", "button"));
        let (locator, cache) = build(adapter, Arc::new(MockAiService::new())).await;

        let found = locator
            .find_elements_with(
                "#login",
                "login button",
                LocatorOptions::default().with_caching(false),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_elements_counts_one_cache_lookup() {
        let adapter = Arc::new(MockWebAutomationAdapter::new());
        adapter.add_mock_element("#save", WebElement::new("s1", "button"));
        let ai = Arc::new(MockAiService::new());
        ai.add_mock_response("save", "#save", 0.9);
        let (locator, cache) = build(adapter, ai).await;

        locator.find_elements("#old-save", "save").await.unwrap();
        let metrics = cache.metrics();
        assert_eq!(metrics.hits + metrics.misses, 1);

        let found = locator.find_elements("#old-save", "save").await.unwrap();
        assert_eq!(found[0].handle, "s1");
        let metrics = cache.metrics();
        assert_eq!((metrics.hits, metrics.misses), (1, 1));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_lookups() {
        let adapter = Arc::new(MockWebAutomationAdapter::new());
        adapter.add_mock_element("#login", WebElement::new("e1", "button"));
        let (locator, _) = build(adapter, Arc::new(MockAiService::new())).await;

        locator.shutdown().await;
        let err = locator.find_element("#login", "login").await.unwrap_err();
        assert!(matches!(err, LocatorError::Configuration(_)));
    }
}
