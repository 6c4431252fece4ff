//! End-to-end healing through the facade with mock adapter and AI

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autoheal_ai_service::{AiService, MockAiService};
use autoheal_core_types::{
    AiAnalysisResult, AutomationFramework, CachedSelector, ElementCandidate, ElementContext,
    ExecutionStrategy, LocatorSpec, LocatorStrategy, WebElement,
};
use autoheal_locator::{
    AutoHealConfiguration, AutoHealLocator, LocatorError, LocatorOptions, PerformanceConfig,
    ReportingConfig, SelectorStrategy,
};
use autoheal_selector_cache::{CacheConfig, InMemorySelectorCache, SelectorCache};
use autoheal_web_adapter::{AdapterResult, MockWebAutomationAdapter, WebAutomationAdapter};

struct Harness {
    adapter: Arc<MockWebAutomationAdapter>,
    ai: Arc<MockAiService>,
    cache: Arc<dyn SelectorCache>,
}

impl Harness {
    fn new() -> Self {
        Self {
            adapter: Arc::new(MockWebAutomationAdapter::new()),
            ai: Arc::new(MockAiService::new()),
            cache: Arc::new(InMemorySelectorCache::new(&CacheConfig::in_memory(1_000))),
        }
    }

    async fn locator(&self, config: AutoHealConfiguration) -> AutoHealLocator {
        AutoHealLocator::builder()
            .with_adapter(self.adapter.clone())
            .with_ai_service(self.ai.clone())
            .with_cache(self.cache.clone())
            .with_configuration(config)
            .build()
            .await
            .unwrap()
    }

    async fn default_locator(&self) -> AutoHealLocator {
        self.locator(AutoHealConfiguration::default()).await
    }
}

fn config_with(strategy: ExecutionStrategy) -> AutoHealConfiguration {
    AutoHealConfiguration::default()
        .with_performance(PerformanceConfig::default().with_execution_strategy(strategy))
}

#[tokio::test]
async fn test_original_selector_success() {
    let harness = Harness::new();
    harness
        .adapter
        .add_mock_element("#login-btn", WebElement::new("btn-1", "button").with_text("Login"));
    let locator = harness.default_locator().await;

    let result = locator.locate("#login-btn", "login button").await.unwrap();
    assert_eq!(result.strategy, LocatorStrategy::OriginalSelector);
    assert_eq!(result.element.handle, "btn-1");
    assert!(!result.from_cache);
    assert_eq!(harness.ai.metrics().total_requests, 0);
    assert_eq!(harness.cache.size().await.unwrap(), 1);
}

#[tokio::test]
async fn test_cache_hit_after_heal() {
    let harness = Harness::new();
    harness.ai.add_mock_response("login button", "#signin", 0.9);
    harness
        .adapter
        .add_mock_element("#signin", WebElement::new("btn-2", "button").with_text("Sign in"));
    let locator = harness.default_locator().await;

    let healed = locator.locate("#login-btn", "login button").await.unwrap();
    assert_eq!(healed.strategy, LocatorStrategy::Hybrid);
    assert_eq!(healed.healed_by, Some(LocatorStrategy::DomAnalysis));
    assert_eq!(healed.actual_selector, "#signin");
    assert!(healed
        .reasoning
        .starts_with("Cost-optimized SMART_SEQUENTIAL strategy: "));

    let cached = locator.locate("#login-btn", "login button").await.unwrap();
    assert_eq!(cached.strategy, LocatorStrategy::Cached);
    assert!(cached.from_cache);
    assert_eq!(cached.reasoning, "Retrieved from cache");
    assert_eq!(cached.confidence, 1.0);
    assert_eq!(cached.element.handle, "btn-2");

    // only the first lookup reached the AI
    assert_eq!(harness.ai.metrics().total_requests, 1);

    let metrics = locator.metrics();
    assert_eq!(metrics.locator.total_requests, 2);
    assert_eq!(metrics.locator.cache_hits, 1);
}

#[tokio::test]
async fn test_stale_cache_entry_falls_through_to_heal() {
    let harness = Harness::new();
    harness.ai.add_mock_response("login button", "#signin", 0.9);
    harness
        .adapter
        .add_mock_element("#signin", WebElement::new("btn-2", "button"));
    harness
        .cache
        .put(
            "#login-btn|login button",
            CachedSelector::new("#vanished", None),
        )
        .await
        .unwrap();
    let locator = harness.default_locator().await;

    let result = locator.locate("#login-btn", "login button").await.unwrap();
    assert_eq!(result.strategy, LocatorStrategy::Hybrid);
    assert_eq!(result.actual_selector, "#signin");

    let entry = harness
        .cache
        .get("#login-btn|login button")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.selector, "#signin");
}

#[tokio::test]
async fn test_heal_failure() {
    let harness = Harness::new();
    harness.ai.add_failure("login button");
    let locator = harness.default_locator().await;

    let err = locator.find_element("#login-btn", "login button").await.unwrap_err();
    assert!(matches!(err, LocatorError::ElementNotFound(_)));
    assert_eq!(
        err.to_string(),
        "Element not found: All healing strategies failed for selector: #login-btn"
    );
    assert!(!locator.is_element_present("#login-btn", "login button").await);

    let metrics = locator.metrics();
    assert_eq!(metrics.locator.total_requests, 2);
    assert_eq!(metrics.locator.successful_requests, 0);
    assert!(!locator.health_status().overall);
}

#[tokio::test]
async fn test_visual_fallback_and_visual_disabled() {
    let harness = Harness::new();
    harness.ai.add_mock_response("cart icon", "#dom-miss", 0.9);
    harness.ai.add_visual_result(
        "cart icon",
        AiAnalysisResult::builder("#visual-miss")
            .confidence(0.8)
            .reasoning("cart glyph top right")
            .alternatives(vec![ElementCandidate::new(
                "a.cart",
                0.6,
                "text-based candidate",
            )])
            .build(),
    );
    harness.adapter.add_mock_element("a.cart", WebElement::new("cart", "a"));
    let locator = harness.default_locator().await;

    let result = locator.locate("#cart", "cart icon").await.unwrap();
    assert_eq!(result.healed_by, Some(LocatorStrategy::VisualAnalysis));
    assert_eq!(
        result.reasoning,
        "Cost-optimized SMART_SEQUENTIAL strategy: Enhanced Visual AI analysis (text-based fallback): cart glyph top right"
    );

    locator.clear_cache().await.unwrap();
    let err = locator
        .locate_with(
            "#cart",
            "cart icon",
            LocatorOptions::default().with_visual_analysis(false),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LocatorError::ElementNotFound(_)));
}

#[tokio::test]
async fn test_disambiguation_falls_back_to_first_element() {
    let harness = Harness::new();
    harness.adapter.add_mock_element("button", WebElement::new("first", "button"));
    harness.adapter.add_mock_element("button", WebElement::new("second", "button"));
    harness.ai.add_failure("some button");
    let locator = harness.default_locator().await;

    let element = locator.find_element("button", "some button").await.unwrap();
    assert_eq!(element.handle, "first");

    let all = locator.find_elements("button", "some button").await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_find_elements_uses_healed_selector() {
    let harness = Harness::new();
    harness.ai.add_mock_response("save", "#save", 0.9);
    harness.adapter.add_mock_element("#save", WebElement::new("s1", "button"));
    let locator = harness.default_locator().await;

    let found = locator.find_elements("#old-save", "save").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].handle, "s1");
}

#[tokio::test]
async fn test_execution_strategies() {
    for strategy in ExecutionStrategy::all() {
        let harness = Harness::new();
        harness.ai.add_mock_response("search box", "#q", 0.8);
        harness.adapter.add_mock_element("#q", WebElement::new("q", "input"));
        harness.adapter.add_mock_element(
            autoheal_ai_service::mock::MOCK_VISUAL_SELECTOR,
            WebElement::new("v", "input"),
        );
        let locator = harness.locator(config_with(strategy)).await;

        let result = locator.locate("#search", "search box").await.unwrap();
        let expected = match strategy {
            ExecutionStrategy::VisualFirst => LocatorStrategy::VisualAnalysis,
            _ => LocatorStrategy::DomAnalysis,
        };
        assert_eq!(result.healed_by, Some(expected), "{strategy}");
        assert!(
            result
                .reasoning
                .starts_with(&format!("Cost-optimized {} strategy", strategy.name())),
            "{}",
            result.reasoning
        );
    }
}

#[tokio::test]
async fn test_dom_only_does_not_try_visual() {
    let harness = Harness::new();
    harness.adapter.add_mock_element(
        autoheal_ai_service::mock::MOCK_VISUAL_SELECTOR,
        WebElement::new("v", "input"),
    );
    let locator = harness.locator(config_with(ExecutionStrategy::DomOnly)).await;

    let err = locator.locate("#search", "search box").await.unwrap_err();
    assert!(matches!(err, LocatorError::ElementNotFound(_)));
    assert_eq!(harness.ai.cost_metrics().unwrap().visual_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn test_element_timeout() {
    let harness = Harness {
        ai: Arc::new(MockAiService::new().with_latency(Duration::from_secs(30))),
        ..Harness::new()
    };
    let config = AutoHealConfiguration::default().with_performance(
        PerformanceConfig::default().with_element_timeout(Duration::from_secs(2)),
    );
    let locator = harness.locator(config).await;

    let err = locator.locate("#slow", "slow element").await.unwrap_err();
    assert!(matches!(err, LocatorError::Timeout(_)), "{err}");
    assert_eq!(locator.metrics().locator.successful_requests, 0);
}

/// Adapter whose lookups never finish.
struct HangingAdapter;

#[async_trait]
impl WebAutomationAdapter for HangingAdapter {
    fn framework(&self) -> AutomationFramework {
        AutomationFramework::Selenium
    }

    async fn find_elements(&self, _selector: &str) -> AdapterResult<Vec<WebElement>> {
        std::future::pending().await
    }

    async fn find_elements_by(&self, _spec: &LocatorSpec) -> AdapterResult<Vec<WebElement>> {
        std::future::pending().await
    }

    async fn page_source(&self) -> AdapterResult<String> {
        Ok(String::new())
    }

    async fn take_screenshot(&self) -> AdapterResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn element_context(&self, _element: &WebElement) -> AdapterResult<ElementContext> {
        Ok(ElementContext::new())
    }
}

#[tokio::test(start_paused = true)]
async fn test_hanging_adapter_times_out() {
    let locator = AutoHealLocator::builder()
        .with_adapter(Arc::new(HangingAdapter))
        .with_ai_service(Arc::new(MockAiService::new()))
        .build()
        .await
        .unwrap();

    let err = locator.find_element("#x", "anything").await.unwrap_err();
    assert!(matches!(err, LocatorError::Timeout(_)));
}

#[tokio::test]
async fn test_reports_written_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    harness.adapter.add_mock_element("#ok", WebElement::new("ok", "div"));
    harness.ai.add_failure("missing thing");
    let config = AutoHealConfiguration::default()
        .with_reporting(ReportingConfig::enabled_in(dir.path()));
    let locator = harness.locator(config).await;

    locator.find_element("#ok", "ok thing").await.unwrap();
    let _ = locator.find_element("#missing", "missing thing").await;

    let reporter = locator.reporter().unwrap();
    let strategies: Vec<SelectorStrategy> =
        reporter.records().iter().map(|record| record.strategy).collect();
    assert_eq!(
        strategies,
        vec![SelectorStrategy::OriginalSelector, SelectorStrategy::Failed]
    );

    locator.shutdown().await;
    let written: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(written.len(), 3, "{written:?}");
    assert!(written.iter().all(|name| name.starts_with("AutoHeal_Report_")));
}

#[tokio::test]
async fn test_monitor_attached_to_locator() {
    let harness = Harness::new();
    harness.adapter.add_mock_element("#ok", WebElement::new("ok", "div"));
    let locator = Arc::new(harness.default_locator().await);

    locator.find_element("#ok", "ok").await.unwrap();
    let monitor = locator.start_monitoring(Duration::from_secs(60));
    assert!(monitor.is_running());
    assert!(monitor.collect());

    locator.shutdown().await;
    assert!(!monitor.is_running());
}
