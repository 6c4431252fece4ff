//! Request and result types for element location

use std::time::Duration;

use autoheal_core_types::{
    detect_locator_type, ElementContext, LocatorStrategy, LocatorType, WebElement,
};
use autoheal_selector_cache::contextual_key;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-call switches for a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LocatorOptions {
    /// Time budget for the healing stage
    #[serde(with = "autoheal_core_types::duration")]
    #[schemars(with = "String")]
    pub timeout: Duration,
    pub enable_visual_analysis: bool,
    pub enable_caching: bool,
    /// Healed results below this are returned but logged as low confidence
    pub confidence_threshold: f64,
    pub max_candidates: usize,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            enable_visual_analysis: true,
            enable_caching: true,
            confidence_threshold: 0.7,
            max_candidates: 5,
        }
    }
}

impl LocatorOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_visual_analysis(mut self, enabled: bool) -> Self {
        self.enable_visual_analysis = enabled;
        self
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.enable_caching = enabled;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }
}

/// One lookup: the caller's selector, what the element is, and how to look.
#[derive(Debug, Clone)]
pub struct LocatorRequest {
    pub original_selector: String,
    pub description: String,
    pub options: LocatorOptions,
    pub context: Option<ElementContext>,
    pub locator_type: LocatorType,
}

impl LocatorRequest {
    pub fn new(selector: impl Into<String>, description: impl Into<String>) -> Self {
        let original_selector = selector.into();
        let locator_type = detect_locator_type(&original_selector);
        Self {
            original_selector,
            description: description.into(),
            options: LocatorOptions::default(),
            context: None,
            locator_type,
        }
    }

    pub fn with_options(mut self, options: LocatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_context(mut self, context: ElementContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Healing cache key for this logical element.
    pub fn cache_key(&self) -> String {
        contextual_key(
            &self.original_selector,
            &self.description,
            self.context.as_ref(),
        )
    }
}

/// A located element and how it was found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorResult {
    pub element: WebElement,
    pub actual_selector: String,
    pub strategy: LocatorStrategy,
    #[serde(with = "autoheal_core_types::duration")]
    pub execution_time: Duration,
    pub from_cache: bool,
    pub confidence: f64,
    pub reasoning: String,
    /// Inner strategy behind a hybrid result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healed_by: Option<LocatorStrategy>,
    /// Tokens the AI provider reported for this lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
}

impl LocatorResult {
    pub fn new(
        element: WebElement,
        actual_selector: impl Into<String>,
        strategy: LocatorStrategy,
    ) -> Self {
        Self {
            element,
            actual_selector: actual_selector.into(),
            strategy,
            execution_time: Duration::ZERO,
            from_cache: false,
            confidence: 0.0,
            reasoning: String::new(),
            healed_by: None,
            tokens_used: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = elapsed;
        self
    }

    pub fn with_tokens(mut self, tokens: Option<u64>) -> Self {
        self.tokens_used = tokens;
        self
    }

    pub fn from_cache(mut self) -> Self {
        self.from_cache = true;
        self
    }

    /// The strategy that actually found the element.
    pub fn effective_strategy(&self) -> LocatorStrategy {
        self.healed_by.unwrap_or(self.strategy)
    }

    pub fn was_healed(&self) -> bool {
        !matches!(
            self.effective_strategy(),
            LocatorStrategy::OriginalSelector | LocatorStrategy::Cached
        )
    }
}
