//! Results returned by AI element analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::element::ElementContext;
use crate::playwright::PlaywrightLocator;
use crate::strategy::AutomationFramework;

/// One alternative selector proposed alongside the primary recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementCandidate {
    pub selector: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub context: Option<ElementContext>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ElementCandidate {
    pub fn new(selector: impl Into<String>, confidence: f64, description: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            confidence,
            description: description.into(),
            context: None,
            properties: BTreeMap::new(),
        }
    }
}

/// Token counts reported by a provider for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysisResult {
    pub recommended_selector: String,
    #[serde(default)]
    pub playwright_locator: Option<PlaywrightLocator>,
    #[serde(default)]
    pub target_framework: AutomationFramework,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub alternatives: Vec<ElementCandidate>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
}

impl AiAnalysisResult {
    pub fn builder(selector: impl Into<String>) -> AiAnalysisResultBuilder {
        AiAnalysisResultBuilder {
            inner: AiAnalysisResult {
                recommended_selector: selector.into(),
                playwright_locator: None,
                target_framework: AutomationFramework::Selenium,
                confidence: 0.0,
                reasoning: String::new(),
                alternatives: Vec::new(),
                metadata: BTreeMap::new(),
                token_usage: None,
            },
        }
    }

    /// Alternatives ordered by confidence, highest first.
    pub fn alternatives_by_confidence(&self) -> Vec<&ElementCandidate> {
        let mut sorted: Vec<&ElementCandidate> = self.alternatives.iter().collect();
        sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        sorted
    }

    /// Selector the adapter should run: the Playwright rendering when the
    /// result targets Playwright, else the recommended selector.
    pub fn effective_selector(&self) -> String {
        match (&self.target_framework, &self.playwright_locator) {
            (AutomationFramework::Playwright, Some(locator)) => locator.to_js_string(),
            _ => self.recommended_selector.clone(),
        }
    }
}

pub struct AiAnalysisResultBuilder {
    inner: AiAnalysisResult,
}

impl AiAnalysisResultBuilder {
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.inner.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.inner.reasoning = reasoning.into();
        self
    }

    pub fn alternatives(mut self, alternatives: Vec<ElementCandidate>) -> Self {
        self.inner.alternatives = alternatives;
        self
    }

    pub fn playwright_locator(mut self, locator: PlaywrightLocator) -> Self {
        self.inner.playwright_locator = Some(locator);
        self.inner.target_framework = AutomationFramework::Playwright;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.metadata.insert(key.into(), value.into());
        self
    }

    pub fn token_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.inner.token_usage = usage;
        self
    }

    pub fn build(self) -> AiAnalysisResult {
        self.inner
    }
}
