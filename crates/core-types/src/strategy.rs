//! Strategy, framework and provider enumerations.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How an element was ultimately resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// The caller's selector matched as-is
    OriginalSelector,
    /// A previously healed selector from the cache matched
    Cached,
    /// AI analysis of the page source
    DomAnalysis,
    /// AI analysis of a screenshot
    VisualAnalysis,
    /// Produced by the resolution orchestrator
    Hybrid,
}

impl LocatorStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::OriginalSelector => "original_selector",
            LocatorStrategy::Cached => "cached",
            LocatorStrategy::DomAnalysis => "dom_analysis",
            LocatorStrategy::VisualAnalysis => "visual_analysis",
            LocatorStrategy::Hybrid => "hybrid",
        }
    }

    /// True for strategies that cost an AI call.
    pub fn is_ai_backed(&self) -> bool {
        matches!(
            self,
            LocatorStrategy::DomAnalysis | LocatorStrategy::VisualAnalysis
        )
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Order in which the orchestrator runs the registered locators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    Sequential,
    Parallel,
    #[default]
    SmartSequential,
    DomOnly,
    VisualFirst,
}

impl ExecutionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionStrategy::Sequential => "SEQUENTIAL",
            ExecutionStrategy::Parallel => "PARALLEL",
            ExecutionStrategy::SmartSequential => "SMART_SEQUENTIAL",
            ExecutionStrategy::DomOnly => "DOM_ONLY",
            ExecutionStrategy::VisualFirst => "VISUAL_FIRST",
        }
    }

    pub fn all() -> [ExecutionStrategy; 5] {
        [
            ExecutionStrategy::Sequential,
            ExecutionStrategy::Parallel,
            ExecutionStrategy::SmartSequential,
            ExecutionStrategy::DomOnly,
            ExecutionStrategy::VisualFirst,
        ]
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        ExecutionStrategy::all()
            .into_iter()
            .find(|strategy| strategy.name().to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("unknown execution strategy '{value}'"))
    }
}

/// Automation framework the adapter drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationFramework {
    #[default]
    Selenium,
    Playwright,
}

impl fmt::Display for AutomationFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutomationFramework::Selenium => f.write_str("Selenium"),
            AutomationFramework::Playwright => f.write_str("Playwright"),
        }
    }
}

/// Supported AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    #[default]
    #[serde(alias = "open_ai")]
    Openai,
    #[serde(alias = "gemini")]
    GoogleGemini,
    #[serde(alias = "anthropic", alias = "claude")]
    AnthropicClaude,
    Deepseek,
    Grok,
    #[serde(alias = "local", alias = "ollama")]
    LocalModel,
    Mock,
}

impl AiProvider {
    pub fn all() -> [AiProvider; 7] {
        [
            AiProvider::Openai,
            AiProvider::GoogleGemini,
            AiProvider::AnthropicClaude,
            AiProvider::Deepseek,
            AiProvider::Grok,
            AiProvider::LocalModel,
            AiProvider::Mock,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            AiProvider::Openai => "openai",
            AiProvider::GoogleGemini => "google_gemini",
            AiProvider::AnthropicClaude => "anthropic_claude",
            AiProvider::Deepseek => "deepseek",
            AiProvider::Grok => "grok",
            AiProvider::LocalModel => "local_model",
            AiProvider::Mock => "mock",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::Openai => "gpt-4o-mini",
            AiProvider::GoogleGemini => "gemini-2.0-flash",
            AiProvider::AnthropicClaude => "claude-3-sonnet",
            AiProvider::Deepseek => "deepseek-chat",
            AiProvider::Grok => "grok-beta",
            AiProvider::LocalModel => "local-model",
            AiProvider::Mock => "mock-model",
        }
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            AiProvider::Openai => "https://api.openai.com/v1",
            AiProvider::GoogleGemini => "https://generativelanguage.googleapis.com/v1beta",
            AiProvider::AnthropicClaude => "https://api.anthropic.com/v1",
            AiProvider::Deepseek => "https://api.deepseek.com/v1",
            AiProvider::Grok => "https://api.x.ai/v1",
            AiProvider::LocalModel => "http://localhost:11434/v1",
            AiProvider::Mock => "mock://local",
        }
    }

    /// Environment variable holding the API key(s), if the provider needs one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            AiProvider::Openai => Some("OPENAI_API_KEY"),
            AiProvider::GoogleGemini => Some("GEMINI_API_KEY"),
            AiProvider::AnthropicClaude => Some("ANTHROPIC_API_KEY"),
            AiProvider::Deepseek => Some("DEEPSEEK_API_KEY"),
            AiProvider::Grok => Some("GROK_API_KEY"),
            AiProvider::LocalModel | AiProvider::Mock => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key_env().is_some()
    }

    pub fn supports_text(&self) -> bool {
        true
    }

    pub fn supports_visual(&self) -> bool {
        matches!(
            self,
            AiProvider::Openai | AiProvider::GoogleGemini | AiProvider::Mock
        )
    }

    /// Providers that speak the OpenAI chat-completions dialect.
    pub fn is_openai_compatible(&self) -> bool {
        matches!(
            self,
            AiProvider::Openai | AiProvider::Deepseek | AiProvider::Grok | AiProvider::LocalModel
        )
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AiProvider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "openai" | "open_ai" => Ok(AiProvider::Openai),
            "google_gemini" | "gemini" | "google" => Ok(AiProvider::GoogleGemini),
            "anthropic_claude" | "anthropic" | "claude" => Ok(AiProvider::AnthropicClaude),
            "deepseek" => Ok(AiProvider::Deepseek),
            "grok" | "xai" => Ok(AiProvider::Grok),
            "local_model" | "local" | "ollama" => Ok(AiProvider::LocalModel),
            "mock" => Ok(AiProvider::Mock),
            other => Err(format!("unknown AI provider '{other}'")),
        }
    }
}
