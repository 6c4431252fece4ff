//! Raw chat-completion access to a single AI backend.

use std::sync::Arc;

use async_trait::async_trait;
use autoheal_core_types::{AiProvider, TokenUsage};

use crate::anthropic::AnthropicClient;
use crate::config::AiConfig;
use crate::errors::AiError;
use crate::gemini::GeminiClient;
use crate::openai::OpenAiCompatibleClient;

/// One prompt round trip. `image_png` is attached for visual analysis.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub user: String,
    pub image_png: Option<&'a [u8]>,
}

impl<'a> CompletionRequest<'a> {
    pub fn text(system: &'a str, user: String) -> Self {
        Self {
            system,
            user,
            image_png: None,
        }
    }

    pub fn with_image(mut self, png: &'a [u8]) -> Self {
        self.image_png = Some(png);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn provider(&self) -> AiProvider;

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, AiError>;
}

/// Build the HTTP client for `config.provider`.
pub fn build_provider(config: &AiConfig) -> Result<Arc<dyn ChatProvider>, AiError> {
    match config.provider {
        AiProvider::Openai | AiProvider::Deepseek | AiProvider::Grok | AiProvider::LocalModel => {
            Ok(Arc::new(OpenAiCompatibleClient::new(config)?))
        }
        AiProvider::AnthropicClaude => Ok(Arc::new(AnthropicClient::new(config)?)),
        AiProvider::GoogleGemini => Ok(Arc::new(GeminiClient::new(config)?)),
        AiProvider::Mock => Err(AiError::Config(
            "the mock provider has no HTTP client; use MockAiService".to_string(),
        )),
    }
}

pub(crate) fn http_client(config: &AiConfig) -> Result<reqwest::Client, AiError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|err| AiError::Config(format!("failed to build HTTP client: {err}")))
}

/// Required keys, or a configuration error naming the env var to set.
pub(crate) fn require_api_keys(config: &AiConfig) -> Result<Vec<String>, AiError> {
    let keys = config.resolved_api_keys();
    if keys.is_empty() && config.provider.requires_api_key() {
        return Err(AiError::Config(format!(
            "missing API key for {} (set {})",
            config.provider,
            config.provider.api_key_env().unwrap_or("api_keys")
        )));
    }
    Ok(keys)
}

pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<response unavailable>".to_string())
}
