use async_trait::async_trait;
use autoheal_core_types::{AiProvider, TokenUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::errors::AiError;
use crate::provider::{error_body, http_client, require_api_keys, ChatProvider, Completion, CompletionRequest};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API client. Text only.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = require_api_keys(config)?
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Config("missing API key for anthropic_claude".to_string()))?;
        Ok(Self {
            client: http_client(config)?,
            api_key,
            model: config.effective_model(),
            api_base: config.effective_api_base(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    fn provider(&self) -> AiProvider {
        AiProvider::AnthropicClaude
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, AiError> {
        if request.image_png.is_some() {
            return Err(AiError::Unavailable(
                "anthropic_claude does not support visual analysis".to_string(),
            ));
        }

        let body = ClaudeRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system: request.system.to_string(),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: vec![ClaudeContent {
                    r#type: "text".to_string(),
                    text: request.user.clone(),
                }],
            }],
        };

        let url = format!("{}/messages", self.api_base);
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| AiError::Request(format!("claude request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = error_body(response).await;
            if status == 429 {
                return Err(AiError::RateLimited(format!("claude rate limit exceeded: {text}")));
            }
            return Err(AiError::Http {
                provider: "anthropic_claude".to_string(),
                status,
                body: text,
            });
        }

        let response: ClaudeResponse = response
            .json()
            .await
            .map_err(|err| AiError::InvalidResponse(format!("claude response invalid: {err}")))?;

        let text = response
            .content
            .iter()
            .filter_map(|part| part.text.as_ref())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(AiError::InvalidResponse(
                "claude response missing content".to_string(),
            ));
        }

        Ok(Completion {
            text,
            usage: response
                .usage
                .map(|usage| TokenUsage::new(usage.input_tokens, usage.output_tokens)),
        })
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    system: String,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Serialize)]
struct ClaudeContent {
    r#type: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeResponseContent>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponseContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}
