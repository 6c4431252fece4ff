use async_trait::async_trait;
use autoheal_core_types::{AiProvider, TokenUsage};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::errors::AiError;
use crate::provider::{error_body, http_client, require_api_keys, ChatProvider, Completion, CompletionRequest};

/// Chat-completions client for OpenAI and the APIs that mirror it
/// (DeepSeek, Grok, Ollama, LM Studio).
pub struct OpenAiCompatibleClient {
    client: Client,
    provider: AiProvider,
    api_keys: Vec<String>,
    model: String,
    api_base: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        Ok(Self {
            client: http_client(config)?,
            provider: config.provider,
            api_keys: require_api_keys(config)?,
            model: config.effective_model(),
            api_base: config.effective_api_base(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_body(&self, request: &CompletionRequest<'_>) -> ChatCompletionRequest {
        let user_content = match request.image_png {
            Some(png) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: request.user.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/png;base64,{}", BASE64.encode(png)),
                    },
                },
            ]),
            None => MessageContent::Text(request.user.clone()),
        };
        ChatCompletionRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                r#type: "json_object".to_string(),
            },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: MessageContent::Text(request.system.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_content,
                },
            ],
        }
    }

    async fn send(&self, body: &ChatCompletionRequest, key: Option<&str>) -> Result<reqwest::Response, AiError> {
        let url = format!("{}/chat/completions", self.api_base);
        let mut builder = self.client.post(&url).json(body);
        if let Some(key) = key {
            builder = builder.bearer_auth(key);
        }
        builder
            .send()
            .await
            .map_err(|err| AiError::Request(format!("{} request failed: {err}", self.provider)))
    }

    async fn read_completion(&self, response: reqwest::Response) -> Result<Completion, AiError> {
        let response: ChatCompletionResponse = response.json().await.map_err(|err| {
            AiError::InvalidResponse(format!("{} response invalid: {err}", self.provider))
        })?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .and_then(ChatCompletionContent::as_text)
            .ok_or_else(|| {
                AiError::InvalidResponse(format!("{} response missing content", self.provider))
            })?;

        Ok(Completion {
            text,
            usage: response
                .usage
                .map(|usage| TokenUsage::new(usage.prompt_tokens, usage.completion_tokens)),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleClient {
    fn provider(&self) -> AiProvider {
        self.provider
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, AiError> {
        let body = self.build_body(request);

        // Local servers run without a key.
        if self.api_keys.is_empty() {
            let response = self.send(&body, None).await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                return Err(AiError::Http {
                    provider: self.provider.to_string(),
                    status,
                    body: error_body(response).await,
                });
            }
            return self.read_completion(response).await;
        }

        let mut last_error: Option<AiError> = None;
        for (index, key) in self.api_keys.iter().enumerate() {
            let response = match self.send(&body, Some(key)).await {
                Ok(resp) => resp,
                Err(err) => {
                    debug!(provider = %self.provider, attempt = index + 1, error = %err, "chat completion transport error");
                    last_error = Some(err);
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let text = error_body(response).await;
                if status == 429 {
                    let friendly = rate_limit_message(self.provider, &text);
                    if index + 1 < self.api_keys.len() {
                        warn!(
                            provider = %self.provider,
                            message = %friendly,
                            attempt = index + 1,
                            remaining = self.api_keys.len() - index - 1,
                            "Rate limited; switching API key"
                        );
                        last_error = Some(AiError::RateLimited(friendly));
                        continue;
                    }
                    return Err(AiError::RateLimited(friendly));
                }
                return Err(AiError::Http {
                    provider: self.provider.to_string(),
                    status,
                    body: text,
                });
            }

            return self.read_completion(response).await;
        }

        Err(last_error.unwrap_or_else(|| {
            AiError::Request(format!("{} request exhausted all API keys", self.provider))
        }))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<ChatCompletionContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        let text = match self {
            ChatCompletionContent::Text(value) => value.clone(),
            ChatCompletionContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.text.as_ref())
                .cloned()
                .collect::<Vec<_>>()
                .join("\n"),
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: Option<String>,
}

fn rate_limit_message(provider: AiProvider, raw: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(raw) {
        if let Some(message) = envelope.error.message {
            return format!(
                "{provider} rate limit exceeded: {}. Please retry later or configure a higher tier.",
                message.trim()
            );
        }
    }
    format!("{provider} rate limit exceeded; please retry later or reduce usage.")
}
