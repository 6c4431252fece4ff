use async_trait::async_trait;
use autoheal_core_types::{AiProvider, TokenUsage};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::errors::AiError;
use crate::provider::{error_body, http_client, require_api_keys, ChatProvider, Completion, CompletionRequest};

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = require_api_keys(config)?
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Config("missing API key for google_gemini".to_string()))?;
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
impl ChatProvider for GeminiClient {
    fn provider(&self) -> AiProvider {
        AiProvider::GoogleGemini
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, AiError> {
        let mut parts = vec![GeminiPart::Text {
            text: request.user.clone(),
        }];
        if let Some(png) = request.image_png {
            parts.push(GeminiPart::InlineData {
                inline_data: InlineData {
                    mime_type: "image/png".to_string(),
                    data: BASE64.encode(png),
                },
            });
        }

        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: request.system.to_string(),
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
                response_mime_type: "application/json".to_string(),
            },
        };

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| AiError::Request(format!("gemini request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = error_body(response).await;
            if status == 429 {
                return Err(AiError::RateLimited(format!("gemini rate limit exceeded: {text}")));
            }
            return Err(AiError::Http {
                provider: "google_gemini".to_string(),
                status,
                body: text,
            });
        }

        let response: serde_json::Value = response
            .json()
            .await
            .map_err(|err| AiError::InvalidResponse(format!("gemini response invalid: {err}")))?;

        let text = response
            .get("candidates")
            .and_then(|candidates| candidates.get(0))
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.get(0))
            .and_then(|part| part.get("text"))
            .and_then(|text| text.as_str())
            .ok_or_else(|| AiError::InvalidResponse("gemini response missing content".to_string()))?;

        // usageMetadata is not always present
        let usage = response.get("usageMetadata").map(|meta| {
            let count = |key: &str| meta.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
            TokenUsage::new(count("promptTokenCount"), count("candidatesTokenCount"))
        });

        Ok(Completion {
            text: text.to_string(),
            usage,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: String,
}
