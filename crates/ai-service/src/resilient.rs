//! Provider-backed AI service with retries, timeouts and a circuit breaker

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autoheal_core_types::{AiAnalysisResult, AiProvider, WebElement};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::circuit::CircuitBreaker;
use crate::config::{AiConfig, ResilienceConfig};
use crate::errors::AiError;
use crate::metrics::{
    AiServiceMetrics, AiServiceMetricsSnapshot, CostMetrics, CostMetricsSnapshot, RequestKind,
};
use crate::prompt::{parse_analysis, parse_index, PromptBuilder};
use crate::provider::{build_provider, ChatProvider, Completion, CompletionRequest};
use crate::selection::heuristic_pick;
use crate::AiService;

pub struct ResilientAiService {
    provider: Arc<dyn ChatProvider>,
    prompts: PromptBuilder,
    model: String,
    call_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    visual_enabled: bool,
    breaker: CircuitBreaker,
    metrics: AiServiceMetrics,
    cost: CostMetrics,
}

impl ResilientAiService {
    pub fn from_config(config: &AiConfig, resilience: &ResilienceConfig) -> Result<Self, AiError> {
        let provider = build_provider(config)?;
        info!(
            provider = %config.provider,
            model = %config.effective_model(),
            visual = config.visual_analysis_enabled,
            "AI service initialised"
        );
        Ok(Self::with_provider(provider, config, resilience))
    }

    /// Wrap an already built provider client.
    pub fn with_provider(
        provider: Arc<dyn ChatProvider>,
        config: &AiConfig,
        resilience: &ResilienceConfig,
    ) -> Self {
        Self {
            provider,
            prompts: PromptBuilder::new(config.max_dom_chars),
            model: config.effective_model(),
            call_timeout: config.timeout,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            visual_enabled: config.visual_analysis_enabled,
            breaker: CircuitBreaker::new(
                resilience.circuit_breaker_failure_threshold,
                resilience.circuit_breaker_timeout,
            ),
            metrics: AiServiceMetrics::new(),
            cost: CostMetrics::new(),
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run one logical call: breaker check, then up to `max_retries` retries
    /// of retryable failures, each attempt bounded by the call timeout.
    async fn execute<T, F>(&self, request: &CompletionRequest<'_>, parse: F) -> Result<T, AiError>
    where
        F: Fn(Completion) -> Result<T, AiError> + Send + Sync,
        T: Send,
    {
        if !self.breaker.can_execute() {
            let retry_after = self.breaker.retry_after();
            debug!(?retry_after, "AI call rejected by open circuit breaker");
            return Err(AiError::CircuitOpen { retry_after });
        }

        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = match timeout(self.call_timeout, self.provider.complete(request)).await {
                Ok(result) => result.and_then(&parse),
                Err(_) => Err(AiError::Timeout(self.call_timeout)),
            };

            match outcome {
                Ok(value) => {
                    self.breaker.record_success();
                    self.metrics.record_request(true, started.elapsed());
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    debug!(
                        provider = %self.provider.provider(),
                        attempt,
                        error = %err,
                        "AI call failed; retrying"
                    );
                    sleep(self.retry_delay).await;
                }
                Err(err) => {
                    if self.breaker.record_failure() {
                        self.metrics.record_circuit_breaker_open();
                    }
                    self.metrics.record_request(false, started.elapsed());
                    warn!(
                        provider = %self.provider.provider(),
                        attempts = attempt,
                        error = %err,
                        "AI call failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    fn record_cost(&self, kind: RequestKind, result: &AiAnalysisResult) {
        match result.token_usage {
            Some(usage) => {
                self.cost
                    .record_request_with_tokens(kind, usage.input_tokens, usage.output_tokens)
            }
            None => self.cost.record_request(kind),
        }
    }

    fn annotate(&self, mut result: AiAnalysisResult, kind: RequestKind) -> AiAnalysisResult {
        result
            .metadata
            .insert("provider".to_string(), self.provider.provider().to_string());
        result.metadata.insert("model".to_string(), self.model.clone());
        result
            .metadata
            .insert("analysis".to_string(), kind.as_str().to_string());
        result
    }
}

#[async_trait]
impl AiService for ResilientAiService {
    async fn analyze_dom(
        &self,
        html: &str,
        description: &str,
        previous_selector: Option<&str>,
    ) -> Result<AiAnalysisResult, AiError> {
        let request = CompletionRequest::text(
            self.prompts.system_prompt(),
            self.prompts.dom_prompt(html, description, previous_selector),
        );
        let result = self
            .execute(&request, |completion| parse_analysis(&completion.text, completion.usage))
            .await?;
        self.record_cost(RequestKind::Dom, &result);
        debug!(description, selector = %result.recommended_selector, confidence = result.confidence, "DOM analysis complete");
        Ok(self.annotate(result, RequestKind::Dom))
    }

    async fn analyze_visual(&self, screenshot: &[u8], description: &str) -> Result<AiAnalysisResult, AiError> {
        if !self.visual_enabled {
            return Err(AiError::Unavailable("visual analysis is disabled".to_string()));
        }
        let provider = self.provider.provider();
        if !provider.supports_visual() {
            return Err(AiError::Unavailable(format!(
                "{provider} does not support visual analysis"
            )));
        }
        if screenshot.is_empty() {
            return Err(AiError::Unavailable("screenshot is empty".to_string()));
        }

        let request = CompletionRequest::text(
            self.prompts.system_prompt(),
            self.prompts.visual_prompt(description),
        )
        .with_image(screenshot);
        let result = self
            .execute(&request, |completion| parse_analysis(&completion.text, completion.usage))
            .await?;
        self.record_cost(RequestKind::Visual, &result);
        debug!(description, selector = %result.recommended_selector, confidence = result.confidence, "Visual analysis complete");
        Ok(self.annotate(result, RequestKind::Visual))
    }

    async fn select_best_matching_element(
        &self,
        elements: &[WebElement],
        description: &str,
    ) -> Result<WebElement, AiError> {
        match elements {
            [] => return Err(AiError::NoElements),
            [only] => return Ok(only.clone()),
            _ => {}
        }

        let request = CompletionRequest::text(
            self.prompts.system_prompt(),
            self.prompts.disambiguation_prompt(elements, description),
        );
        let len = elements.len();
        let chosen = self
            .execute(&request, |completion| {
                parse_index(&completion.text, len).ok_or_else(|| {
                    AiError::InvalidResponse("disambiguation reply has no valid index".to_string())
                })
            })
            .await;

        match chosen {
            Ok(index) => Ok(elements[index].clone()),
            Err(err) => {
                debug!(error = %err, "AI disambiguation failed; using heuristic pick");
                heuristic_pick(elements, description)
                    .cloned()
                    .ok_or(AiError::NoElements)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        !self.breaker.is_open()
    }

    fn metrics(&self) -> AiServiceMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn cost_metrics(&self) -> Option<CostMetricsSnapshot> {
        Some(self.cost.snapshot())
    }

    fn provider(&self) -> AiProvider {
        self.provider.provider()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoheal_core_types::TokenUsage;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays scripted outcomes and counts calls.
    struct ScriptedProvider {
        provider: AiProvider,
        script: Mutex<VecDeque<Result<Completion, AiError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(provider: AiProvider, script: Vec<Result<Completion, AiError>>) -> Arc<Self> {
            Arc::new(Self {
                provider,
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn provider(&self) -> AiProvider {
            self.provider
        }

        async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<Completion, AiError> {
            *self.calls.lock() += 1;
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(AiError::Request("script exhausted".into())))
        }
    }

    fn ok(text: &str) -> Result<Completion, AiError> {
        Ok(Completion {
            text: text.to_string(),
            usage: None,
        })
    }

    fn config() -> AiConfig {
        AiConfig {
            retry_delay: Duration::from_millis(10),
            max_retries: 2,
            visual_analysis_enabled: true,
            ..AiConfig::default()
        }
    }

    fn service(provider: Arc<ScriptedProvider>, config: &AiConfig, threshold: u32) -> ResilientAiService {
        let resilience = ResilienceConfig {
            circuit_breaker_failure_threshold: threshold,
            ..ResilienceConfig::default()
        };
        ResilientAiService::with_provider(provider, config, &resilience)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors() {
        let provider = ScriptedProvider::new(
            AiProvider::Openai,
            vec![
                Err(AiError::Request("connection reset".into())),
                ok("{\"selector\": \"#login\", \"confidence\": 0.9}"),
            ],
        );
        let ai = service(provider.clone(), &config(), 5);

        let result = ai.analyze_dom("<html/>", "login", None).await.unwrap();
        assert_eq!(result.recommended_selector, "#login");
        assert_eq!(result.metadata.get("provider").map(String::as_str), Some("openai"));
        assert_eq!(provider.calls(), 2);

        let metrics = ai.metrics();
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.successful_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let provider = ScriptedProvider::new(
            AiProvider::Openai,
            vec![Err(AiError::Http {
                provider: "openai".into(),
                status: 401,
                body: "bad key".into(),
            })],
        );
        let ai = service(provider.clone(), &config(), 5);

        assert!(ai.analyze_dom("", "login", None).await.is_err());
        assert_eq!(provider.calls(), 1);
        assert_eq!(ai.metrics().failed_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let provider = ScriptedProvider::new(AiProvider::Openai, Vec::new());
        let ai = service(provider.clone(), &config(), 5);

        assert!(matches!(
            ai.analyze_dom("", "login", None).await,
            Err(AiError::Request(_))
        ));
        // first attempt plus max_retries
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_fails_fast() {
        let provider = ScriptedProvider::new(
            AiProvider::Openai,
            vec![ok("no json"), ok("still no json")],
        );
        let ai = service(provider.clone(), &config(), 2);

        assert!(ai.analyze_dom("", "a", None).await.is_err());
        assert!(ai.is_healthy());
        assert!(ai.analyze_dom("", "a", None).await.is_err());
        assert!(!ai.is_healthy());
        assert_eq!(ai.metrics().circuit_breaker_opens, 1);

        let err = ai.analyze_dom("", "a", None).await.unwrap_err();
        match err {
            AiError::CircuitOpen { retry_after } => assert!(retry_after > Duration::ZERO),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        struct SlowProvider;

        #[async_trait]
        impl ChatProvider for SlowProvider {
            fn provider(&self) -> AiProvider {
                AiProvider::Openai
            }

            async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<Completion, AiError> {
                sleep(Duration::from_secs(60)).await;
                Ok(Completion {
                    text: "{}".into(),
                    usage: None,
                })
            }
        }

        let config = AiConfig {
            timeout: Duration::from_secs(1),
            max_retries: 0,
            ..AiConfig::default()
        };
        let ai = ResilientAiService::with_provider(Arc::new(SlowProvider), &config, &ResilienceConfig::default());
        assert!(matches!(
            ai.analyze_dom("", "a", None).await,
            Err(AiError::Timeout(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cost_uses_tokens_when_reported() {
        let provider = ScriptedProvider::new(
            AiProvider::Openai,
            vec![
                Ok(Completion {
                    text: "{\"selector\": \"#a\"}".into(),
                    usage: Some(TokenUsage::new(1000, 100)),
                }),
                ok("{\"selector\": \"#b\"}"),
            ],
        );
        let ai = service(provider, &config(), 5);

        ai.analyze_dom("", "a", None).await.unwrap();
        ai.analyze_visual(&[1, 2, 3], "b").await.unwrap();

        let cost = ai.cost_metrics().unwrap();
        assert_eq!(cost.dom_tokens_used, 1100);
        assert!((cost.visual_cost - 0.10).abs() < 1e-9);
        assert_eq!(cost.total_requests, 2);
    }

    #[tokio::test]
    async fn test_visual_requires_enabled_and_capable_provider() {
        let disabled = service(
            ScriptedProvider::new(AiProvider::Openai, Vec::new()),
            &AiConfig::default(),
            5,
        );
        assert!(matches!(
            disabled.analyze_visual(&[1], "x").await,
            Err(AiError::Unavailable(_))
        ));

        let text_only = service(
            ScriptedProvider::new(AiProvider::AnthropicClaude, Vec::new()),
            &config(),
            5,
        );
        let err = text_only.analyze_visual(&[1], "x").await.unwrap_err();
        assert!(err.to_string().contains("does not support visual analysis"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disambiguation_uses_model_index() {
        let provider = ScriptedProvider::new(AiProvider::Openai, vec![ok("{\"index\": 2}")]);
        let ai = service(provider, &config(), 5);
        let elements = vec![
            WebElement::new("1", "button").with_text("Save"),
            WebElement::new("2", "button").with_text("Save draft"),
        ];
        let picked = ai.select_best_matching_element(&elements, "save").await.unwrap();
        assert_eq!(picked.handle, "2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disambiguation_falls_back_to_heuristic() {
        let provider = ScriptedProvider::new(AiProvider::Openai, vec![ok("{\"index\": 9}")]);
        let ai = service(provider, &config(), 5);
        let elements = vec![
            WebElement::new("1", "a").with_text("Home"),
            WebElement::new("2", "a").with_text("Checkout"),
        ];
        let picked = ai.select_best_matching_element(&elements, "checkout").await.unwrap();
        assert_eq!(picked.handle, "2");
    }
}
