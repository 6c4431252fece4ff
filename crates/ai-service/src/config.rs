//! AI provider and resilience configuration

use std::env;
use std::time::Duration;

use autoheal_core_types::AiProvider;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const PROVIDER_ENV: &str = "AUTOHEAL_AI_PROVIDER";
pub const MODEL_ENV: &str = "AUTOHEAL_AI_MODEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AiConfig {
    pub provider: AiProvider,
    /// Falls back to the provider's default model when unset.
    pub model: Option<String>,
    /// Falls back to the provider's default endpoint when unset.
    pub api_base: Option<String>,
    /// Tried in order; a 429 moves on to the next key.
    pub api_keys: Vec<String>,
    #[serde(with = "autoheal_core_types::duration")]
    #[schemars(with = "String")]
    pub timeout: Duration,
    pub max_retries: u32,
    #[serde(with = "autoheal_core_types::duration")]
    #[schemars(with = "String")]
    pub retry_delay: Duration,
    pub visual_analysis_enabled: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_dom_chars: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::Openai,
            model: None,
            api_base: None,
            api_keys: Vec::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            visual_analysis_enabled: false,
            temperature: 0.1,
            max_tokens: 1000,
            max_dom_chars: 50_000,
        }
    }
}

impl AiConfig {
    pub fn for_provider(provider: AiProvider) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.push(key.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_visual_analysis(mut self, enabled: bool) -> Self {
        self.visual_analysis_enabled = enabled;
        self
    }

    pub fn effective_model(&self) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
            .to_string()
    }

    pub fn effective_api_base(&self) -> String {
        self.api_base
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| self.provider.default_api_base())
            .trim_end_matches('/')
            .to_string()
    }

    /// Configured keys, or the comma-separated keys from the provider's
    /// environment variable when none are configured.
    pub fn resolved_api_keys(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .api_keys
            .iter()
            .filter_map(|key| sanitize_secret(key))
            .collect();
        if !configured.is_empty() {
            return configured;
        }
        self.provider
            .api_key_env()
            .and_then(|name| env::var(name).ok())
            .map(|raw| raw.split(',').filter_map(sanitize_secret).collect())
            .unwrap_or_default()
    }

    /// Apply `AUTOHEAL_AI_PROVIDER` and `AUTOHEAL_AI_MODEL`.
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        if let Ok(raw) = env::var(PROVIDER_ENV) {
            if !raw.trim().is_empty() {
                let provider: AiProvider = raw.parse()?;
                if provider != self.provider {
                    self.provider = provider;
                    // a model chosen for another provider would not resolve
                    self.model = None;
                    self.api_base = None;
                }
            }
        }
        if let Ok(model) = env::var(MODEL_ENV) {
            if !model.trim().is_empty() {
                self.model = Some(model.trim().to_string());
            }
        }
        Ok(())
    }
}

/// Drops empty and placeholder secrets such as `your-api-key`.
pub(crate) fn sanitize_secret(value: &str) -> Option<String> {
    let unquoted = value.trim().trim_matches(|c| c == '"' || c == '\'');
    if unquoted.is_empty() || !unquoted.chars().any(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let lowered = unquoted.to_ascii_lowercase();
    if matches!(
        lowered.as_str(),
        "your-api-key" | "replace-me" | "changeme" | "set-me" | "todo"
    ) {
        return None;
    }
    Some(unquoted.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ResilienceConfig {
    pub circuit_breaker_failure_threshold: u32,
    #[serde(with = "autoheal_core_types::duration")]
    #[schemars(with = "String")]
    pub circuit_breaker_timeout: Duration,
    /// Attempts for transient adapter failures during a lookup.
    pub retry_max_attempts: u32,
    #[serde(with = "autoheal_core_types::duration")]
    #[schemars(with = "String")]
    pub retry_delay: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(5 * 60),
            retry_max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_env_vars<F: FnOnce() -> T, T>(vars: &[(&str, Option<&str>)], f: F) -> T {
        let mut previous = Vec::new();
        for (key, value) in vars {
            previous.push((key.to_string(), env::var(key).ok()));
            match value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
        let result = f();
        for (key, value) in previous {
            match value {
                Some(val) => env::set_var(&key, val),
                None => env::remove_var(&key),
            }
        }
        result
    }

    #[test]
    fn test_defaults() {
        let config = AiConfig::default();
        assert_eq!(config.provider, AiProvider::Openai);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_dom_chars, 50_000);
        assert!(!config.visual_analysis_enabled);
        assert_eq!(config.effective_model(), "gpt-4o-mini");
        assert_eq!(config.effective_api_base(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_yaml_durations_are_humantime() {
        let config: AiConfig =
            serde_yaml::from_str("timeout: 5s\nretry_delay: 250ms\nprovider: anthropic_claude\n")
                .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.provider, AiProvider::AnthropicClaude);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let config = AiConfig::default().with_api_base("http://localhost:8080/v1/");
        assert_eq!(config.effective_api_base(), "http://localhost:8080/v1");
    }

    #[test]
    #[serial]
    fn test_keys_come_from_env_when_unset() {
        with_env_vars(&[("OPENAI_API_KEY", Some("sk-one, sk-two ,your-api-key"))], || {
            let config = AiConfig::default();
            assert_eq!(config.resolved_api_keys(), vec!["sk-one", "sk-two"]);
        });
    }

    #[test]
    #[serial]
    fn test_configured_keys_win_over_env() {
        with_env_vars(&[("OPENAI_API_KEY", Some("sk-env"))], || {
            let config = AiConfig::default().with_api_key("sk-config");
            assert_eq!(config.resolved_api_keys(), vec!["sk-config"]);
        });
    }

    #[test]
    #[serial]
    fn test_env_overrides_provider_and_model() {
        with_env_vars(
            &[(PROVIDER_ENV, Some("gemini")), (MODEL_ENV, Some("gemini-1.5-pro"))],
            || {
                let mut config = AiConfig::default();
                config.model = Some("gpt-4o".into());
                config.apply_env_overrides().unwrap();
                assert_eq!(config.provider, AiProvider::GoogleGemini);
                assert_eq!(config.effective_model(), "gemini-1.5-pro");
            },
        );
    }

    #[test]
    #[serial]
    fn test_unknown_provider_env_is_rejected() {
        with_env_vars(&[(PROVIDER_ENV, Some("watson")), (MODEL_ENV, None)], || {
            let mut config = AiConfig::default();
            assert!(config.apply_env_overrides().is_err());
        });
    }

    #[test]
    fn test_sanitize_secret() {
        assert!(sanitize_secret("  ").is_none());
        assert!(sanitize_secret("\"changeme\"").is_none());
        assert!(sanitize_secret("…").is_none());
        assert_eq!(sanitize_secret(" 'sk-1' "), Some("sk-1".to_string()));
    }
}
