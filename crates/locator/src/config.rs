//! Top-level configuration and its validator.

use std::path::PathBuf;
use std::time::Duration;

use autoheal_ai_service::{AiConfig, ResilienceConfig};
use autoheal_core_types::ExecutionStrategy;
use autoheal_selector_cache::CacheConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AutoHealConfiguration {
    pub cache: CacheConfig,
    pub ai: AiConfig,
    pub performance: PerformanceConfig,
    pub resilience: ResilienceConfig,
    pub reporting: ReportingConfig,
}

impl AutoHealConfiguration {
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_ai(mut self, ai: AiConfig) -> Self {
        self.ai = ai;
        self
    }

    pub fn with_performance(mut self, performance: PerformanceConfig) -> Self {
        self.performance = performance;
        self
    }

    pub fn with_resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = resilience;
        self
    }

    pub fn with_reporting(mut self, reporting: ReportingConfig) -> Self {
        self.reporting = reporting;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Runtime worker threads used by the CLI
    pub thread_pool_size: usize,
    /// Budget for one whole lookup, healing included
    #[serde(with = "autoheal_core_types::duration")]
    #[schemars(with = "String")]
    pub element_timeout: Duration,
    pub enable_metrics: bool,
    pub max_concurrent_requests: usize,
    pub execution_strategy: ExecutionStrategy,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            thread_pool_size: cores * 2,
            element_timeout: Duration::from_secs(10),
            enable_metrics: true,
            max_concurrent_requests: 50,
            execution_strategy: ExecutionStrategy::SmartSequential,
        }
    }
}

impl PerformanceConfig {
    pub fn with_execution_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.execution_strategy = strategy;
        self
    }

    pub fn with_element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportingConfig {
    pub enabled: bool,
    pub generate_html: bool,
    pub generate_json: bool,
    pub generate_text: bool,
    pub generate_csv: bool,
    pub console_logging: bool,
    pub output_directory: PathBuf,
    pub report_name_prefix: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            generate_html: true,
            generate_json: true,
            generate_text: true,
            generate_csv: false,
            console_logging: true,
            output_directory: PathBuf::from("./autoheal-reports"),
            report_name_prefix: "AutoHeal_Report".to_string(),
        }
    }
}

impl ReportingConfig {
    pub fn enabled_in(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            output_directory: output_directory.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct ConfigurationValidator;

impl ConfigurationValidator {
    pub fn validate(config: &AutoHealConfiguration) -> ValidationReport {
        let mut report = ValidationReport::default();

        if config.cache.max_size == 0 {
            report.errors.push("cache.max_size must be greater than 0".to_string());
        } else if config.cache.max_size > 100_000 {
            report.warnings.push(format!(
                "cache.max_size of {} may use a lot of memory",
                config.cache.max_size
            ));
        }

        let provider = config.ai.provider;
        if provider.requires_api_key() && config.ai.resolved_api_keys().is_empty() {
            report.errors.push(format!(
                "ai provider {provider} needs an API key (set ai.api_keys or {})",
                provider.api_key_env().unwrap_or("an API key variable")
            ));
        }
        if config.ai.timeout < Duration::from_secs(1) {
            report.warnings.push(format!(
                "ai.timeout of {:?} is very short and may cause failures",
                config.ai.timeout
            ));
        }
        if config.ai.visual_analysis_enabled && !provider.supports_visual() {
            report.warnings.push(format!(
                "ai.visual_analysis_enabled is set but {provider} has no vision support"
            ));
        }

        if config.performance.thread_pool_size == 0 {
            report
                .errors
                .push("performance.thread_pool_size must be greater than 0".to_string());
        } else if config.performance.thread_pool_size > 100 {
            report.warnings.push(format!(
                "performance.thread_pool_size of {} is very large",
                config.performance.thread_pool_size
            ));
        }
        if config.performance.element_timeout.is_zero() {
            report
                .errors
                .push("performance.element_timeout must be greater than 0".to_string());
        }

        if config.resilience.circuit_breaker_failure_threshold == 0 {
            report.errors.push(
                "resilience.circuit_breaker_failure_threshold must be greater than 0".to_string(),
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use autoheal_core_types::AiProvider;

    use super::*;

    fn mock_config() -> AutoHealConfiguration {
        AutoHealConfiguration::default().with_ai(AiConfig::for_provider(AiProvider::Mock))
    }

    #[test]
    fn test_defaults() {
        let config = AutoHealConfiguration::default();
        assert_eq!(config.performance.element_timeout, Duration::from_secs(10));
        assert_eq!(config.performance.max_concurrent_requests, 50);
        assert_eq!(
            config.performance.execution_strategy,
            ExecutionStrategy::SmartSequential
        );
        assert!(config.performance.thread_pool_size >= 2);
        assert!(!config.reporting.enabled);
        assert!(!config.reporting.generate_csv);
        assert_eq!(config.reporting.report_name_prefix, "AutoHeal_Report");
    }

    #[test]
    fn test_yaml_with_humantime_durations() {
        let yaml = r#"
performance:
  element_timeout: 3s
  execution_strategy: dom_only
reporting:
  enabled: true
  output_directory: /tmp/reports
"#;
        let config: AutoHealConfiguration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.performance.element_timeout, Duration::from_secs(3));
        assert_eq!(config.performance.execution_strategy, ExecutionStrategy::DomOnly);
        assert!(config.reporting.enabled);
        assert!(config.reporting.generate_html);
        assert_eq!(config.cache.max_size, 10_000);
    }

    #[test]
    fn test_valid_mock_config() {
        let report = ConfigurationValidator::validate(&mock_config());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_errors() {
        let mut config = mock_config();
        config.cache.max_size = 0;
        config.performance.thread_pool_size = 0;
        config.performance.element_timeout = Duration::ZERO;
        config.resilience.circuit_breaker_failure_threshold = 0;

        let report = ConfigurationValidator::validate(&config);
        assert_eq!(report.errors.len(), 4);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_missing_key_is_error() {
        let mut config = AutoHealConfiguration::default()
            .with_ai(AiConfig::for_provider(AiProvider::AnthropicClaude));
        config.ai.api_keys.clear();
        // The env var may be set on the host; only assert when it is not.
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            let report = ConfigurationValidator::validate(&config);
            assert!(report.errors.iter().any(|e| e.contains("ANTHROPIC_API_KEY")));
        }
    }

    #[test]
    fn test_warnings() {
        let mut config = mock_config();
        config.cache.max_size = 200_000;
        config.ai.timeout = Duration::from_millis(500);
        config.performance.thread_pool_size = 150;
        config.ai.visual_analysis_enabled = true;
        config.ai.provider = AiProvider::LocalModel;

        let report = ConfigurationValidator::validate(&config);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 4, "{:?}", report.warnings);
    }
}
