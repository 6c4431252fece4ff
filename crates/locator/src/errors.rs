//! Error types for the locator

use autoheal_ai_service::AiError;
use autoheal_core_types::{AutoHealError, ErrorCode};
use autoheal_selector_cache::CacheError;
use autoheal_web_adapter::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocatorError {
    /// No strategy produced an element
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A single strategy gave up
    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },

    #[error("Visual analysis is disabled for this request")]
    VisualAnalysisDisabled,

    /// The lookup exceeded its time budget
    #[error("Resolution timeout: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Report files could not be written
    #[error("Report error: {0}")]
    Report(String),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::Timeout(_) => true,
            LocatorError::Adapter(err) => err.is_retryable(),
            LocatorError::Ai(err) => err.is_retryable(),
            LocatorError::Cache(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Configuration(_) => 3,
            LocatorError::Timeout(_) | LocatorError::Report(_) => 2,
            LocatorError::Adapter(err) => err.severity(),
            LocatorError::Ai(err) => err.severity(),
            LocatorError::Cache(err) => err.severity(),
            LocatorError::ElementNotFound(_) | LocatorError::StrategyFailed { .. } => 1,
            LocatorError::VisualAnalysisDisabled => 0,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LocatorError::ElementNotFound(_)
            | LocatorError::StrategyFailed { .. }
            | LocatorError::VisualAnalysisDisabled => ErrorCode::ElementNotFound,
            LocatorError::Timeout(_) => ErrorCode::TimeoutExceeded,
            LocatorError::Configuration(_) | LocatorError::Report(_) => {
                ErrorCode::ConfigurationInvalid
            }
            LocatorError::Adapter(AdapterError::InvalidSelector(_)) => ErrorCode::InvalidLocator,
            LocatorError::Adapter(_) => ErrorCode::AdapterError,
            LocatorError::Ai(err) => AutoHealError::from(err.clone()).code,
            LocatorError::Cache(err) => AutoHealError::from(err.clone()).code,
        }
    }

    pub(crate) fn strategy_failed(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        LocatorError::StrategyFailed {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }
}

impl From<LocatorError> for AutoHealError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::Ai(inner) => inner.into(),
            LocatorError::Cache(inner) => inner.into(),
            LocatorError::Adapter(inner) => inner.into(),
            other => AutoHealError::new(other.code(), other.to_string()),
        }
    }
}
