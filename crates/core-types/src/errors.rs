//! Workspace-wide error code and the public error type.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error classification exposed to callers and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ConfigurationInvalid,
    ElementNotFound,
    AiServiceUnavailable,
    TimeoutExceeded,
    CacheError,
    AdapterError,
    CircuitBreakerOpen,
    InvalidLocator,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationInvalid => "CONFIGURATION_INVALID",
            ErrorCode::ElementNotFound => "ELEMENT_NOT_FOUND",
            ErrorCode::AiServiceUnavailable => "AI_SERVICE_UNAVAILABLE",
            ErrorCode::TimeoutExceeded => "TIMEOUT_EXCEEDED",
            ErrorCode::CacheError => "CACHE_ERROR",
            ErrorCode::AdapterError => "ADAPTER_ERROR",
            ErrorCode::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            ErrorCode::InvalidLocator => "INVALID_LOCATOR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced by the locator facade.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct AutoHealError {
    pub code: ErrorCode,
    pub message: String,
    /// Set when the AI circuit breaker is open.
    pub retry_after: Option<Duration>,
    pub context: BTreeMap<String, String>,
}

impl AutoHealError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
            context: BTreeMap::new(),
        }
    }

    pub fn circuit_open(message: impl Into<String>, retry_after: Duration) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(ErrorCode::CircuitBreakerOpen, message)
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn element_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ElementNotFound, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationInvalid, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TimeoutExceeded, message)
    }
}
