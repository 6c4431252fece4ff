//! Error types for AI element analysis

use std::time::Duration;

use autoheal_core_types::{AutoHealError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum AiError {
    #[error("Invalid AI configuration: {0}")]
    Config(String),

    /// Transport failure before a response arrived
    #[error("AI request failed: {0}")]
    Request(String),

    #[error("{0}")]
    RateLimited(String),

    /// Non-success status from the provider
    #[error("{provider} returned {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    /// Response arrived but did not contain a usable answer
    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),

    #[error("AI request timed out after {0:?}")]
    Timeout(Duration),

    #[error("AI circuit breaker is open; retry after {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    /// Capability switched off or not offered by the provider
    #[error("AI service unavailable: {0}")]
    Unavailable(String),

    #[error("No elements to choose from")]
    NoElements,
}

impl AiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Request(_) | AiError::RateLimited(_) | AiError::Timeout(_) => true,
            AiError::Http { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            AiError::Config(_) => 3,
            AiError::CircuitOpen { .. } | AiError::Unavailable(_) => 2,
            AiError::Request(_) | AiError::Http { .. } | AiError::Timeout(_) => 2,
            AiError::RateLimited(_) | AiError::InvalidResponse(_) => 1,
            AiError::NoElements => 0,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Request(format!("request timed out: {err}"))
        } else if err.is_decode() {
            AiError::InvalidResponse(err.to_string())
        } else {
            AiError::Request(err.to_string())
        }
    }
}

impl From<AiError> for AutoHealError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::CircuitOpen { retry_after } => {
                AutoHealError::circuit_open(err.to_string(), retry_after)
            }
            AiError::Timeout(_) => AutoHealError::timeout(err.to_string()),
            AiError::Config(_) => AutoHealError::configuration(err.to_string()),
            AiError::NoElements => AutoHealError::element_not_found(err.to_string()),
            _ => AutoHealError::new(ErrorCode::AiServiceUnavailable, err.to_string()),
        }
    }
}
