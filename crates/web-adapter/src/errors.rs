//! Error types for automation adapters

use autoheal_core_types::{AutoHealError, ErrorCode};
use thiserror::Error;

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    /// The driver endpoint could not be reached
    #[error("WebDriver transport error: {0}")]
    Transport(String),

    /// Error payload returned by the driver (`{value: {error, message}}`)
    #[error("WebDriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("WebDriver session error: {0}")]
    Session(String),

    /// Driver answered with a payload we could not interpret
    #[error("Unexpected WebDriver response: {0}")]
    Protocol(String),

    #[error("Fixture error: {0}")]
    Fixture(String),
}

impl AdapterError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Transport(_) => true,
            AdapterError::WebDriver { error, .. } => {
                matches!(error.as_str(), "timeout" | "script timeout" | "unknown error")
            }
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            AdapterError::Session(_) => 3,
            AdapterError::Transport(_) | AdapterError::Fixture(_) => 2,
            AdapterError::WebDriver { .. } | AdapterError::Protocol(_) => 1,
            AdapterError::InvalidSelector(_) => 1,
        }
    }

    /// Map a W3C error code onto the matching variant.
    pub fn from_webdriver(error: impl Into<String>, message: impl Into<String>) -> Self {
        let error = error.into();
        let message = message.into();
        match error.as_str() {
            "invalid selector" | "invalid argument" => AdapterError::InvalidSelector(message),
            "invalid session id" | "no such window" | "session not created" => {
                AdapterError::Session(message)
            }
            _ => AdapterError::WebDriver { error, message },
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AdapterError::Protocol(err.to_string())
        } else {
            AdapterError::Transport(err.to_string())
        }
    }
}

impl From<AdapterError> for AutoHealError {
    fn from(err: AdapterError) -> Self {
        let code = match err {
            AdapterError::InvalidSelector(_) => ErrorCode::InvalidLocator,
            _ => ErrorCode::AdapterError,
        };
        AutoHealError::new(code, err.to_string())
    }
}
