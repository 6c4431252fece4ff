//! Error types for the healing cache

use autoheal_core_types::{AutoHealError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CacheError {
    /// Backend could not be reached or initialised
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// Stored payload could not be encoded or decoded
    #[error("Cache payload error: {0}")]
    Serialization(String),

    /// Filesystem failure in the persistent cache
    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Invalid cache configuration: {0}")]
    Config(String),
}

impl CacheError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Unavailable(_) | CacheError::Io(_))
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            CacheError::Config(_) => 3,
            CacheError::Unavailable(_) => 2,
            CacheError::Io(_) => 2,
            CacheError::Serialization(_) => 1,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<CacheError> for AutoHealError {
    fn from(err: CacheError) -> Self {
        let code = match err {
            CacheError::Config(_) => ErrorCode::ConfigurationInvalid,
            _ => ErrorCode::CacheError,
        };
        AutoHealError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(CacheError::Unavailable("down".into()).is_retryable());
        assert!(!CacheError::Serialization("bad".into()).is_retryable());
        assert_eq!(CacheError::Config("x".into()).severity(), 3);

        let err: AutoHealError = CacheError::Io("disk full".into()).into();
        assert_eq!(err.code, ErrorCode::CacheError);
        assert_eq!(err.message, "Cache I/O error: disk full");
    }
}
