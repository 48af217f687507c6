//! Error types for Tasksmith
//!
//! Centralized error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

/// All error types that can occur in Tasksmith
#[derive(Debug, Error)]
pub enum TasksmithError {
    /// Missing credential or invalid configuration; the run never starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A completion or search call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML config parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Tasksmith operations
pub type Result<T> = std::result::Result<T, TasksmithError>;

/// Uniform failure of any backend call, tagged with the operation that issued it.
#[derive(Debug, Error)]
#[error("Error in {operation}: {cause}")]
pub struct ProviderError {
    pub operation: String,
    #[source]
    pub cause: CallError,
}

impl ProviderError {
    pub fn new(operation: impl Into<String>, cause: CallError) -> Self {
        Self {
            operation: operation.into(),
            cause,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.cause.is_retryable()
    }

    /// Server-suggested delay, if the backend sent one
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.cause {
            CallError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Transport and backend failures below the provider boundary
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CallError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::RateLimited { .. } => true,
            CallError::Api { status, .. } => *status >= 500,
            CallError::Network(_) => true,
            CallError::Timeout(_) => true,
            CallError::InvalidResponse(_) => false,
            CallError::Json(_) => false,
        }
    }
}

/// Search-query extraction failures. Always soft.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("search query JSON is malformed: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("search query JSON has no \"search_query\" key")]
    MissingKey,

    #[error("\"search_query\" is not a string")]
    NotAString,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = TasksmithError::Configuration("MISTRAL_API_KEY not set".to_string());
        assert_eq!(err.to_string(), "Configuration error: MISTRAL_API_KEY not set");
    }

    #[test]
    fn test_provider_error_carries_operation_and_cause() {
        let err = ProviderError::new(
            "chat_completion",
            CallError::Api {
                status: 401,
                message: "unauthorized".to_string(),
            },
        );
        assert_eq!(err.to_string(), "Error in chat_completion: API error 401: unauthorized");
        let source = std::error::Error::source(&err).expect("cause is the source");
        assert_eq!(source.to_string(), "API error 401: unauthorized");
    }

    #[test]
    fn test_provider_error_wraps_into_crate_error() {
        let err: TasksmithError = ProviderError::new("search", CallError::Timeout(Duration::from_secs(30))).into();
        assert!(matches!(err, TasksmithError::Provider(_)));
        assert_eq!(err.to_string(), "Error in search: Timed out after 30s");
    }

    #[test]
    fn test_call_error_is_retryable() {
        assert!(
            CallError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .is_retryable()
        );
        assert!(
            CallError::Api {
                status: 503,
                message: "overloaded".to_string()
            }
            .is_retryable()
        );
        assert!(
            !CallError::Api {
                status: 400,
                message: "bad request".to_string()
            }
            .is_retryable()
        );
        assert!(CallError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!CallError::InvalidResponse("no choices".to_string()).is_retryable());
    }

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        let limited = ProviderError::new(
            "chat_completion",
            CallError::RateLimited {
                retry_after: Duration::from_secs(7),
            },
        );
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));

        let other = ProviderError::new("chat_completion", CallError::InvalidResponse("x".into()));
        assert_eq!(other.retry_after(), None);
    }

    #[test]
    fn test_extraction_error_messages() {
        assert_eq!(
            ExtractionError::MissingKey.to_string(),
            "search query JSON has no \"search_query\" key"
        );
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        assert!(ExtractionError::InvalidJson(json_err).to_string().starts_with("search query JSON is malformed"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TasksmithError = io_err.into();
        assert!(matches!(err, TasksmithError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
