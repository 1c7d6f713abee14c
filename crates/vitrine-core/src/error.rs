use thiserror::Error;

/// Application-wide error types for vitrine.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page or calling the platform).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// A candidate page was fetched but carries neither identity marker.
    #[error("Identity validation failed: {0}")]
    ValidationFailed(String),

    /// AI or HTML response was not in the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// HTML-to-text conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// The commerce platform throttled the request. Carries the platform's
    /// Retry-After hint in seconds, when one was sent.
    #[error("Platform rate limited")]
    RateLimited { retry_after: Option<f64> },

    /// The commerce platform rejected the payload (validation error).
    /// Terminal for the current run.
    #[error("Platform rejected: {0}")]
    PlatformRejected(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Database operation failed. Fatal for the whole run.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimited { .. } => true,
            AppError::LlmError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }

    /// Returns true if this error means the upstream source was unreachable,
    /// in which case resolution degrades to the next candidate or layer
    /// instead of failing the record.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::Timeout(_)
                | AppError::NetworkError(_)
                | AppError::LlmError { .. }
                | AppError::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::NetworkError("reset".into()).is_retryable());
        assert!(AppError::Timeout(30).is_retryable());
        assert!(AppError::RateLimited { retry_after: None }.is_retryable());
        assert!(
            AppError::LlmError {
                message: "server error".into(),
                status_code: 500,
                retryable: true,
            }
            .is_retryable()
        );
        assert!(!AppError::PlatformRejected("bad handle".into()).is_retryable());
        assert!(!AppError::ValidationFailed("no marker".into()).is_retryable());
    }

    #[test]
    fn test_source_unavailable_degrades() {
        assert!(AppError::Timeout(10).is_source_unavailable());
        assert!(AppError::HttpError("HTTP 503".into()).is_source_unavailable());
        assert!(
            AppError::LlmError {
                message: "overloaded".into(),
                status_code: 503,
                retryable: true,
            }
            .is_source_unavailable()
        );
        assert!(!AppError::DatabaseError("down".into()).is_source_unavailable());
        assert!(!AppError::ParseError("garbled".into()).is_source_unavailable());
    }
}
