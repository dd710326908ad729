//! Error types for the Sashi client layer.
//!
//! The taxonomy mirrors what the UI needs to present: transport problems and
//! 5xx responses are retryable, timeouts and 4xx responses are terminal, and
//! cache failures are always downgraded to a miss by the strategy layer.

use std::time::Duration;
use thiserror::Error;

/// Main error type for Sashi operations.
#[derive(Debug, Error)]
pub enum SashiError {
    // Network errors
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Request rejected with {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Image is {actual_bytes} bytes, above the {limit_bytes} byte upload limit")]
    PayloadTooLarge { limit_bytes: u64, actual_bytes: u64 },

    // Submission state errors
    #[error("A prediction is already in flight")]
    Busy,

    // Cache errors
    #[error("Cache unavailable: {message}")]
    CacheUnavailable {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Lifecycle errors
    #[error("Install failed for {asset}: {message}")]
    InstallFailed { asset: String, message: String },

    #[error("Lifecycle phase {phase} does not allow {operation}")]
    InvalidPhase { phase: String, operation: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // File system errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Sashi operations.
pub type Result<T> = std::result::Result<T, SashiError>;

// Conversion implementations for common error types

impl From<std::io::Error> for SashiError {
    fn from(err: std::io::Error) -> Self {
        SashiError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SashiError {
    fn from(err: serde_json::Error) -> Self {
        SashiError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for SashiError {
    fn from(err: rusqlite::Error) -> Self {
        SashiError::CacheUnavailable {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for SashiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SashiError::Timeout(Duration::from_secs(0))
        } else {
            SashiError::Transport {
                message: err.to_string(),
                cause: std::error::Error::source(&err).map(|s| s.to_string()),
            }
        }
    }
}

impl SashiError {
    /// Check if this error should trigger another attempt.
    ///
    /// Timeouts are deliberately terminal: a prediction that is already slow
    /// should not be blindly resubmitted.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SashiError::Transport { .. } | SashiError::Server { .. }
        )
    }

    /// Human-readable message for the terminal failure categories the UI
    /// distinguishes: offline, request too large, server error, malformed
    /// request.
    pub fn user_message(&self) -> String {
        match self {
            SashiError::Transport { .. } => {
                "No connection to the grading service. Check your network and try again.".into()
            }
            SashiError::Timeout(_) => {
                "The grading service took too long to respond. Try again later.".into()
            }
            SashiError::PayloadTooLarge { limit_bytes, .. } => {
                format!(
                    "The photo is too large to upload (limit {} MB).",
                    limit_bytes / (1024 * 1024)
                )
            }
            SashiError::Server { status, .. } => {
                format!("The grading service reported an error ({}).", status)
            }
            SashiError::Client { status, message } => {
                format!("The request was rejected ({}): {}", status, message)
            }
            SashiError::Busy => "A grading request is already running.".into(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SashiError::Server {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(err.to_string(), "Server error 503: unavailable");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SashiError::Transport {
            message: "connection refused".into(),
            cause: None
        }
        .is_retryable());
        assert!(SashiError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_timeout_is_not_retryable() {
        assert!(!SashiError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn test_client_errors_are_terminal() {
        assert!(!SashiError::Client {
            status: 404,
            message: "not found".into()
        }
        .is_retryable());
        assert!(!SashiError::Busy.is_retryable());
        assert!(!SashiError::PayloadTooLarge {
            limit_bytes: 10,
            actual_bytes: 11
        }
        .is_retryable());
    }

    #[test]
    fn test_user_message_distinguishes_too_large() {
        let err = SashiError::PayloadTooLarge {
            limit_bytes: 10 * 1024 * 1024,
            actual_bytes: 12 * 1024 * 1024,
        };
        assert!(err.user_message().contains("10 MB"));
    }
}
