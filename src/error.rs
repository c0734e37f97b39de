//! Error types for sedas-dl
//!
//! Two layers of errors exist:
//! - [`Error`] is returned synchronously from the public API (misconfiguration,
//!   adding to a closed pool, client failures).
//! - [`RetrievalError`] is what a [`RetrievalService`](crate::retrieval::RetrievalService)
//!   reports for a single product. Workers capture these on the work item and only
//!   surface them through the done queue.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sedas-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sedas-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.parallelism")
        key: Option<String>,
    },

    /// The pool has been shut down and no longer accepts work
    #[error("bulk downloader is shut down: not accepting new products")]
    PoolClosed,

    /// A submitted descriptor cannot be turned into a work item
    #[error("invalid product descriptor: {0}")]
    InvalidDescriptor(String),

    /// Error reported by the retrieval service for a single product
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Authentication against the SeDAS API failed
    #[error("authentication error: {0}")]
    Auth(String),

    /// Non-success HTTP status from the SeDAS API
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body (possibly truncated)
        body: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error on a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Per-product retrieval failure
///
/// Every variant is either transient (worth retrying) or permanent; see
/// [`IsRetryable`](crate::retry::IsRetryable).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// Temporary failure (network hiccup, server busy); the operation may succeed later
    #[error("transient failure: {message}")]
    Transient {
        /// What went wrong
        message: String,
    },

    /// Failure that retrying cannot fix (unauthorized, invalid descriptor, archive rejected)
    #[error("permanent failure: {message}")]
    Permanent {
        /// What went wrong
        message: String,
    },

    /// The archive never became ready within the configured number of polls
    #[error("archive request {request_id} not ready after {polls} polls")]
    ArchiveTimeout {
        /// Archive request identifier
        request_id: String,
        /// Number of readiness polls issued
        polls: u32,
    },

    /// The transfer completed but the destination could not be finalized
    #[error("failed to write {path}: {reason}")]
    Destination {
        /// Destination path
        path: PathBuf,
        /// The underlying I/O failure
        reason: String,
    },

    /// The retrieval service panicked while handling the product
    #[error("retrieval service panicked: {0}")]
    Panicked(String),

    /// The pool shut down before the product reached a terminal state
    #[error("interrupted by shutdown")]
    Interrupted,
}

impl RetrievalError {
    /// Create a transient error
    pub fn transient(message: impl Into<String>) -> Self {
        RetrievalError::Transient {
            message: message.into(),
        }
    }

    /// Create a permanent error
    pub fn permanent(message: impl Into<String>) -> Self {
        RetrievalError::Permanent {
            message: message.into(),
        }
    }
}

impl From<Error> for RetrievalError {
    fn from(err: Error) -> Self {
        use crate::retry::IsRetryable;

        match err {
            Error::Retrieval(inner) => inner,
            other if other.is_retryable() => RetrievalError::transient(other.to_string()),
            other => RetrievalError::permanent(other.to_string()),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_carries_key() {
        let err = Error::config("download.parallelism", "must be at least 1");
        match err {
            Error::Config { message, key } => {
                assert_eq!(message, "must be at least 1");
                assert_eq!(key.as_deref(), Some("download.parallelism"));
            }
            other => panic!("expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_error_display_messages() {
        assert_eq!(
            Error::PoolClosed.to_string(),
            "bulk downloader is shut down: not accepting new products"
        );
        assert_eq!(
            RetrievalError::transient("connection reset").to_string(),
            "transient failure: connection reset"
        );
        assert_eq!(
            RetrievalError::ArchiveTimeout {
                request_id: "req-1".to_string(),
                polls: 4,
            }
            .to_string(),
            "archive request req-1 not ready after 4 polls"
        );
    }

    #[test]
    fn test_retrieval_error_unwraps_from_error() {
        let inner = RetrievalError::permanent("descriptor rejected");
        let converted: RetrievalError = Error::Retrieval(inner.clone()).into();
        assert_eq!(converted, inner);
    }

    #[test]
    fn test_http_errors_convert_by_status_class() {
        let busy = Error::Http {
            status: 503,
            url: "https://example.com".to_string(),
            body: String::new(),
        };
        assert!(matches!(
            RetrievalError::from(busy),
            RetrievalError::Transient { .. }
        ));

        let missing = Error::Http {
            status: 404,
            url: "https://example.com".to_string(),
            body: String::new(),
        };
        assert!(matches!(
            RetrievalError::from(missing),
            RetrievalError::Permanent { .. }
        ));
    }

    #[test]
    fn test_auth_error_converts_to_permanent() {
        let converted = RetrievalError::from(Error::Auth("bad credentials".to_string()));
        match converted {
            RetrievalError::Permanent { message } => {
                assert!(message.contains("bad credentials"), "got: {}", message);
            }
            other => panic!("expected Permanent, got: {:?}", other),
        }
    }
}
