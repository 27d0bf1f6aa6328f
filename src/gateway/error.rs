//! Error types for the backend gateway.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when calling a model or embedding backend.
///
/// Any of these is fatal to a scoring request: partial results are never
/// scored. Auxiliary components (alignment, raw export) catch these at
/// their own boundary and degrade instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend failed or rejected the request.
    #[error("{backend} error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
        http_status: Option<u16>,
    },

    /// A response arrived but could not be interpreted: malformed JSON,
    /// missing embedding, wrong shape. Never silently defaulted.
    #[error("invalid payload from {backend}: {message}")]
    InvalidPayload {
        backend: &'static str,
        message: String,
    },

    /// Request timed out. Timeouts are bounded per call by the adapter;
    /// the core does not retry.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error (bad host URL, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Create a backend error without an HTTP status.
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
            http_status: None,
        }
    }

    /// Create a backend error carrying the HTTP status it came with.
    pub fn backend_with_status(
        backend: &'static str,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
            http_status: Some(status),
        }
    }

    /// Create an invalid payload error.
    pub fn invalid_payload(backend: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            backend,
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Get a short error code for usage records and logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Backend { .. } => "backend_error",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::Timeout(_) => "timeout",
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }
}
