//! Error types for the transaction RAG service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Ingestion input does not match the record schema (fatal at startup)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Embedding generation failed or the input was rejected
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Caller passed an argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Search against an index that holds no vectors
    #[error("Vector index is empty")]
    IndexEmpty,

    /// The question was missing, empty or whitespace
    #[error("Question must not be empty")]
    EmptyInput,

    /// Completion service failure
    #[error("Completion service failed: {0}")]
    Upstream(#[from] UpstreamError),

    /// Ingestion has not completed yet
    #[error("Service is not ready: ingestion has not completed")]
    NotReady,

    /// Admission control rejected the request
    #[error("Service busy: {0}")]
    Busy(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Schema(_) => "schema_error",
            Error::Embedding(_) => "embedding_error",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::IndexEmpty => "index_empty",
            Error::EmptyInput => "empty_input",
            Error::Upstream(err) => err.kind(),
            Error::NotReady => "not_ready",
            Error::Busy(_) => "busy",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether repeating the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Upstream(err) => err.is_retryable(),
            Error::NotReady | Error::Busy(_) => true,
            _ => false,
        }
    }

    /// Whether the failure was caused by the request itself
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::EmptyInput | Error::InvalidArgument(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::EmptyInput | Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::NotReady | Error::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Upstream(UpstreamError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Schema(_)
            | Error::Embedding(_)
            | Error::IndexEmpty
            | Error::Config(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure reported by the external completion service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("authentication failed: {message}")]
    Authentication { message: String },

    #[error("rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Timeout { .. }
            | UpstreamError::RateLimited { .. }
            | UpstreamError::Network { .. } => true,
            UpstreamError::Server { status, .. } => *status >= 500,
            UpstreamError::Authentication { .. } | UpstreamError::InvalidResponse { .. } => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { .. } => "upstream_timeout",
            UpstreamError::Authentication { .. } => "upstream_auth",
            UpstreamError::RateLimited { .. } => "upstream_rate_limited",
            UpstreamError::Server { .. } => "upstream_server_error",
            UpstreamError::Network { .. } => "upstream_network",
            UpstreamError::InvalidResponse { .. } => "upstream_invalid_response",
        }
    }

    /// Classify a non-success HTTP status and its body
    pub fn from_status_and_body(status: u16, body: &str) -> Self {
        // OpenAI-style bodies carry {"error": {"message": ...}}
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string());

        match status {
            401 | 403 => UpstreamError::Authentication { message },
            429 => UpstreamError::RateLimited { message },
            _ => UpstreamError::Server { status, message },
        }
    }

    /// Classify a transport-level error
    pub fn from_reqwest_error(error: reqwest::Error, timeout_ms: u64) -> Self {
        if error.is_timeout() {
            UpstreamError::Timeout { timeout_ms }
        } else if let Some(status) = error.status() {
            Self::from_status_and_body(status.as_u16(), &error.to_string())
        } else if error.is_decode() {
            UpstreamError::InvalidResponse {
                message: error.to_string(),
            }
        } else {
            UpstreamError::Network {
                message: error.to_string(),
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "Request failed: {}", self);
        } else {
            tracing::debug!(kind = self.kind(), "Request rejected: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}
