//! Error types and HTTP response conversion
//!
//! The variants here map 1:1 onto the error-kind table in the design
//! (not_found, forbidden, bad_request, conflict, upstream_timeout,
//! upstream_failure, internal) so every engine can construct an `Error`
//! without reaching for ad-hoc status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error surfaced at bootstrap
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Repository / database operation failed
    #[cfg(feature = "database")]
    #[error("repository error: {0}")]
    Repository(#[from] crate::repository::RepositoryError),

    /// Redis error (rule cache backing store, rate limiter)
    #[cfg(feature = "cache")]
    #[error("cache error: {0}")]
    Redis(Box<redis::RedisError>),

    /// Object storage failure (upload/download/delete/prefix-delete)
    #[error("storage error: {0}")]
    Storage(String),

    /// Outbound HTTP call to a proxy target failed before/without a response
    #[error("upstream request failed: {0}")]
    UpstreamFailure(String),

    /// Outbound HTTP call exceeded the rule's `timeoutMs`
    #[error("upstream request timed out")]
    UpstreamTimeout,

    /// Requested entity (asset, alias, project, domain) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller lacks the role/capability required by the effective visibility
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed public path, invalid repo syntax, non-HTTPS proxy target, SSRF attempt
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Attempted proxy-rule target resolves to a disallowed network range
    #[error("proxy target rejected by SSRF guard: {0}")]
    SsrfRejected(String),

    /// Duplicate alias, rule pattern, or rule-set name
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upload would exceed project quota and the quota policy is `block`
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Header-value AEAD decryption failed (non-fatal; logged, caller falls back)
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Email form handler has no destination address configured
    #[error("email destination not configured: {0}")]
    EmailDestinationMissing(String),

    /// SMTP relay unreachable or rejected the message
    #[error("email transport unavailable: {0}")]
    EmailTransportUnavailable(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache-rule or proxy-rule compile fault, storage outage mid-stream, or any
    /// other fault that should be logged with a correlation id and surfaced as 500
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub status: u16,
}

impl ErrorResponse {
    pub fn with_code(status: StatusCode, code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl Error {
    /// The canonical HTTP status for this error kind, per the error-kind table.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Config(_) | Error::Internal(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            #[cfg(feature = "database")]
            Error::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            #[cfg(feature = "cache")]
            Error::Redis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            Error::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::BadRequest(_) | Error::SsrfRejected(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::QuotaExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::DecryptionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::EmailDestinationMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::EmailTransportUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            #[cfg(feature = "database")]
            Error::Repository(_) => "REPOSITORY_ERROR",
            #[cfg(feature = "cache")]
            Error::Redis(_) => "CACHE_ERROR",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::UpstreamFailure(_) => "UPSTREAM_FAILURE",
            Error::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::BadRequest(_) => "BAD_REQUEST",
            Error::SsrfRejected(_) => "SSRF_REJECTED",
            Error::Conflict(_) => "CONFLICT",
            Error::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Error::DecryptionFailed(_) => "DECRYPTION_FAILED",
            Error::EmailDestinationMissing(_) => "EMAIL_DESTINATION_MISSING",
            Error::EmailTransportUnavailable(_) => "EMAIL_TRANSPORT_UNAVAILABLE",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal-grade failures are logged with a correlation id; client-grade
        // failures (4xx) are not — they're expected traffic, not incidents.
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = ErrorResponse::with_code(status, self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}
