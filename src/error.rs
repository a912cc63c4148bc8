//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and a JSON error body. Every endpoint
//! returns `Result<_, GatewayError>` so that errors are caught at the top
//! level and never escape as a bare 500 without a body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Maximum length of an upstream error message echoed to clients.
pub const UPSTREAM_MESSAGE_LIMIT: usize = 200;

/// JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// { "success": false, "error": "missing required field: title", "code": 1001 }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error message.
    pub error: String,
    /// Numeric error code (see ranges on [`GatewayError`]).
    pub code: u32,
    /// Milliseconds until a rate-limited client may retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category             | HTTP Status                       |
/// |-----------|----------------------|-----------------------------------|
/// | 1000–1999 | Validation / method  | 400 Bad Request / 405             |
/// | 2000–2999 | State / Not Found    | 404 Not Found / 409 Conflict      |
/// | 3000–3999 | Server / upstream    | 500 / 502                         |
/// | 4000–4999 | Access               | 403 Forbidden / 429               |
/// | 5000–5999 | Confirmation         | 202 Accepted (outcome unknown)    |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or invalid admin token or ticket token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Endpoint does not accept the request method.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Document absent from the store.
    #[error("{0} not found")]
    NotFound(String),

    /// Write rejected because it would violate a uniqueness constraint.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Client exceeded a rate limit.
    #[error("rate limit exceeded; retry after {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until the client may retry.
        retry_after_ms: u64,
    },

    /// Third-party dependency failed. The message is truncated.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A write succeeded but never became visible within the polling budget.
    #[error("reservation not confirmed after {attempts} attempts")]
    ConfirmationTimeout {
        /// Number of queries performed.
        attempts: u32,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Builds an [`GatewayError::Upstream`] from a provider message,
    /// truncated to [`UPSTREAM_MESSAGE_LIMIT`] characters.
    #[must_use]
    pub fn upstream(message: &str) -> Self {
        let truncated: String = message.chars().take(UPSTREAM_MESSAGE_LIMIT).collect();
        Self::Upstream(truncated)
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::MethodNotAllowed => 1005,
            Self::NotFound(_) => 2001,
            Self::Conflict(_) => 2009,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Upstream(_) => 3002,
            Self::Unauthorized(_) => 4003,
            Self::RateLimited { .. } => 4029,
            Self::ConfirmationTimeout { .. } => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::ConfirmationTimeout { .. } => StatusCode::ACCEPTED,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let retry_after_ms = match &self {
            Self::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        };
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.error_code(),
            retry_after_ms,
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_endpoint_conventions() {
        assert_eq!(
            GatewayError::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Unauthorized("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            GatewayError::RateLimited { retry_after_ms: 5 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GatewayError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn confirmation_timeout_is_not_a_hard_failure() {
        let err = GatewayError::ConfirmationTimeout { attempts: 5 };
        assert!(!err.status_code().is_client_error());
        assert!(!err.status_code().is_server_error());
    }

    #[test]
    fn upstream_messages_are_truncated() {
        let long = "x".repeat(1_000);
        let GatewayError::Upstream(msg) = GatewayError::upstream(&long) else {
            return;
        };
        assert_eq!(msg.chars().count(), UPSTREAM_MESSAGE_LIMIT);
    }

    #[test]
    fn error_body_has_success_false() {
        let body = ErrorResponse {
            success: false,
            error: "nope".to_string(),
            code: 1001,
            retry_after_ms: None,
        };
        let json = serde_json::to_string(&body).unwrap_or_default();
        assert_eq!(json, r#"{"success":false,"error":"nope","code":1001}"#);
    }
}
