//! Chat Gateway error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic to avoid
//! leaking internal details. Actual errors are logged server-side.

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Realm advertised in `WWW-Authenticate` challenges.
pub const AUTH_REALM: &str = "chat-gateway";

/// Chat Gateway error type.
///
/// Maps to appropriate HTTP status codes:
/// - Unauthorized: 401 Unauthorized (with `WWW-Authenticate`)
/// - BadRequest: 400 Bad Request
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Unauthorized(_) => 401,
            GatewayError::BadRequest(_) => 400,
            GatewayError::ServiceUnavailable(_) => 503,
        }
    }
}

/// Every authentication failure becomes the same 401. The specific kind is
/// only logged.
impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::FetchError(fetch) => {
                tracing::warn!(
                    target: "gateway.auth",
                    kind = err.kind(),
                    error = %fetch,
                    "Authentication failed: identity provider unavailable"
                );
            }
            _ => {
                tracing::debug!(target: "gateway.auth", kind = err.kind(), "Authentication failed");
            }
        }
        GatewayError::Unauthorized(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            GatewayError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            GatewayError::ServiceUnavailable(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "gateway.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                format!("Bearer realm=\"{AUTH_REALM}\", error=\"invalid_token\"").parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
