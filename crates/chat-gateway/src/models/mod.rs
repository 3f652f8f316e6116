//! Response models for the Chat Gateway HTTP API.

use serde::{Deserialize, Serialize};

/// Readiness check response.
///
/// Returned by the `/ready` endpoint (readiness check).
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// Service readiness status ("ready" or "not_ready").
    pub status: &'static str,

    /// Signing key availability ("healthy" or "unavailable").
    pub jwks: &'static str,

    /// Error message (generic, no infrastructure details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `GET /new-session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
}
