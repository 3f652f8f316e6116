//! Health check handlers.
//!
//! - `/health`: Liveness check - returns OK if the process is running
//! - `/ready`: Readiness check - checks that signing keys can be obtained

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness check handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check handler.
///
/// Ready when the key cache yields a non-empty key set. Uses the cached set
/// while it is fresh, so repeated checks do not hammer the identity provider.
///
/// Error messages are intentionally generic; the cause is logged.
#[tracing::instrument(skip_all, name = "gateway.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let failure = match state.key_cache.get(false).await {
        Ok(keys) if !keys.is_empty() => None,
        Ok(_) => Some("JWKS contains no usable keys".to_string()),
        Err(e) => Some(e.to_string()),
    };

    match failure {
        None => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                jwks: "healthy",
                error: None,
            }),
        ),
        Some(reason) => {
            tracing::warn!(target: "gateway.health", reason = %reason, "Readiness check failed: signing keys unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    jwks: "unavailable",
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let result = health_check().await;
        assert_eq!(result, "OK");
    }
}
