//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, validates it with
//! the [`TokenValidator`], and injects the [`ClaimsPayload`] into request
//! extensions.

use crate::auth::{ClaimsPayload, TokenValidator};
use crate::errors::GatewayError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token validator backed by the JWKS key cache.
    pub validator: Arc<TokenValidator>,
}

/// Extract the Bearer token from the Authorization header.
///
/// The scheme is matched case-insensitively.
fn extract_bearer_token(req: &Request) -> Result<&str, GatewayError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "gateway.middleware.auth", "Missing Authorization header");
            GatewayError::Unauthorized("Missing Authorization header".to_string())
        })?;

    match auth_header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => {
            tracing::debug!(target: "gateway.middleware.auth", "Invalid Authorization header format");
            Err(GatewayError::Unauthorized(
                "Invalid Authorization header format".to_string(),
            ))
        }
    }
}

/// Authentication middleware for bearer tokens.
///
/// # Response
///
/// - Returns 401 Unauthorized with `WWW-Authenticate` if the token is missing or invalid
/// - Continues to next handler with `ClaimsPayload` in extensions if the token is valid
#[instrument(skip_all, name = "gateway.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GatewayError> {
    let token = extract_bearer_token(&req)?;

    let claims: ClaimsPayload = state.validator.validate(token).await?;

    // Store claims in request extensions for downstream handlers
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
