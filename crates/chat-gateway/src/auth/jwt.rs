//! Bearer token validation.
//!
//! Validates access tokens issued by the identity provider against the keys
//! published in its JWKS.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only the configured RSA algorithms are accepted
//! - `exp`, `aud` and `iss` are required and checked; `nbf` is checked when present
//! - Every failure is reported as an [`AuthError`] whose message is generic;
//!   the specific kind goes to logs and metrics only

use crate::auth::claims::ClaimsPayload;
use crate::auth::jwks::FetchError;
use crate::auth::resolver::{KeyResolver, ResolveError};
use crate::config::Config;
use crate::observability::metrics::record_token_validation;
use common::jwt::parse_unverified;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::Instrument;

/// Authentication failure.
///
/// Display output is identical for every variant so that it can never leak
/// which check failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Token is not a well-formed JWT, has no `kid`, or names an unknown algorithm.
    #[error("The access token is invalid or expired")]
    InvalidHeader,

    /// No signing key matches the token's `kid`.
    #[error("The access token is invalid or expired")]
    KeyNotFound,

    /// Signature does not verify, or the algorithm is not allowed.
    #[error("The access token is invalid or expired")]
    SignatureInvalid,

    /// `exp` is in the past.
    #[error("The access token is invalid or expired")]
    Expired,

    /// Audience, issuer or another registered claim does not match.
    #[error("The access token is invalid or expired")]
    ClaimsMismatch,

    /// The identity provider's keys could not be fetched.
    #[error("The access token is invalid or expired")]
    FetchError(FetchError),
}

impl AuthError {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidHeader => "invalid_header",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::Expired => "expired",
            AuthError::ClaimsMismatch => "claims_mismatch",
            AuthError::FetchError(_) => "fetch_error",
        }
    }
}

impl From<ResolveError> for AuthError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound => AuthError::KeyNotFound,
            ResolveError::Unavailable(e) => AuthError::FetchError(e),
        }
    }
}

/// Expected claim values and accepted algorithms.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub audience: String,
    pub issuer: String,
    pub algorithms: Vec<Algorithm>,
    pub leeway_seconds: u64,
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            audience: config.api_audience.clone(),
            issuer: config.issuer(),
            algorithms: config.algorithms.clone(),
            leeway_seconds: config.jwt_leeway_seconds,
        }
    }
}

/// Validates bearer tokens against the provider's published keys.
pub struct TokenValidator {
    resolver: Arc<KeyResolver>,
    settings: AuthSettings,
}

impl TokenValidator {
    pub fn new(resolver: Arc<KeyResolver>, settings: &AuthSettings) -> Self {
        Self {
            resolver,
            settings: settings.clone(),
        }
    }

    /// Validate a token and return its claims.
    ///
    /// # Checks
    ///
    /// 1. Size and structure; `kid` present; `alg` is a known algorithm name
    /// 2. Unverified `exp` already past -> `Expired`, before any key lookup
    /// 3. Signing key resolved by `kid` (one forced JWKS refresh on a miss)
    /// 4. Signature, `exp`, `nbf`, `aud` and `iss` verified
    ///
    /// On success the raw token is attached to the claims under `_raw_token`.
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` variant for the first check that fails.
    pub async fn validate(&self, token: &str) -> Result<ClaimsPayload, AuthError> {
        let span = tracing::info_span!(
            target: "gateway.auth.jwt",
            "gateway.auth.validate",
            outcome = tracing::field::Empty
        );
        let started = Instant::now();

        let result = self.validate_inner(token).instrument(span.clone()).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        span.record("outcome", outcome);
        record_token_validation(outcome, started.elapsed());

        result
    }

    async fn validate_inner(&self, token: &str) -> Result<ClaimsPayload, AuthError> {
        // 1. Structural checks (includes size check via common::jwt)
        let unverified = parse_unverified(token).map_err(|e| {
            tracing::debug!(target: "gateway.auth.jwt", error = ?e, "Token header parsing failed");
            AuthError::InvalidHeader
        })?;

        let algorithm = Algorithm::from_str(&unverified.header.alg).map_err(|_| {
            tracing::debug!(target: "gateway.auth.jwt", alg = %unverified.header.alg, "Unknown token algorithm");
            AuthError::InvalidHeader
        })?;

        // 2. Reject expired tokens without touching the key cache
        if let Some(exp) = unverified.exp {
            let leeway = i64::try_from(self.settings.leeway_seconds).unwrap_or(0);
            let now = chrono::Utc::now().timestamp();
            if exp < now.saturating_sub(leeway) {
                tracing::debug!(target: "gateway.auth.jwt", exp, now, "Token expired");
                return Err(AuthError::Expired);
            }
        }

        // 3. Resolve the signing key
        let key = self.resolver.resolve(&unverified.header).await.map_err(|e| {
            tracing::debug!(target: "gateway.auth.jwt", kid = %unverified.header.kid, error = %e, "Signing key resolution failed");
            AuthError::from(e)
        })?;

        let decoding_key = key.decoding_key().map_err(|e| {
            tracing::warn!(target: "gateway.auth.jwt", kid = %key.kid, error = %e, "Unusable RSA key material in JWKS");
            AuthError::SignatureInvalid
        })?;

        // 4. Verify signature and claims
        let mut validation = Validation::new(algorithm);
        validation.algorithms = self.settings.algorithms.clone();
        validation.leeway = self.settings.leeway_seconds;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_audience(&[self.settings.audience.as_str()]);
        validation.set_issuer(&[self.settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);

        let token_data =
            decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|e| {
                let mapped = map_verification_error(e.kind());
                tracing::debug!(
                    target: "gateway.auth.jwt",
                    error = %e,
                    kind = mapped.kind(),
                    "Token verification failed"
                );
                mapped
            })?;

        tracing::debug!(target: "gateway.auth.jwt", kid = %key.kid, "Token validated successfully");
        Ok(ClaimsPayload::new(token_data.claims, token))
    }
}

fn map_verification_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthError::ClaimsMismatch,
        _ => AuthError::SignatureInvalid,
    }
}
