//! Signing key resolution.
//!
//! Maps a token header's `kid` to a key from the [`KeyCache`]. A miss forces
//! exactly one refresh before giving up, which is how rotated keys are picked
//! up between scheduled refreshes.

use crate::auth::jwks::{FetchError, KeyCache, SigningKey};
use common::jwt::TokenHeader;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No key with the requested ID, even after a forced refresh.
    #[error("Signing key not found")]
    NotFound,

    /// Keys could not be fetched and none were cached.
    #[error("Signing keys unavailable: {0}")]
    Unavailable(FetchError),
}

/// Looks up signing keys by ID.
pub struct KeyResolver {
    cache: Arc<KeyCache>,
}

impl KeyResolver {
    pub fn new(cache: Arc<KeyCache>) -> Self {
        Self { cache }
    }

    /// Resolve the signing key for a token header.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the first lookup cannot fetch keys and nothing is cached
    /// - `NotFound` if the key is absent after one forced refresh, or that
    ///   refresh fails
    #[instrument(
        skip(self, header),
        name = "gateway.auth.resolve",
        fields(kid = %header.kid, outcome = tracing::field::Empty)
    )]
    pub async fn resolve(&self, header: &TokenHeader) -> Result<SigningKey, ResolveError> {
        let result = self.resolve_inner(header).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(ResolveError::NotFound) => "not_found",
            Err(ResolveError::Unavailable(_)) => "unavailable",
        };
        tracing::Span::current().record("outcome", outcome);

        result
    }

    async fn resolve_inner(&self, header: &TokenHeader) -> Result<SigningKey, ResolveError> {
        let kid = header.kid.as_str();

        let current = match self.cache.get(false).await {
            Ok(set) => set,
            Err(e) => match self.cache.cached().await {
                Some(stale) => {
                    tracing::warn!(
                        target: "gateway.auth.jwks",
                        error = %e,
                        "JWKS refresh failed, resolving against stale keys"
                    );
                    stale
                }
                None => return Err(ResolveError::Unavailable(e)),
            },
        };

        if let Some(key) = current.find(kid) {
            tracing::debug!(target: "gateway.auth.jwks", kid = %kid, "Signing key found in cache");
            return Ok(key.clone());
        }

        tracing::debug!(target: "gateway.auth.jwks", kid = %kid, "Signing key not cached, forcing JWKS refresh");

        let refreshed = self.cache.get(true).await.map_err(|e| {
            tracing::warn!(
                target: "gateway.auth.jwks",
                kid = %kid,
                error = %e,
                "Forced JWKS refresh failed"
            );
            ResolveError::NotFound
        })?;

        refreshed.find(kid).cloned().ok_or_else(|| {
            tracing::warn!(target: "gateway.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
            ResolveError::NotFound
        })
    }
}
