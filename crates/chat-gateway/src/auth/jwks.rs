//! Key cache for the identity provider's JWKS.
//!
//! Fetches the signing keys from `/.well-known/jwks.json` and keeps the last
//! successful result as an immutable [`SigningKeySet`] snapshot.
//!
//! # Concurrency
//!
//! - Readers clone an `Arc` to the current snapshot under a read lock
//! - Fetches are serialized by a refresh gate; the snapshot lock is only
//!   write-locked for the final pointer swap, never across the network call
//! - Callers that queue up behind an in-flight fetch reuse its result, success
//!   or failure, instead of fetching again
//! - A failed fetch never touches the cached snapshot

use crate::observability::metrics::record_jwks_refresh;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL in seconds (1 hour).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Default timeout for the JWKS request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure to obtain a key set from the identity provider.
///
/// Carries enough detail for logs. Never shown to clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("JWKS request timed out")]
    Timeout,

    #[error("JWKS request failed: {0}")]
    Transport(String),

    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    #[error("JWKS response could not be parsed: {0}")]
    InvalidBody(String),
}

impl FetchError {
    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::InvalidBody(_) => "invalid_body",
        }
    }
}

/// A public signing key published by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    /// Key type (e.g. "RSA").
    pub kty: String,

    /// Key ID - matched against the token header's `kid`.
    pub kid: String,

    /// Key use (usually "sig").
    pub key_use: Option<String>,

    /// Algorithm the key is intended for, if published.
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    pub n: String,

    /// RSA exponent (base64url).
    pub e: String,
}

impl SigningKey {
    /// Build a verification key from the RSA components.
    pub fn decoding_key(&self) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        DecodingKey::from_rsa_components(&self.n, &self.e)
    }
}

/// An immutable snapshot of the provider's keys.
///
/// Replaced wholesale by each successful refresh.
#[derive(Debug, Clone)]
pub struct SigningKeySet {
    keys: Vec<SigningKey>,
    fetched_at: Instant,
}

impl SigningKeySet {
    /// Create a key set stamped with the instant its fetch started.
    pub fn new(keys: Vec<SigningKey>, fetched_at: Instant) -> Self {
        Self { keys, fetched_at }
    }

    /// Find a key by ID.
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// An empty set is never fresh.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        !self.keys.is_empty() && self.fetched_at.elapsed() < ttl
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// JWK entry as published. Every field is optional so that one unusable
/// entry does not reject the whole document.
#[derive(Debug, Deserialize)]
struct RawJwk {
    #[serde(default)]
    kty: Option<String>,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default, rename = "use")]
    key_use: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

/// JWKS document.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    #[serde(default)]
    keys: Vec<serde_json::Value>,
}

fn parse_keys(document: JwksDocument) -> Vec<SigningKey> {
    document
        .keys
        .into_iter()
        .filter_map(|value| {
            let raw: RawJwk = match serde_json::from_value(value) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!(target: "gateway.auth.jwks", error = %e, "Skipping malformed JWK entry");
                    return None;
                }
            };

            match (raw.kid, raw.n, raw.e) {
                (Some(kid), Some(n), Some(e)) if !kid.is_empty() => Some(SigningKey {
                    kty: raw.kty.unwrap_or_default(),
                    kid,
                    key_use: raw.key_use,
                    alg: raw.alg,
                    n,
                    e,
                }),
                (kid, _, _) => {
                    tracing::debug!(
                        target: "gateway.auth.jwks",
                        kid = ?kid,
                        "Skipping JWK without kid or RSA components"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Outcome of the most recent failed fetch.
#[derive(Debug, Clone)]
struct FailedFetch {
    completed_at: Instant,
    error: FetchError,
}

/// Process-wide cache of the identity provider's signing keys.
pub struct KeyCache {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Current snapshot, if any fetch has succeeded.
    snapshot: RwLock<Option<Arc<SigningKeySet>>>,

    /// Serializes fetches. Holds the last failure until a fetch succeeds so
    /// that callers queued behind a failing fetch share its error.
    refresh_gate: Mutex<Option<FailedFetch>>,

    /// Cache TTL duration.
    cache_ttl: Duration,
}

impl KeyCache {
    /// Create a key cache with the default TTL and timeout.
    pub fn new(jwks_url: String) -> Self {
        Self::with_ttl(jwks_url, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    /// Create a key cache with a custom TTL.
    pub fn with_ttl(jwks_url: String, cache_ttl: Duration) -> Self {
        Self::with_settings(jwks_url, cache_ttl, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a key cache with a custom TTL and request timeout.
    pub fn with_settings(jwks_url: String, cache_ttl: Duration, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gateway.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            snapshot: RwLock::new(None),
            refresh_gate: Mutex::new(None),
            cache_ttl,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Current snapshot without any network activity. May be stale.
    pub async fn cached(&self) -> Option<Arc<SigningKeySet>> {
        self.snapshot.read().await.clone()
    }

    /// Get the provider's keys.
    ///
    /// Without `force_refresh`, a fresh non-empty snapshot is returned with no
    /// network call. Otherwise the JWKS is fetched and the snapshot replaced,
    /// unless a fetch that started after this call was made already did so.
    /// Callers that waited on a fetch which failed get that fetch's error
    /// instead of trying again, so a caller waits for at most one fetch
    /// beyond the one already in flight.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the endpoint cannot be reached, times out,
    /// answers with a non-2xx status or returns a body that is not a JWKS.
    /// The cached snapshot is left untouched in that case.
    #[instrument(
        skip(self),
        name = "gateway.auth.jwks.get",
        fields(force_refresh = force_refresh, outcome = tracing::field::Empty)
    )]
    pub async fn get(&self, force_refresh: bool) -> Result<Arc<SigningKeySet>, FetchError> {
        let result = self.get_inner(force_refresh).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        tracing::Span::current().record("outcome", outcome);

        result
    }

    async fn get_inner(&self, force_refresh: bool) -> Result<Arc<SigningKeySet>, FetchError> {
        let requested_at = Instant::now();

        if !force_refresh {
            if let Some(current) = self.cached().await {
                if current.is_fresh(self.cache_ttl) {
                    tracing::debug!(target: "gateway.auth.jwks", key_count = current.len(), "JWKS cache hit");
                    return Ok(current);
                }
            }
        }

        let mut gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited for the gate
        if let Some(current) = self.cached().await {
            let refreshed_since_request = current.fetched_at() >= requested_at;
            if refreshed_since_request || (!force_refresh && current.is_fresh(self.cache_ttl)) {
                tracing::debug!(target: "gateway.auth.jwks", "Reusing JWKS fetched by a concurrent refresh");
                return Ok(current);
            }
        }

        // ...or failed while we waited
        if let Some(failed) = gate.as_ref() {
            if failed.completed_at >= requested_at {
                tracing::debug!(
                    target: "gateway.auth.jwks",
                    error_kind = failed.error.kind(),
                    "Reusing failure of a concurrent JWKS refresh"
                );
                return Err(failed.error.clone());
            }
        }

        let started = Instant::now();
        let result = self.fetch(started).await;
        let elapsed = started.elapsed();

        match result {
            Ok(set) => {
                record_jwks_refresh("success", elapsed);
                tracing::info!(
                    target: "gateway.auth.jwks",
                    key_count = set.len(),
                    force_refresh,
                    "JWKS cache refreshed"
                );

                let set = Arc::new(set);
                *self.snapshot.write().await = Some(Arc::clone(&set));
                *gate = None;
                Ok(set)
            }
            Err(e) => {
                record_jwks_refresh("error", elapsed);
                tracing::warn!(
                    target: "gateway.auth.jwks",
                    error = %e,
                    error_kind = e.kind(),
                    "JWKS refresh failed, keeping previous keys"
                );
                *gate = Some(FailedFetch {
                    completed_at: Instant::now(),
                    error: e.clone(),
                });
                Err(e)
            }
        }
    }

    async fn fetch(&self, started: Instant) -> Result<SigningKeySet, FetchError> {
        tracing::debug!(target: "gateway.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let document: JwksDocument = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::InvalidBody(e.to_string())
            }
        })?;

        Ok(SigningKeySet::new(parse_keys(document), started))
    }
}
