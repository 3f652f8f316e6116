//! Chat Gateway configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! passed by reference into the key cache and token validator. Missing or
//! invalid required values fail startup immediately.

use common::jwt::MAX_LEEWAY;
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default JWKS cache TTL in seconds (1 hour).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 3600;

/// Default expiry leeway in seconds. Tokens are expired the second `exp` passes.
pub const DEFAULT_JWT_LEEWAY_SECONDS: u64 = 0;

/// Default allowed CORS origin (local chat frontend).
pub const DEFAULT_CORS_ALLOWED_ORIGINS: &str = "http://localhost:5173";

/// Algorithms accepted by default.
pub const DEFAULT_ALGORITHMS: &str = "RS256";

/// Default seconds to keep serving after a shutdown signal.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Longest accepted drain period.
const MAX_DRAIN_SECONDS: u64 = 300;

/// Output format for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Chat Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8000").
    pub bind_address: String,

    /// Identity provider domain (e.g., "tenant.eu.auth0.com").
    pub identity_domain: String,

    /// Base URL for JWKS and user-info calls (default: `https://{identity_domain}`).
    pub identity_base_url: String,

    /// Expected `aud` claim.
    pub api_audience: String,

    /// Accepted signing algorithms (RSA family only).
    pub algorithms: Vec<Algorithm>,

    /// How long a fetched key set is trusted before a refresh.
    pub jwks_cache_ttl_seconds: u64,

    /// Expiry leeway in seconds.
    pub jwt_leeway_seconds: u64,

    /// Origins allowed to call the API from a browser.
    pub cors_allowed_origins: Vec<String>,

    /// Log output format.
    pub log_format: LogFormat,

    /// Seconds to keep draining connections after SIGTERM/SIGINT (0 disables).
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("identity_domain", &self.identity_domain)
            .field("identity_base_url", &self.identity_base_url)
            .field("api_audience", &self.api_audience)
            .field("algorithms", &self.algorithms)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("jwt_leeway_seconds", &self.jwt_leeway_seconds)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("log_format", &self.log_format)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid identity domain: {0}")]
    InvalidIdentityDomain(String),

    #[error("Invalid identity base URL: {0}")]
    InvalidIdentityBaseUrl(String),

    #[error("Invalid algorithms configuration: {0}")]
    InvalidAlgorithms(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidJwksCacheTtl(String),

    #[error("Invalid JWT leeway configuration: {0}")]
    InvalidJwtLeeway(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("Invalid drain period: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let identity_domain = required(vars, "AUTH0_DOMAIN")?;
        if identity_domain.contains("://") || identity_domain.contains('/') {
            return Err(ConfigError::InvalidIdentityDomain(format!(
                "AUTH0_DOMAIN must be a bare host name without scheme or path, got '{}'",
                identity_domain
            )));
        }

        let api_audience = required(vars, "API_AUDIENCE")?;

        let identity_base_url = match vars.get("IDENTITY_BASE_URL") {
            Some(url) => {
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(ConfigError::InvalidIdentityBaseUrl(format!(
                        "IDENTITY_BASE_URL must start with http:// or https://, got '{}'",
                        url
                    )));
                }
                url.trim_end_matches('/').to_string()
            }
            None => format!("https://{}", identity_domain),
        };

        let algorithms = parse_algorithms(
            vars.get("ALGORITHMS")
                .map(String::as_str)
                .unwrap_or(DEFAULT_ALGORITHMS),
        )?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        // Parse JWKS cache TTL with validation
        let jwks_cache_ttl_seconds = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwksCacheTtl(
                    "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_JWKS_CACHE_TTL_SECONDS
        };

        // Parse expiry leeway with validation
        let jwt_leeway_seconds = if let Some(value_str) = vars.get("JWT_LEEWAY_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtLeeway(format!(
                    "JWT_LEEWAY_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_LEEWAY.as_secs() {
                return Err(ConfigError::InvalidJwtLeeway(format!(
                    "JWT_LEEWAY_SECONDS must not exceed {} seconds, got {}",
                    MAX_LEEWAY.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_JWT_LEEWAY_SECONDS
        };

        let cors_allowed_origins = split_list(
            vars.get("CORS_ALLOWED_ORIGINS")
                .map(String::as_str)
                .unwrap_or(DEFAULT_CORS_ALLOWED_ORIGINS),
        );

        let log_format = match vars.get("LOG_FORMAT").map(|s| s.to_ascii_lowercase()) {
            None => LogFormat::Pretty,
            Some(s) if s == "pretty" => LogFormat::Pretty,
            Some(s) if s == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidLogFormat(format!(
                    "LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                    other
                )))
            }
        };

        let drain_seconds = match vars.get("GATEWAY_DRAIN_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidDrainSeconds(format!(
                        "GATEWAY_DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value > MAX_DRAIN_SECONDS {
                    return Err(ConfigError::InvalidDrainSeconds(format!(
                        "GATEWAY_DRAIN_SECONDS must not exceed {} seconds, got {}",
                        MAX_DRAIN_SECONDS, value
                    )));
                }
                value
            }
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            bind_address,
            identity_domain,
            identity_base_url,
            api_audience,
            algorithms,
            jwks_cache_ttl_seconds,
            jwt_leeway_seconds,
            cors_allowed_origins,
            log_format,
            drain_seconds,
        })
    }

    /// Expected `iss` claim, derived from the identity domain.
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.identity_domain)
    }

    /// URL of the identity provider's JWKS document.
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.identity_base_url)
    }

    /// URL of the identity provider's user-info endpoint.
    pub fn userinfo_url(&self) -> String {
        format!("{}/userinfo", self.identity_base_url)
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parse a comma-separated algorithm list. Keys come from a JWKS as RSA
/// modulus/exponent pairs, so only RSA-family algorithms are usable.
fn parse_algorithms(value: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let names = split_list(value);
    if names.is_empty() {
        return Err(ConfigError::InvalidAlgorithms(
            "ALGORITHMS must name at least one algorithm".to_string(),
        ));
    }

    names
        .iter()
        .map(|name| {
            let alg = Algorithm::from_str(name).map_err(|_| {
                ConfigError::InvalidAlgorithms(format!("Unknown algorithm '{}'", name))
            })?;
            match alg {
                Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512 => Ok(alg),
                _ => Err(ConfigError::InvalidAlgorithms(format!(
                    "Algorithm '{}' is not an RSA algorithm",
                    name
                ))),
            }
        })
        .collect()
}
