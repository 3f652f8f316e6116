//! JWT structural utilities shared across the gateway crates.
//!
//! This module provides the pieces of token handling that need no keys
//! and no network:
//! - Size limits for DoS prevention
//! - Unverified header parsing (`alg`, `kid`, `typ`)
//! - Unverified `exp` extraction for early expiry rejection
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned here is trusted: the header only selects a key, and the
//!   token MUST still be verified against that key
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::parse_unverified;
//!
//! let unverified = parse_unverified(token)?;
//!
//! // Use kid to look up the signing key from the JWKS cache
//! let key = resolver.resolve(&unverified.header).await?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// - Typical identity-provider access tokens are 700-1500 bytes (RS256 signature
///   alone is 342 base64url characters)
/// - 8KB leaves room for custom claims while bounding base64 decode work
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Maximum allowed expiry leeway (10 minutes).
///
/// Prevents misconfiguration that would keep expired tokens usable for
/// an unreasonably long time.
pub const MAX_LEEWAY: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while parsing a token's unverified parts.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,
}

// =============================================================================
// Header Types
// =============================================================================

/// The unverified JOSE header of a token.
///
/// Only used to pick a signing key. Discarded once the key is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Algorithm name as written in the token (e.g. `RS256`).
    pub alg: String,

    /// Key ID used to select the signing key from the JWKS.
    pub kid: String,

    /// Optional media type (usually `JWT`).
    pub typ: Option<String>,
}

/// Unverified view of a token: its header plus the `exp` claim, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedToken {
    /// Parsed header.
    pub header: TokenHeader,

    /// `exp` claim (Unix epoch seconds), if the payload carries one.
    pub exp: Option<i64>,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: Option<serde_json::Value>,
    kid: Option<serde_json::Value>,
    typ: Option<serde_json::Value>,
}

// =============================================================================
// Functions
// =============================================================================

/// Parse the header and `exp` claim of a JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The returned `exp` may only be used to reject tokens early, never to
///   accept them
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong segment count, bad base64, invalid JSON, missing
///   or non-string `alg`, or a non-numeric `exp`
/// - `MissingKid` - Header has no `kid`, or `kid` is empty or not a string
pub fn parse_unverified(token: &str) -> Result<UnverifiedToken, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(payload_part), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(
            target: "common.jwt",
            parts = token.split('.').count(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    };

    let header = parse_header(header_part)?;
    let exp = parse_exp(payload_part)?;

    Ok(UnverifiedToken { header, exp })
}

fn decode_segment(segment: &str, what: &'static str) -> Result<Vec<u8>, JwtValidationError> {
    URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = what, error = %e, "Failed to decode JWT base64");
        JwtValidationError::MalformedToken
    })
}

fn parse_header(segment: &str) -> Result<TokenHeader, JwtValidationError> {
    let header_bytes = decode_segment(segment, "header")?;

    let raw: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = raw
        .alg
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MalformedToken)?;

    // Extract kid as string, rejecting empty values
    let kid = raw
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    let typ = raw
        .typ
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string);

    Ok(TokenHeader { alg, kid, typ })
}

fn parse_exp(segment: &str) -> Result<Option<i64>, JwtValidationError> {
    let payload_bytes = decode_segment(segment, "payload")?;

    let payload: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&payload_bytes).map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT payload JSON");
            JwtValidationError::MalformedToken
        })?;

    match payload.get("exp") {
        None => Ok(None),
        Some(value) => {
            // Truncation is intended: fractional seconds do not extend validity
            #[allow(clippy::cast_possible_truncation)]
            let exp = value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f as i64))
                .ok_or_else(|| {
                    tracing::debug!(target: "common.jwt", "Token rejected: non-numeric exp claim");
                    JwtValidationError::MalformedToken
                })?;
            Ok(Some(exp))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn b64(s: &str) -> String {
        URL_SAFE_NO_PAD.encode(s)
    }

    fn token_with(header: &str, payload: &str) -> String {
        format!("{}.{}.signature", b64(header), b64(payload))
    }

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_max_leeway_is_10_minutes() {
        assert_eq!(MAX_LEEWAY, Duration::from_secs(600));
    }

    #[test]
    fn test_parse_unverified_valid_token() {
        let token = token_with(
            r#"{"alg":"RS256","typ":"JWT","kid":"key-01"}"#,
            r#"{"sub":"auth0|abc","exp":1700000000}"#,
        );

        let parsed = parse_unverified(&token).unwrap();

        assert_eq!(parsed.header.alg, "RS256");
        assert_eq!(parsed.header.kid, "key-01");
        assert_eq!(parsed.header.typ.as_deref(), Some("JWT"));
        assert_eq!(parsed.exp, Some(1_700_000_000));
    }

    #[test]
    fn test_parse_unverified_without_exp() {
        let token = token_with(r#"{"alg":"RS256","kid":"k"}"#, r#"{"sub":"x"}"#);

        let parsed = parse_unverified(&token).unwrap();
        assert_eq!(parsed.exp, None);
        assert!(parsed.header.typ.is_none());
    }

    #[test]
    fn test_parse_unverified_fractional_exp_truncates() {
        let token = token_with(r#"{"alg":"RS256","kid":"k"}"#, r#"{"exp":1700000000.9}"#);

        let parsed = parse_unverified(&token).unwrap();
        assert_eq!(parsed.exp, Some(1_700_000_000));
    }

    #[test]
    fn test_parse_unverified_non_numeric_exp() {
        let token = token_with(r#"{"alg":"RS256","kid":"k"}"#, r#"{"exp":"tomorrow"}"#);

        assert_eq!(
            parse_unverified(&token),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_unverified_missing_kid() {
        let token = token_with(r#"{"alg":"RS256","typ":"JWT"}"#, "{}");

        assert_eq!(parse_unverified(&token), Err(JwtValidationError::MissingKid));
    }

    #[test]
    fn test_parse_unverified_empty_kid() {
        let token = token_with(r#"{"alg":"RS256","kid":""}"#, "{}");

        assert_eq!(parse_unverified(&token), Err(JwtValidationError::MissingKid));
    }

    #[test]
    fn test_parse_unverified_non_string_kid() {
        let token = token_with(r#"{"alg":"RS256","kid":12345}"#, "{}");

        assert_eq!(parse_unverified(&token), Err(JwtValidationError::MissingKid));
    }

    #[test]
    fn test_parse_unverified_missing_alg() {
        let token = token_with(r#"{"kid":"k"}"#, "{}");

        assert_eq!(
            parse_unverified(&token),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_unverified_wrong_segment_count() {
        assert_eq!(
            parse_unverified("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            parse_unverified("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(parse_unverified(""), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_parse_unverified_invalid_base64() {
        assert_eq!(
            parse_unverified("!!!invalid!!!.payload.signature"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_unverified_invalid_header_json() {
        let token = format!("{}.{}.sig", b64("not-json"), b64("{}"));

        assert_eq!(
            parse_unverified(&token),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_unverified_payload_not_an_object() {
        let token = token_with(r#"{"alg":"RS256","kid":"k"}"#, "[1,2,3]");

        assert_eq!(
            parse_unverified(&token),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_unverified_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);

        assert_eq!(
            parse_unverified(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_parse_unverified_at_size_limit() {
        let header_b64 = b64(r#"{"alg":"RS256","kid":"key"}"#);
        let payload_b64 = b64("{}");
        let sig_len = MAX_JWT_SIZE_BYTES - header_b64.len() - payload_b64.len() - 2;
        let token = format!("{header_b64}.{payload_b64}.{}", "s".repeat(sig_len));

        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);
        assert!(parse_unverified(&token).is_ok(), "Token at size limit should be accepted");
    }

    #[test]
    fn test_error_messages_are_generic() {
        for err in [
            JwtValidationError::TokenTooLarge,
            JwtValidationError::MalformedToken,
            JwtValidationError::MissingKid,
        ] {
            assert_eq!(err.to_string(), "The access token is invalid or expired");
        }
    }
}
