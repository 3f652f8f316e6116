//! Token validation integration tests.
//!
//! Runs real RS256 tokens through `TokenValidator` with the JWKS served by a
//! mocked identity provider.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use chat_gateway::auth::{
    AuthError, AuthSettings, KeyCache, KeyResolver, TokenValidator, RAW_TOKEN_CLAIM,
};
use chrono::Utc;
use gateway_test_utils::{
    claims_with, claims_without, jwks_json, jwks_request_count, jwks_url, mount_jwks,
    mount_jwks_sequence, mount_jwks_status, mount_slow_jwks, valid_claims, TestKeypair,
    PRIMARY_KID, TEST_AUDIENCE, TEST_ISSUER,
};
use jsonwebtoken::Algorithm;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

fn settings() -> AuthSettings {
    AuthSettings {
        audience: TEST_AUDIENCE.to_string(),
        issuer: TEST_ISSUER.to_string(),
        algorithms: vec![Algorithm::RS256],
        leeway_seconds: 0,
    }
}

fn validator_with(server: &MockServer, ttl: Duration, settings: &AuthSettings) -> TokenValidator {
    let cache = Arc::new(KeyCache::with_settings(
        jwks_url(server),
        ttl,
        Duration::from_millis(500),
    ));
    TokenValidator::new(Arc::new(KeyResolver::new(cache)), settings)
}

fn validator_for(server: &MockServer) -> TokenValidator {
    validator_with(server, Duration::from_secs(3600), &settings())
}

// =============================================================================
// Success
// =============================================================================

#[tokio::test]
async fn test_valid_token_returns_claims_and_raw_token() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    let token = keypair.sign_token(&valid_claims());
    let claims = validator.validate(&token).await?;

    assert_eq!(claims.sub(), Some("auth0|test-user-1"));
    assert_eq!(claims.get("scope"), Some(&json!("openid profile email")));
    assert_eq!(claims.raw_token(), Some(token.as_str()));
    assert_eq!(claims.get(RAW_TOKEN_CLAIM), Some(&json!(token)));

    Ok(())
}

#[tokio::test]
async fn test_audience_list_containing_expected_audience_accepted() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    let token = keypair.sign_token(&claims_with(
        "aud",
        json!([TEST_AUDIENCE, "https://tenant.test.auth0.com/userinfo"]),
    ));

    assert!(validator.validate(&token).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_repeated_validation_uses_cached_keys() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    for _ in 0..5 {
        let token = keypair.sign_token(&valid_claims());
        validator.validate(&token).await?;
    }

    assert_eq!(jwks_request_count(&idp).await, 1);

    Ok(())
}

#[tokio::test]
async fn test_leeway_accepts_recently_expired_token() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let mut lenient = settings();
    lenient.leeway_seconds = 60;
    let validator = validator_with(&idp, Duration::from_secs(3600), &lenient);

    let token = keypair.sign_token(&claims_with("exp", json!(Utc::now().timestamp() - 30)));

    assert!(validator.validate(&token).await.is_ok());

    Ok(())
}

// =============================================================================
// Header and signature failures
// =============================================================================

#[tokio::test]
async fn test_alg_none_is_invalid_header() -> Result<()> {
    let idp = MockServer::start().await;
    mount_jwks(&idp, &[&TestKeypair::primary()]).await;
    let validator = validator_for(&idp);

    // {"alg":"none","typ":"JWT","kid":"test-key-primary"} with valid claims
    let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIiwia2lkIjoidGVzdC1rZXktcHJpbWFyeSJ9.eyJzdWIiOiJhdXRoMHx0ZXN0LXVzZXItMSIsImF1ZCI6Imh0dHBzOi8vY2hhdC50ZXN0LmV4YW1wbGUvYXBpIiwiaXNzIjoiaHR0cHM6Ly90ZW5hbnQudGVzdC5hdXRoMC5jb20vIiwiZXhwIjo0MTAyNDQ0ODAwfQ.";

    let result = validator.validate(token).await;

    assert_eq!(result.unwrap_err(), AuthError::InvalidHeader);
    assert_eq!(jwks_request_count(&idp).await, 0);

    Ok(())
}

#[tokio::test]
async fn test_disallowed_algorithm_is_signature_invalid() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    let token = keypair.sign_token_with_alg(&valid_claims(), Algorithm::RS384);

    let result = validator.validate(&token).await;

    assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);

    Ok(())
}

#[tokio::test]
async fn test_configured_alternative_algorithm_accepted() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let mut both = settings();
    both.algorithms = vec![Algorithm::RS256, Algorithm::RS384];
    let validator = validator_with(&idp, Duration::from_secs(3600), &both);

    let token = keypair.sign_token_with_alg(&valid_claims(), Algorithm::RS384);

    assert!(validator.validate(&token).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_wrong_signing_key_is_signature_invalid() -> Result<()> {
    let idp = MockServer::start().await;
    mount_jwks(&idp, &[&TestKeypair::primary()]).await;
    let validator = validator_for(&idp);

    // Rotated key material claiming the primary key's ID
    let forged = TestKeypair::rotated().with_kid(PRIMARY_KID);
    let token = forged.sign_token(&valid_claims());

    let result = validator.validate(&token).await;

    assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);

    Ok(())
}

#[tokio::test]
async fn test_tampered_payload_is_signature_invalid() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    let token = keypair.sign_token(&valid_claims());
    let other = keypair.sign_token(&claims_with("sub", json!("auth0|someone-else")));

    // Header and signature from one token, payload from another
    let (header, rest) = token.split_once('.').unwrap();
    let (_, signature) = rest.split_once('.').unwrap();
    let (_, other_rest) = other.split_once('.').unwrap();
    let (other_payload, _) = other_rest.split_once('.').unwrap();
    let spliced = format!("{header}.{other_payload}.{signature}");

    let result = validator.validate(&spliced).await;

    assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);

    Ok(())
}

// =============================================================================
// Claim failures
// =============================================================================

#[tokio::test]
async fn test_expired_token_rejected_without_fetching_keys() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    let token = keypair.sign_token(&claims_with("exp", json!(Utc::now().timestamp() - 60)));

    let result = validator.validate(&token).await;

    assert_eq!(result.unwrap_err(), AuthError::Expired);
    assert_eq!(jwks_request_count(&idp).await, 0);

    Ok(())
}

#[tokio::test]
async fn test_wrong_audience_is_claims_mismatch() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    let token = keypair.sign_token(&claims_with("aud", json!("https://other.example/api")));

    let result = validator.validate(&token).await;

    assert_eq!(result.unwrap_err(), AuthError::ClaimsMismatch);

    Ok(())
}

#[tokio::test]
async fn test_wrong_issuer_is_claims_mismatch() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    // Missing trailing slash is a different issuer
    let token = keypair.sign_token(&claims_with("iss", json!("https://tenant.test.auth0.com")));

    let result = validator.validate(&token).await;

    assert_eq!(result.unwrap_err(), AuthError::ClaimsMismatch);

    Ok(())
}

#[tokio::test]
async fn test_missing_required_claims_are_claims_mismatch() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    for claim in ["exp", "aud", "iss"] {
        let token = keypair.sign_token(&claims_without(claim));
        let result = validator.validate(&token).await;
        assert_eq!(
            result.unwrap_err(),
            AuthError::ClaimsMismatch,
            "missing {claim}"
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_not_yet_valid_token_is_claims_mismatch() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    let token = keypair.sign_token(&claims_with("nbf", json!(Utc::now().timestamp() + 600)));

    let result = validator.validate(&token).await;

    assert_eq!(result.unwrap_err(), AuthError::ClaimsMismatch);

    Ok(())
}

// =============================================================================
// Key resolution
// =============================================================================

#[tokio::test]
async fn test_rotated_key_picked_up_with_one_refresh() -> Result<()> {
    let idp = MockServer::start().await;
    let primary = TestKeypair::primary();
    let rotated = TestKeypair::rotated();
    mount_jwks_sequence(
        &idp,
        vec![jwks_json(&[&primary]), jwks_json(&[&primary, &rotated])],
    )
    .await;
    let validator = validator_for(&idp);

    // Prime the cache with the pre-rotation key set
    validator.validate(&primary.sign_token(&valid_claims())).await?;
    assert_eq!(jwks_request_count(&idp).await, 1);

    // First token from the new key forces exactly one refresh
    let claims = validator.validate(&rotated.sign_token(&valid_claims())).await?;
    assert_eq!(claims.sub(), Some("auth0|test-user-1"));
    assert_eq!(jwks_request_count(&idp).await, 2);

    // Later tokens from the new key hit the cache
    validator.validate(&rotated.sign_token(&valid_claims())).await?;
    assert_eq!(jwks_request_count(&idp).await, 2);

    Ok(())
}

#[tokio::test]
async fn test_unknown_kid_is_key_not_found_after_one_refresh() -> Result<()> {
    let idp = MockServer::start().await;
    mount_jwks(&idp, &[&TestKeypair::primary()]).await;
    let validator = validator_for(&idp);

    let token = TestKeypair::primary()
        .with_kid("unknown-key")
        .sign_token(&valid_claims());

    let result = validator.validate(&token).await;

    assert_eq!(result.unwrap_err(), AuthError::KeyNotFound);
    // Initial fetch plus exactly one forced refresh
    assert_eq!(jwks_request_count(&idp).await, 2);

    Ok(())
}

#[tokio::test]
async fn test_unreachable_provider_without_cache_is_fetch_error() -> Result<()> {
    let idp = MockServer::start().await;
    mount_jwks_status(&idp, 503).await;
    let validator = validator_for(&idp);

    let token = TestKeypair::primary().sign_token(&valid_claims());

    let result = validator.validate(&token).await;

    assert!(matches!(result.unwrap_err(), AuthError::FetchError(_)));

    Ok(())
}

#[tokio::test]
async fn test_stale_keys_used_when_refresh_fails() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_with(&idp, Duration::from_millis(200), &settings());

    validator.validate(&keypair.sign_token(&valid_claims())).await?;

    // Provider goes down and the cached set expires
    idp.reset().await;
    mount_jwks_status(&idp, 500).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let claims = validator.validate(&keypair.sign_token(&valid_claims())).await?;
    assert_eq!(claims.sub(), Some("auth0|test-user-1"));

    Ok(())
}

#[tokio::test]
async fn test_unknown_kid_with_failing_refresh_is_key_not_found() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    validator.validate(&keypair.sign_token(&valid_claims())).await?;

    idp.reset().await;
    mount_jwks_status(&idp, 500).await;

    let token = TestKeypair::rotated().sign_token(&valid_claims());
    let result = validator.validate(&token).await;

    assert_eq!(result.unwrap_err(), AuthError::KeyNotFound);

    Ok(())
}

#[tokio::test]
async fn test_forced_refresh_timeout_keeps_cached_keys() -> Result<()> {
    let idp = MockServer::start().await;
    let keypair = TestKeypair::primary();
    mount_jwks(&idp, &[&keypair]).await;
    let validator = validator_for(&idp);

    validator.validate(&keypair.sign_token(&valid_claims())).await?;

    // Provider now answers slower than the 500ms fetch timeout
    idp.reset().await;
    mount_slow_jwks(&idp, &[&keypair], Duration::from_secs(2)).await;

    let unknown = TestKeypair::rotated().sign_token(&valid_claims());
    let result = validator.validate(&unknown).await;
    assert_eq!(result.unwrap_err(), AuthError::KeyNotFound);
    assert_eq!(jwks_request_count(&idp).await, 1);

    // The timed-out refresh left the cached keys in place
    let claims = validator.validate(&keypair.sign_token(&valid_claims())).await?;
    assert_eq!(claims.sub(), Some("auth0|test-user-1"));
    assert_eq!(jwks_request_count(&idp).await, 1);

    Ok(())
}
