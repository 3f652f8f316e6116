//! # Gateway Test Utilities
//!
//! Shared test utilities for the Chat Gateway.
//!
//! This crate provides:
//! - RSA test keypairs and token signing (`TestKeypair`)
//! - Identity provider mocks on top of `wiremock` (`jwks_mock`)
//! - Server test harness (`TestGatewayServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let idp = wiremock::MockServer::start().await;
//!     let keypair = TestKeypair::primary();
//!     mount_jwks(&idp, &[&keypair]).await;
//!
//!     let server = TestGatewayServer::spawn(&idp.uri()).await?;
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/chat", server.url()))
//!         .bearer_auth(keypair.sign_token(&valid_claims()))
//!         .json(&serde_json::json!({"input": "hi", "session_id": "s"}))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod jwks_mock;
pub mod keys;
pub mod server_harness;

// Re-export commonly used items
pub use jwks_mock::*;
pub use keys::*;
pub use server_harness::*;
