//! Chat Gateway Library
//!
//! HTTP front door for a streaming chat service. Every chat request carries a
//! bearer access token issued by an external identity provider; the gateway
//! validates it against the provider's published signing keys before any
//! response is generated.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> services/*.rs
//!                        |
//!                        v
//!          auth/jwt.rs -> auth/resolver.rs -> auth/jwks.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key cache, key resolution, token validation, user-info lookup
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Response models
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Chat pipeline seam

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
