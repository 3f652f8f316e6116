//! Authentication for the Chat Gateway.
//!
//! - `jwks` - Key cache over the identity provider's JWKS endpoint
//! - `resolver` - Maps a token's `kid` to a signing key, refreshing on a miss
//! - `jwt` - Token validation and the `AuthError` taxonomy
//! - `claims` - Validated claims payload
//! - `userinfo` - Best-effort email lookup for session labeling

pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod resolver;
pub mod userinfo;

pub use claims::{ClaimsPayload, RAW_TOKEN_CLAIM};
pub use jwks::{FetchError, KeyCache, SigningKey, SigningKeySet};
pub use jwt::{AuthError, AuthSettings, TokenValidator};
pub use resolver::{KeyResolver, ResolveError};
pub use userinfo::UserInfoClient;
