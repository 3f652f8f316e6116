//! Validated claims payload.
//!
//! Holds every claim of a validated token as delivered by the provider,
//! plus the raw token under [`RAW_TOKEN_CLAIM`] so handlers can reuse the
//! credential for the user-info lookup. Debug output redacts `sub` and the
//! raw token.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Reserved claim name under which the raw bearer token is stored.
pub const RAW_TOKEN_CLAIM: &str = "_raw_token";

/// Claims of a successfully validated token.
#[derive(Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClaimsPayload {
    claims: Map<String, Value>,
}

impl ClaimsPayload {
    /// Wrap verified claims and attach the raw token.
    pub fn new(mut claims: Map<String, Value>, raw_token: &str) -> Self {
        claims.insert(
            RAW_TOKEN_CLAIM.to_string(),
            Value::String(raw_token.to_string()),
        );
        Self { claims }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Subject (provider user ID).
    pub fn sub(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    /// Email claim, when the provider includes one in the access token.
    pub fn email(&self) -> Option<&str> {
        self.get("email")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The bearer token these claims were extracted from.
    pub fn raw_token(&self) -> Option<&str> {
        self.get(RAW_TOKEN_CLAIM).and_then(Value::as_str)
    }
}

impl fmt::Debug for ClaimsPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.claims {
            if name == "sub" || name == RAW_TOKEN_CLAIM {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> ClaimsPayload {
        let claims = json!({
            "sub": "auth0|secret-user-id",
            "aud": "https://chat.example.com/api",
            "exp": 1_900_000_000,
            "email": "user@example.com"
        });
        ClaimsPayload::new(
            claims.as_object().unwrap().clone(),
            "header.payload.signature",
        )
    }

    #[test]
    fn test_raw_token_is_attached() {
        let claims = payload();
        assert_eq!(claims.raw_token(), Some("header.payload.signature"));
        assert_eq!(
            claims.get(RAW_TOKEN_CLAIM),
            Some(&Value::String("header.payload.signature".to_string()))
        );
    }

    #[test]
    fn test_accessors() {
        let claims = payload();
        assert_eq!(claims.sub(), Some("auth0|secret-user-id"));
        assert_eq!(claims.email(), Some("user@example.com"));
        assert_eq!(claims.get("exp"), Some(&json!(1_900_000_000)));
        assert!(claims.get("missing").is_none());
    }

    #[test]
    fn test_empty_email_is_none() {
        let mut map = Map::new();
        map.insert("email".to_string(), json!(""));
        let claims = ClaimsPayload::new(map, "t");
        assert!(claims.email().is_none());
        assert!(claims.sub().is_none());
    }

    #[test]
    fn test_debug_redacts_sub_and_token() {
        let debug_str = format!("{:?}", payload());

        assert!(
            !debug_str.contains("secret-user-id"),
            "Debug output should not contain sub value"
        );
        assert!(
            !debug_str.contains("header.payload.signature"),
            "Debug output should not contain the raw token"
        );
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("https://chat.example.com/api"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let value = serde_json::to_value(payload()).unwrap();

        assert_eq!(value["sub"], "auth0|secret-user-id");
        assert_eq!(value[RAW_TOKEN_CLAIM], "header.payload.signature");
    }
}
