//! RSA test keypairs and token builders.
//!
//! Two fixed 2048-bit keys are checked in under `fixtures/`: a primary key and
//! a "rotated" key used to exercise key rotation. Tokens are signed with
//! `jsonwebtoken` exactly as the identity provider would.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

/// Identity provider domain used by test configurations.
pub const TEST_DOMAIN: &str = "tenant.test.auth0.com";

/// Expected audience used by test configurations.
pub const TEST_AUDIENCE: &str = "https://chat.test.example/api";

/// Issuer derived from [`TEST_DOMAIN`].
pub const TEST_ISSUER: &str = "https://tenant.test.auth0.com/";

/// Key ID of the primary test key.
pub const PRIMARY_KID: &str = "test-key-primary";

/// Key ID of the rotated test key.
pub const ROTATED_KID: &str = "test-key-rotated";

const PRIMARY_PEM: &str = include_str!("../fixtures/primary_rsa_key.pem");
const ROTATED_PEM: &str = include_str!("../fixtures/rotated_rsa_key.pem");

const PRIMARY_MODULUS: &str = "xRAzb0tm2vlGhq13hTMB-HI2ZrbP5C3cE2L2466s_cwffTqrHu8FK6Iea10ZCtS98uRAk6kMvDihgdwAIo5umgxkFFC74WfcP5TP1zssoaYlzDeVZ-FUjWO8kP4KQJF6Yln5vytr3OXrdcbh__5wZwU3rQb82rPCYcEggsEhNmI4qPZBqEm3xggjnGpl8cIlPM0Vyenp7JGSFmM1_kgM1Bfl1v7p0KIyyVlZAx1uHqJ8H41a7bqUFmYDseggc5HFwngZdyu25A98GKL2JSwrKWXeFPJvIpIUztCtSrICWDvzfCRWHMPW6ytiavM3UVEAS-0i1-zkxZzr_HXz4ZmcOw";
const ROTATED_MODULUS: &str = "5168coTAfDLb5yBh4nrudZxZZdIxNXqWlcOajLzNrwLDJAA4K9dmg0V9aryGEzaUW4laJsCrvRz4AFR5zShM5pQJVrdv0S4mRZcYDz-xozjtSfjGfdph9FxrEVAr_VRu0qtbQH7_snsRLn7Lx-dmjDJpcqgdEA0u2f-Ll7JQv-FTFeGdCIXlEmxghm44f3WPtOynb8gIl1DooDNk2H2j_WS3TzuJEF7YFXyZSf3baXN7Fs1QTaUMY92KeI4YxtTkC8Z5Dy5t2AgavcGGebUnq-1oUTupBSsnYNrKg1g_2s8Bd9F10fCn_OfSr3Ru3YyM0Nl-oJuP7BbTytxhi2b5lw";
const PUBLIC_EXPONENT: &str = "AQAB";

/// Test keypair for signing tokens.
#[derive(Debug, Clone)]
pub struct TestKeypair {
    kid: String,
    private_pem: &'static str,
    modulus: &'static str,
}

impl TestKeypair {
    /// The primary signing key.
    pub fn primary() -> Self {
        Self {
            kid: PRIMARY_KID.to_string(),
            private_pem: PRIMARY_PEM,
            modulus: PRIMARY_MODULUS,
        }
    }

    /// A second, unrelated key standing in for the provider's next key.
    pub fn rotated() -> Self {
        Self {
            kid: ROTATED_KID.to_string(),
            private_pem: ROTATED_PEM,
            modulus: ROTATED_MODULUS,
        }
    }

    /// Same key material published under a different key ID.
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = kid.to_string();
        self
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Sign claims with RS256 and this key's `kid`.
    pub fn sign_token(&self, claims: &Value) -> String {
        self.sign_token_with_alg(claims, Algorithm::RS256)
    }

    /// Sign claims with an explicit RSA algorithm.
    pub fn sign_token_with_alg(&self, claims: &Value, alg: Algorithm) -> String {
        let mut header = Header::new(alg);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// Sign claims with a caller-built header.
    pub fn sign_with_header(&self, header: &Header, claims: &Value) -> String {
        let encoding_key = EncodingKey::from_rsa_pem(self.private_pem.as_bytes())
            .expect("Failed to load test RSA key");
        encode(header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// The public half as a JWKS entry.
    pub fn jwk_json(&self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": self.modulus,
            "e": PUBLIC_EXPONENT
        })
    }
}

/// A JWKS document publishing the given keys.
pub fn jwks_json(keys: &[&TestKeypair]) -> Value {
    json!({
        "keys": keys.iter().map(|k| k.jwk_json()).collect::<Vec<_>>()
    })
}

/// Claims accepted by a gateway configured with [`TEST_AUDIENCE`] and
/// [`TEST_ISSUER`]: valid for the next hour.
pub fn valid_claims() -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "auth0|test-user-1",
        "aud": TEST_AUDIENCE,
        "iss": TEST_ISSUER,
        "iat": now,
        "exp": now + 3600,
        "scope": "openid profile email"
    })
}

/// [`valid_claims`] with one claim replaced (or added).
pub fn claims_with(name: &str, value: Value) -> Value {
    let mut claims = valid_claims();
    if let Some(map) = claims.as_object_mut() {
        map.insert(name.to_string(), value);
    }
    claims
}

/// [`valid_claims`] with one claim removed.
pub fn claims_without(name: &str) -> Value {
    let mut claims = valid_claims();
    if let Some(map) = claims.as_object_mut() {
        map.remove(name);
    }
    claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[test]
    fn test_jwk_verifies_signed_token() {
        let keypair = TestKeypair::primary();
        let token = keypair.sign_token(&valid_claims());

        let jwk = keypair.jwk_json();
        let key = DecodingKey::from_rsa_components(
            jwk["n"].as_str().unwrap(),
            jwk["e"].as_str().unwrap(),
        )
        .unwrap();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[TEST_AUDIENCE]);
        validation.set_issuer(&[TEST_ISSUER]);

        let data = decode::<Value>(&token, &key, &validation).unwrap();
        assert_eq!(data.claims["sub"], "auth0|test-user-1");
        assert_eq!(data.header.kid.as_deref(), Some(PRIMARY_KID));
    }

    #[test]
    fn test_rotated_key_does_not_verify_primary_signature() {
        let token = TestKeypair::primary().sign_token(&valid_claims());

        let jwk = TestKeypair::rotated().jwk_json();
        let key = DecodingKey::from_rsa_components(
            jwk["n"].as_str().unwrap(),
            jwk["e"].as_str().unwrap(),
        )
        .unwrap();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[TEST_AUDIENCE]);

        assert!(decode::<Value>(&token, &key, &validation).is_err());
    }

    #[test]
    fn test_claims_helpers() {
        assert_eq!(claims_with("aud", json!("other"))["aud"], "other");
        assert!(claims_without("exp").get("exp").is_none());
        assert_eq!(jwks_json(&[&TestKeypair::primary()])["keys"][0]["kid"], PRIMARY_KID);
    }
}
