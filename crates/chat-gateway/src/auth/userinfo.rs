//! Best-effort user-info lookup.
//!
//! Resolves the email address behind an already-validated access token. The
//! result only labels sessions and traces; it never takes part in
//! authorization, so every failure degrades to `None`.

use crate::observability::metrics::record_userinfo_lookup;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

/// Default timeout for the user-info request.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    #[serde(default)]
    email: Option<String>,
}

/// Client for the identity provider's `/userinfo` endpoint.
#[derive(Clone)]
pub struct UserInfoClient {
    userinfo_url: String,
    http_client: reqwest::Client,
}

impl UserInfoClient {
    pub fn new(userinfo_url: String) -> Self {
        Self::with_timeout(userinfo_url, DEFAULT_LOOKUP_TIMEOUT)
    }

    pub fn with_timeout(userinfo_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gateway.auth.userinfo", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            userinfo_url,
            http_client,
        }
    }

    /// Look up the email for a bearer token.
    ///
    /// Returns `None` on timeout, transport failure, non-2xx status, a body
    /// that is not JSON, or a missing/empty `email`.
    #[instrument(skip_all, name = "gateway.auth.userinfo", fields(outcome = tracing::field::Empty))]
    pub async fn lookup_email(&self, token: &str) -> Option<String> {
        let result = self.fetch_email(token).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(status) => *status,
        };
        record_userinfo_lookup(outcome);
        tracing::Span::current().record("outcome", outcome);

        result.ok()
    }

    /// Email for `token`, or the bounded failure label.
    async fn fetch_email(&self, token: &str) -> Result<String, &'static str> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "gateway.auth.userinfo", error = %e, "User-info request failed");
                failure_label(&e)
            })?;

        if !response.status().is_success() {
            tracing::warn!(
                target: "gateway.auth.userinfo",
                status = %response.status(),
                "User-info endpoint returned error"
            );
            return Err("error");
        }

        let body: UserInfoResponse = response.json().await.map_err(|e| {
            tracing::warn!(target: "gateway.auth.userinfo", error = %e, "Failed to parse user-info response");
            failure_label(&e)
        })?;

        body.email.filter(|email| !email.is_empty()).ok_or_else(|| {
            tracing::debug!(target: "gateway.auth.userinfo", "User-info response has no email");
            "not_found"
        })
    }
}

fn failure_label(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else {
        "error"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_userinfo_response_deserialization() {
        let body: UserInfoResponse =
            serde_json::from_str(r#"{"sub":"auth0|1","email":"user@example.com","name":"U"}"#)
                .unwrap();
        assert_eq!(body.email.as_deref(), Some("user@example.com"));

        let body: UserInfoResponse = serde_json::from_str(r#"{"sub":"auth0|1"}"#).unwrap();
        assert!(body.email.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_returns_none() {
        let client = UserInfoClient::with_timeout(
            "http://127.0.0.1:9/userinfo".to_string(),
            Duration::from_millis(500),
        );

        assert!(client.lookup_email("token").await.is_none());
    }
}
