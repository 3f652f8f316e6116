//! Identity provider mocks.
//!
//! Mounts JWKS and user-info endpoints on a `wiremock::MockServer` and counts
//! the requests they receive.

use crate::keys::{jwks_json, TestKeypair};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Path of the JWKS document.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Path of the user-info endpoint.
pub const USERINFO_PATH: &str = "/userinfo";

/// JWKS URL on a mock server.
pub fn jwks_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), JWKS_PATH)
}

/// User-info URL on a mock server.
pub fn userinfo_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), USERINFO_PATH)
}

/// Serve a fixed JWKS.
pub async fn mount_jwks(server: &MockServer, keys: &[&TestKeypair]) {
    mount_jwks_body(server, jwks_json(keys)).await;
}

/// Serve an arbitrary JSON body at the JWKS path.
pub async fn mount_jwks_body(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve a fixed JWKS after a delay.
pub async fn mount_slow_jwks(server: &MockServer, keys: &[&TestKeypair], delay: Duration) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_json(keys))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Answer the JWKS path with an error status.
pub async fn mount_jwks_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Answer the JWKS path with a fixed response (status, body, delay).
pub async fn mount_jwks_response(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Serves a different JWKS on each fetch: response `i` is `documents[i]`,
/// and the last document repeats once the list is exhausted.
pub struct SequencedJwks {
    documents: Vec<Value>,
    calls: AtomicUsize,
}

impl SequencedJwks {
    pub fn new(documents: Vec<Value>) -> Self {
        Self {
            documents,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Respond for SequencedJwks {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self
            .documents
            .get(call)
            .or_else(|| self.documents.last())
            .cloned()
            .unwrap_or_else(|| json!({"keys": []}));
        ResponseTemplate::new(200).set_body_json(body)
    }
}

/// Serve a sequence of JWKS documents (see [`SequencedJwks`]).
pub async fn mount_jwks_sequence(server: &MockServer, documents: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(SequencedJwks::new(documents))
        .mount(server)
        .await;
}

/// Serve a user-info document with the given email for `token`.
pub async fn mount_userinfo(server: &MockServer, token: &str, email: &str) {
    Mock::given(method("GET"))
        .and(path(USERINFO_PATH))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "auth0|test-user-1",
            "email": email,
            "email_verified": true
        })))
        .mount(server)
        .await;
}

/// Answer the user-info path with a fixed response for any token.
pub async fn mount_userinfo_response(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(USERINFO_PATH))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Number of requests the mock server received on `request_path`.
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == request_path)
        .count()
}

/// Number of JWKS fetches the mock server received.
pub async fn jwks_request_count(server: &MockServer) -> usize {
    request_count(server, JWKS_PATH).await
}
