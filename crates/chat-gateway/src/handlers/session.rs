//! Chat session handler.

use crate::models::NewSessionResponse;
use axum::Json;
use uuid::Uuid;

/// Handler for GET /new-session
///
/// Issues a fresh session ID. Sessions carry no server-side state here; the
/// ID only groups a conversation's requests and traces.
pub async fn new_session() -> Json<NewSessionResponse> {
    Json(NewSessionResponse {
        session_id: Uuid::new_v4().to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_session_returns_unique_uuid_v4() {
        let Json(first) = new_session().await;
        let Json(second) = new_session().await;

        let parsed = Uuid::parse_str(&first.session_id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(first.session_id, second.session_id);
    }
}
