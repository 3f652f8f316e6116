//! Chat handler.
//!
//! Streams the chat pipeline's output to the client as Server-Sent Events:
//! one `data: <chunk>` event per chunk, then `data: [DONE]`. A pipeline
//! failure mid-stream emits a single generic error event and ends the stream.
//!
//! Each stream is recorded once when it ends: completed, interrupted by the
//! pipeline, or dropped because the client disconnected.

use crate::auth::ClaimsPayload;
use crate::errors::GatewayError;
use crate::observability::metrics::record_chat_stream;
use crate::routes::AppState;
use crate::services::{ChatRequest, ChunkStream, TraceContext};
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Terminal event after the last chunk.
pub const DONE_EVENT: &str = "[DONE]";

/// Event sent when the pipeline fails mid-stream. Details are only logged.
pub const STREAM_ERROR_EVENT: &str = "Error: stream interrupted";

/// Label used when neither the user-info lookup nor the token yields an identity.
const ANONYMOUS_USER: &str = "anonymous";

/// Longest the stream start waits on the user-info lookup before labeling
/// the session by subject instead.
const USER_LABEL_BUDGET: Duration = Duration::from_millis(500);

/// Handler for POST /chat
///
/// Requires the auth middleware: reads the validated [`ClaimsPayload`] from
/// request extensions.
///
/// # Errors
///
/// - 400 if `input` or `session_id` is blank
/// - 503 if the pipeline cannot start
#[tracing::instrument(skip_all, name = "gateway.handlers.chat")]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<ClaimsPayload>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if request.input.trim().is_empty() {
        return Err(GatewayError::BadRequest(
            "input must not be empty".to_string(),
        ));
    }
    if request.session_id.trim().is_empty() {
        return Err(GatewayError::BadRequest(
            "session_id must not be empty".to_string(),
        ));
    }

    let user_id = resolve_user_label(&state, &claims).await;

    let trace = TraceContext {
        session_id: request.session_id.clone(),
        user_id,
        tags: vec!["chat".to_string()],
    };

    let session_id = request.session_id.clone();
    let chunks = state.pipeline.stream(request, trace).await.map_err(|e| {
        tracing::error!(target: "gateway.handlers.chat", error = %e, "Chat pipeline failed to start");
        GatewayError::ServiceUnavailable(e.to_string())
    })?;

    Ok(Sse::new(sse_events(chunks, session_id)))
}

/// Session label: the token's `email` claim, else the provider's user-info
/// email, else `sub`.
///
/// The user-info call is capped at [`USER_LABEL_BUDGET`] so a slow provider
/// delays the first event by at most that much.
async fn resolve_user_label(state: &AppState, claims: &ClaimsPayload) -> String {
    if let Some(email) = claims.email() {
        return email.to_string();
    }

    if let Some(token) = claims.raw_token() {
        match tokio::time::timeout(USER_LABEL_BUDGET, state.user_info.lookup_email(token)).await {
            Ok(Some(email)) => return email,
            Ok(None) => {}
            Err(_) => {
                tracing::debug!(
                    target: "gateway.handlers.chat",
                    budget_ms = USER_LABEL_BUDGET.as_millis() as u64,
                    "User-info lookup exceeded label budget"
                );
            }
        }
    }

    tracing::debug!(target: "gateway.handlers.chat", "No email available, labeling session by subject");
    claims
        .sub()
        .map(ToString::to_string)
        .unwrap_or_else(|| ANONYMOUS_USER.to_string())
}

/// Pipeline chunks plus what the stream metrics need.
///
/// `chunks` is `None` once the final event has been produced; dropping the
/// stream before that counts as a client disconnect.
struct ChatStream {
    chunks: Option<ChunkStream>,
    session_id: String,
    started: Instant,
    sent: u64,
}

impl ChatStream {
    fn finish(&mut self, outcome: &'static str) {
        self.chunks = None;
        record_chat_stream(outcome, self.started.elapsed(), self.sent);
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        if self.chunks.is_some() {
            tracing::debug!(
                target: "gateway.handlers.chat",
                session_id = %self.session_id,
                chunks = self.sent,
                "Client disconnected mid-stream"
            );
            record_chat_stream("disconnected", self.started.elapsed(), self.sent);
        }
    }
}

/// Turn pipeline chunks into SSE events, appending `[DONE]` on success.
fn sse_events(
    chunks: ChunkStream,
    session_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let state = ChatStream {
        chunks: Some(chunks),
        session_id,
        started: Instant::now(),
        sent: 0,
    };

    stream::unfold(state, |mut state| async move {
        let next = state.chunks.as_mut()?.next().await;
        let event = match next {
            Some(Ok(chunk)) => {
                state.sent += 1;
                return Some((Event::default().data(chunk), state));
            }
            Some(Err(e)) => {
                tracing::error!(
                    target: "gateway.handlers.chat",
                    session_id = %state.session_id,
                    error = %e,
                    "Chat stream interrupted"
                );
                state.finish("interrupted");
                Event::default().data(STREAM_ERROR_EVENT)
            }
            None => {
                tracing::debug!(
                    target: "gateway.handlers.chat",
                    session_id = %state.session_id,
                    chunks = state.sent,
                    "Chat stream complete"
                );
                state.finish("completed");
                Event::default().data(DONE_EVENT)
            }
        };
        Some((event, state))
    })
    .map(Ok)
}
