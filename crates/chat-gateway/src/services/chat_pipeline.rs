//! Chat pipeline seam.
//!
//! The gateway authenticates and labels requests; turning an input into
//! response chunks is delegated to a [`ChatPipeline`]. The model-backed
//! implementation lives outside this crate. [`EchoPipeline`] is the default
//! wiring and [`mock::MockChatPipeline`] serves tests.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stream of response chunks. An `Err` item ends the stream.
pub type ChunkStream = BoxStream<'static, Result<String, PipelineError>>;

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub input: String,
    pub session_id: String,
}

/// Labels attached to the trace of one chat exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub session_id: String,

    /// Email when the user-info lookup succeeded, otherwise the token's `sub`.
    pub user_id: String,

    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline could not start.
    #[error("Chat pipeline unavailable: {0}")]
    Unavailable(String),

    /// Generation failed after streaming began.
    #[error("Chat stream failed: {0}")]
    Stream(String),
}

/// Produces response chunks for a chat input.
#[async_trait]
pub trait ChatPipeline: Send + Sync {
    async fn stream(
        &self,
        request: ChatRequest,
        trace: TraceContext,
    ) -> Result<ChunkStream, PipelineError>;
}

/// Returns the input unchanged as a single chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoPipeline;

#[async_trait]
impl ChatPipeline for EchoPipeline {
    async fn stream(
        &self,
        request: ChatRequest,
        trace: TraceContext,
    ) -> Result<ChunkStream, PipelineError> {
        tracing::debug!(
            target: "gateway.services.chat",
            session_id = %trace.session_id,
            "Echoing chat input"
        );
        Ok(stream::iter([Ok(request.input)]).boxed())
    }
}

/// Mock chat pipeline module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Mock chat pipeline with scripted output.
    pub struct MockChatPipeline {
        /// Chunks to yield, in order.
        chunks: Vec<String>,
        /// Yield a `Stream` error after this many chunks.
        fail_after: Option<usize>,
        /// Fail before producing a stream.
        fail_on_start: bool,
        /// Number of calls made.
        call_count: AtomicUsize,
        /// Trace context of the most recent call.
        last_trace: Mutex<Option<TraceContext>>,
    }

    impl MockChatPipeline {
        /// Create a mock that streams the given chunks.
        pub fn with_chunks<I, S>(chunks: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                chunks: chunks.into_iter().map(Into::into).collect(),
                fail_after: None,
                fail_on_start: false,
                call_count: AtomicUsize::new(0),
                last_trace: Mutex::new(None),
            }
        }

        /// Create a mock that streams `chunks`, then fails.
        pub fn failing_after<I, S>(chunks: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let mut mock = Self::with_chunks(chunks);
            mock.fail_after = Some(mock.chunks.len());
            mock
        }

        /// Create a mock that fails before streaming.
        pub fn unavailable() -> Self {
            let mut mock = Self::with_chunks(Vec::<String>::new());
            mock.fail_on_start = true;
            mock
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Trace context passed to the most recent call.
        pub async fn last_trace(&self) -> Option<TraceContext> {
            self.last_trace.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatPipeline for MockChatPipeline {
        async fn stream(
            &self,
            _request: ChatRequest,
            trace: TraceContext,
        ) -> Result<ChunkStream, PipelineError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            *self.last_trace.lock().await = Some(trace);

            if self.fail_on_start {
                return Err(PipelineError::Unavailable(
                    "Mock chat pipeline error".to_string(),
                ));
            }

            let mut items: Vec<Result<String, PipelineError>> =
                self.chunks.iter().cloned().map(Ok).collect();
            if self.fail_after.is_some() {
                items.push(Err(PipelineError::Stream(
                    "Mock chat stream error".to_string(),
                )));
            }

            Ok(stream::iter(items).boxed())
        }
    }

}
