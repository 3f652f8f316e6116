//! Service layer for the Chat Gateway.
//!
//! # Components
//!
//! - `chat_pipeline` - Seam to the response-generating chat pipeline

pub mod chat_pipeline;

pub use chat_pipeline::{
    ChatPipeline, ChatRequest, ChunkStream, EchoPipeline, PipelineError, TraceContext,
};
