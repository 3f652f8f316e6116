//! HTTP request handlers for the Chat Gateway.

pub mod chat;
pub mod health;
pub mod metrics;
pub mod session;

pub use chat::chat;
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use session::new_session;
