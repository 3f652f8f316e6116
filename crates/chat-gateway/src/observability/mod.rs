//! Observability module for the Chat Gateway.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
