//! Metrics definitions for the Chat Gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gateway_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: route templates from the router, plus `/other`
//! - `status`: bounded by code (success, error, timeout, ...)
//! - `outcome`: `success` or one of the six authentication failure kinds;
//!   for chat streams `completed`, `interrupted` or `disconnected`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return its render handle.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
                30.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetches are bounded by the 5s request timeout
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_jwks_refresh".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        // Validation is sub-millisecond on a cache hit, seconds on a refresh
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_token_validation".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.050, 0.100, 0.500, 1.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        // Streams run for as long as the model keeps producing
        .set_buckets_for_metric(
            Matcher::Full("gateway_chat_stream_duration_seconds".to_string()),
            &[0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0],
        )
        .map_err(|e| format!("Failed to set chat stream buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gateway_http_requests_total`, `gateway_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// `endpoint` must be a route template (or `/other`), never a raw path.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let status = categorize_status_code(status_code);

    histogram!("gateway_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gateway_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

// ============================================================================
// Chat Stream Metrics
// ============================================================================

/// Record the end of a chat SSE stream
///
/// Metric: `gateway_chat_streams_total`, `gateway_chat_stream_duration_seconds`,
/// `gateway_chat_stream_chunks_total`
/// Labels: `outcome` (`completed`, `interrupted`, `disconnected`)
///
/// Duration runs from the first poll of the stream to its final event, or
/// to the moment the client went away.
pub fn record_chat_stream(outcome: &'static str, duration: Duration, chunks: u64) {
    histogram!("gateway_chat_stream_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());

    counter!("gateway_chat_streams_total", "outcome" => outcome).increment(1);
    counter!("gateway_chat_stream_chunks_total", "outcome" => outcome).increment(chunks);
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record a JWKS fetch
///
/// Metric: `gateway_jwks_refresh_total`, `gateway_jwks_refresh_duration_seconds`
/// Labels: `status`
pub fn record_jwks_refresh(status: &'static str, duration: Duration) {
    histogram!("gateway_jwks_refresh_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());

    counter!("gateway_jwks_refresh_total", "status" => status).increment(1);
}

/// Record a token validation
///
/// Metric: `gateway_token_validations_total`, `gateway_token_validation_duration_seconds`
/// Labels: `outcome`
pub fn record_token_validation(outcome: &'static str, duration: Duration) {
    histogram!("gateway_token_validation_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());

    counter!("gateway_token_validations_total", "outcome" => outcome).increment(1);
}

/// Record a user-info lookup
///
/// Metric: `gateway_userinfo_lookups_total`
/// Labels: `status` (`success`, `not_found`, `error`, `timeout`)
pub fn record_userinfo_lookup(status: &'static str) {
    counter!("gateway_userinfo_lookups_total", "status" => status).increment(1);
}

// ============================================================================
// Tests
// ============================================================================
