//! Chat Gateway
//!
//! Entry point for the streaming chat API. Validates bearer tokens against the
//! identity provider's JWKS and streams chat responses over SSE.

use chat_gateway::auth::{AuthSettings, KeyCache, KeyResolver, TokenValidator, UserInfoClient};
use chat_gateway::config::{Config, LogFormat};
use chat_gateway::observability::metrics::init_metrics_recorder;
use chat_gateway::routes::{self, AppState};
use chat_gateway::services::EchoPipeline;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first: it selects the log format
    let config = Config::from_env();

    let log_format = config
        .as_ref()
        .map(|c| c.log_format)
        .unwrap_or(LogFormat::Pretty);
    init_tracing(log_format);

    info!("Starting Chat Gateway");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        identity_domain = %config.identity_domain,
        audience = %config.api_audience,
        algorithms = ?config.algorithms,
        jwks_cache_ttl_seconds = config.jwks_cache_ttl_seconds,
        jwt_leeway_seconds = config.jwt_leeway_seconds,
        drain_seconds = config.drain_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Authentication stack
    let key_cache = Arc::new(KeyCache::with_ttl(
        config.jwks_url(),
        Duration::from_secs(config.jwks_cache_ttl_seconds),
    ));
    let resolver = Arc::new(KeyResolver::new(key_cache.clone()));
    let validator = Arc::new(TokenValidator::new(
        resolver,
        &AuthSettings::from_config(&config),
    ));
    let user_info = UserInfoClient::new(config.userinfo_url());

    // Warm the key cache; failure is not fatal, keys are fetched on demand
    match key_cache.get(false).await {
        Ok(keys) => info!(key_count = keys.len(), "JWKS loaded"),
        Err(e) => warn!(error = %e, "Initial JWKS fetch failed, will retry on first request"),
    }

    let bind_address = config.bind_address.clone();
    let drain = Duration::from_secs(config.drain_seconds);

    let state = Arc::new(AppState {
        config,
        key_cache,
        validator,
        user_info,
        pipeline: Arc::new(EchoPipeline),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Chat Gateway listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain))
        .await?;

    info!("Chat Gateway shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "chat_gateway=info,gateway=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    // Graceful shutdown drain period
    if drain.is_zero() {
        info!("Skipping drain period (GATEWAY_DRAIN_SECONDS=0)");
    } else {
        warn!("Draining connections for {} seconds...", drain.as_secs());
        tokio::time::sleep(drain).await;
        info!("Drain period complete");
    }
}
