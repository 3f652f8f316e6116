//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.

use crate::keys::{TEST_AUDIENCE, TEST_DOMAIN};
use chat_gateway::auth::{AuthSettings, KeyCache, KeyResolver, TokenValidator, UserInfoClient};
use chat_gateway::config::Config;
use chat_gateway::routes::{self, AppState};
use chat_gateway::services::chat_pipeline::mock::MockChatPipeline;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Test harness for spawning the Chat Gateway in E2E tests.
///
/// The identity provider is whatever answers at `identity_base_url`
/// (usually a `wiremock::MockServer`); the chat pipeline is a
/// [`MockChatPipeline`] the test can inspect.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let idp = MockServer::start().await;
///     let server = TestGatewayServer::spawn(&idp.uri()).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    key_cache: Arc<KeyCache>,
    pipeline: Arc<MockChatPipeline>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a server whose pipeline streams `["Hello", ", world"]`.
    pub async fn spawn(identity_base_url: &str) -> Result<Self, anyhow::Error> {
        let pipeline = Arc::new(MockChatPipeline::with_chunks(["Hello", ", world"]));
        Self::spawn_with_pipeline(identity_base_url, pipeline).await
    }

    /// Spawn a server with a caller-provided pipeline.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use [`TEST_DOMAIN`] / [`TEST_AUDIENCE`] for claim checks
    /// - Fetch keys and user info from `identity_base_url`
    /// - Use short network timeouts so failure tests stay fast
    pub async fn spawn_with_pipeline(
        identity_base_url: &str,
        pipeline: Arc<MockChatPipeline>,
    ) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            ("AUTH0_DOMAIN".to_string(), TEST_DOMAIN.to_string()),
            ("API_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            (
                "IDENTITY_BASE_URL".to_string(),
                identity_base_url.to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let key_cache = Arc::new(KeyCache::with_settings(
            config.jwks_url(),
            Duration::from_secs(config.jwks_cache_ttl_seconds),
            Duration::from_secs(1),
        ));
        let validator = Arc::new(TokenValidator::new(
            Arc::new(KeyResolver::new(key_cache.clone())),
            &AuthSettings::from_config(&config),
        ));
        let user_info = UserInfoClient::with_timeout(config.userinfo_url(), Duration::from_secs(1));

        let state = Arc::new(AppState {
            config: config.clone(),
            key_cache: key_cache.clone(),
            validator,
            user_info,
            pipeline: pipeline.clone(),
        });

        // Unregistered recorder: renders an empty exposition, but keeps
        // tests independent of the process-global recorder.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        // Build routes using the gateway's real route builder
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            key_cache,
            pipeline,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The server's key cache.
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.key_cache
    }

    /// The server's chat pipeline.
    pub fn pipeline(&self) -> &Arc<MockChatPipeline> {
        &self.pipeline
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so each test cleans up immediately.
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::MockServer;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let idp = MockServer::start().await;
        let server = TestGatewayServer::spawn(&idp.uri()).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_addr() -> Result<(), anyhow::Error> {
        let idp = MockServer::start().await;
        let server = TestGatewayServer::spawn(&idp.uri()).await?;

        let addr = server.addr();
        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.url(), format!("http://{}", addr));
        assert_eq!(server.config().issuer(), "https://tenant.test.auth0.com/");

        Ok(())
    }
}
