//! Test server harness for E2E testing
//!
//! Provides `TestCoordinatorServer` for spawning real coordinator instances
//! in tests.

use meeting_coordinator::actors::{ActorMetrics, ConnectionRegistry, MeetingDirectory};
use meeting_coordinator::config::Config;
use meeting_coordinator::meeting::build_ice_servers;
use meeting_coordinator::middleware::AuthState;
use meeting_coordinator::routes::{build_routes, AppState};
use meeting_coordinator::transport::Heartbeat;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test harness for spawning the Meeting Coordinator in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_ice_servers_e2e() -> Result<(), anyhow::Error> {
///     let server = TestCoordinatorServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/api/ice-servers", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestCoordinatorServer {
    addr: SocketAddr,
    directory: Arc<MeetingDirectory>,
    metrics: Arc<ActorMetrics>,
    config: Config,
    cancel_token: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestCoordinatorServer {
    /// Spawn a server with default configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_config(Config::default()).await
    }

    /// Spawn a server with the given configuration.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0), ignoring
    ///   `config.bind_address`
    /// - Start the HTTP + WebSocket server in the background
    pub async fn spawn_with_config(config: Config) -> Result<Self, anyhow::Error> {
        let cancel_token = CancellationToken::new();
        let metrics = ActorMetrics::new();

        let connections = Arc::new(ConnectionRegistry::new(
            config.outbound_buffer,
            cancel_token.child_token(),
            Arc::clone(&metrics),
        ));
        let directory = Arc::new(MeetingDirectory::new(
            connections,
            build_ice_servers(config.turn_server.as_ref()),
            config.auto_spotlight_threshold,
            Arc::clone(&metrics),
            cancel_token.child_token(),
        ));

        let state = Arc::new(AppState {
            directory: Arc::clone(&directory),
            heartbeat: Heartbeat {
                interval: config.heartbeat_interval,
                timeout: config.heartbeat_timeout,
            },
        });
        let auth_state = Arc::new(AuthState {
            api_token: config.api_token.clone(),
        });

        // Build routes using the coordinator's real route builder
        let app = build_routes(state, auth_state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let server_token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await });
            if let Err(e) = server.await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            directory,
            metrics,
            config,
            cancel_token,
            _handle: handle,
        })
    }

    /// Spawn a server whose heartbeat fires within milliseconds.
    pub async fn spawn_with_heartbeat(
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        Self::spawn_with_config(Config {
            heartbeat_interval: interval,
            heartbeat_timeout: timeout,
            ..Config::default()
        })
        .await
    }

    /// Spawn a server whose REST API requires `token`.
    pub async fn spawn_with_api_token(token: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with_config(Config {
            api_token: Some(secrecy::SecretString::from(token.to_string())),
            ..Config::default()
        })
        .await
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the signaling WebSocket URL.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Live meetings and memberships behind the server.
    pub fn directory(&self) -> &Arc<MeetingDirectory> {
        &self.directory
    }

    /// Actor counters shared with the server.
    pub fn metrics(&self) -> &Arc<ActorMetrics> {
        &self.metrics
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Poll until `condition` holds or `timeout` elapses.
    pub async fn wait_until<F>(&self, timeout: Duration, mut condition: F) -> bool
    where
        F: FnMut(&Self) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if condition(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition(self)
    }

    /// End every meeting and stop accepting connections.
    pub async fn shutdown(&self) {
        self.directory.shutdown().await;
        self.cancel_token.cancel();
    }
}

impl Drop for TestCoordinatorServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestCoordinatorServer::spawn().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.ws_url().ends_with("/ws"));

        let response = reqwest::get(format!("{}/api/ice-servers", server.url())).await?;
        assert_eq!(response.status(), 200);

        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_servers_different_ports() -> Result<(), anyhow::Error> {
        let server1 = TestCoordinatorServer::spawn().await?;
        let server2 = TestCoordinatorServer::spawn().await?;

        assert_ne!(server1.addr(), server2.addr());
        assert_eq!(server1.directory().meeting_count(), 0);

        Ok(())
    }
}
