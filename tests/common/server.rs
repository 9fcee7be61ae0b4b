//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own site and databases.

use super::constants::*;
use super::fixtures::create_test_site;
use bx_mcp_server::config::{AppConfig, CliConfig};
use bx_mcp_server::server::{make_app, RequestsLoggingLevel, ServerState};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated fixture site and database directory
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Document root of the fixture site, for tests that edit it
    pub document_root: PathBuf,

    /// Shared state, for direct service access in tests
    pub state: ServerState,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port with the gateway enabled
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawns a new test server, letting the caller adjust the configuration
    ///
    /// # Panics
    ///
    /// Panics if the fixture site cannot be created, the port cannot be
    /// bound or the server doesn't become ready within timeout.
    pub async fn spawn_with<F: FnOnce(&mut CliConfig)>(customize: F) -> Self {
        let (temp_dir, document_root, db_dir) =
            create_test_site().expect("Failed to create test site");

        let mut cli = CliConfig {
            db_dir: Some(db_dir),
            document_root: Some(document_root.clone()),
            logging_level: RequestsLoggingLevel::None,
            embedding_url: UNREACHABLE_EMBEDDING_URL.to_string(),
            embedding_timeout_sec: 1,
            admin_key: Some(ADMIN_KEY.to_string()),
            ..Default::default()
        };
        customize(&mut cli);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        cli.port = port;
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = AppConfig::resolve(&cli, None).expect("Failed to resolve config");
        let state = ServerState::from_config(&config).expect("Failed to build server state");
        let app = make_app(state.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            document_root,
            state,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling `GET /`
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
