//! Test server management

use bytes::Bytes;
use gcsdrop::{create_router, AppState, Config, StorageBackend};
use gcsdrop_storage::{EphemeralStore, ObjectStore};
use portpicker::pick_unused_port;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{GcsDropClient, DEFAULT_BUCKET, STARTUP_TIMEOUT_SECS};

/// A running gcsdrop server backed by an in-memory bucket
pub struct TestServer {
    /// The task running the server
    handle: JoinHandle<()>,
    /// The port the server is running on
    port: u16,
    /// Base URL
    base_url: String,
    store: Arc<EphemeralStore>,
}

impl TestServer {
    /// Start a server on a random available port with the default bucket
    pub async fn start() -> Result<Self, TestError> {
        Self::start_with_bucket(DEFAULT_BUCKET).await
    }

    /// Start a server whose bucket has the given name (may be empty)
    pub async fn start_with_bucket(bucket: &str) -> Result<Self, TestError> {
        Self::start_with_store(Arc::new(EphemeralStore::new(bucket))).await
    }

    /// Start a server around an existing store
    pub async fn start_with_store(store: Arc<EphemeralStore>) -> Result<Self, TestError> {
        let port = pick_unused_port().ok_or(TestError::NoPortAvailable)?;

        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = port;
        config.storage.bucket = store.bucket().to_string();
        config.storage.backend = StorageBackend::Memory;

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|_| TestError::PortInUse(port))?;

        info!(port = port, "Starting gcsdrop test server");

        let app = create_router(AppState::new(config, store.clone()));
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "Test server exited");
            }
        });

        let base_url = format!("http://127.0.0.1:{}", port);
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_secs(STARTUP_TIMEOUT_SECS) {
            if let Ok(response) = reqwest::get(format!("{}/health", base_url)).await {
                if response.status().is_success() {
                    info!(port = port, "gcsdrop ready");
                    return Ok(Self {
                        handle,
                        port,
                        base_url,
                        store,
                    });
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        handle.abort();
        Err(TestError::StartupTimeout)
    }

    /// Get the base URL
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The bucket behind the server
    pub fn store(&self) -> &Arc<EphemeralStore> {
        &self.store
    }

    /// Seed an object into the bucket
    pub fn put(&self, key: &str, data: impl Into<Bytes>) {
        self.store.put(key, data);
    }

    /// Get a client for the server
    pub fn client(&self) -> GcsDropClient {
        GcsDropClient::new(self.base_url.clone())
    }

    /// Stop the server
    pub fn stop(&self) {
        info!("Stopping gcsdrop test server");
        self.handle.abort();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Errors that can occur with test server
#[derive(Debug)]
pub enum TestError {
    NoPortAvailable,
    PortInUse(u16),
    StartupTimeout,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::NoPortAvailable => write!(f, "No available port found"),
            TestError::PortInUse(port) => write!(f, "Port {} is already in use", port),
            TestError::StartupTimeout => write!(f, "Server startup timed out"),
        }
    }
}

impl std::error::Error for TestError {}
