//! HTTP router for gcsdrop

use anyhow::Context;
use axum::{
    extract::{FromRef, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use gcsdrop_storage::{
    handlers::{self, DownloadState},
    storage::{EphemeralStore, GcsStore, ObjectStore, TokenSource},
};

use crate::config::{Config, StorageBackend, StorageConfig};

/// Application state shared by all routes
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    download: Arc<DownloadState>,
}

impl AppState {
    /// Build state around an existing store
    pub fn new(config: Config, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config: Arc::new(config),
            download: Arc::new(DownloadState::new(store)),
        }
    }

    /// Build state and the store the configuration asks for
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = build_store(&config.storage).await?;
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.download.store
    }
}

impl FromRef<AppState> for Arc<DownloadState> {
    fn from_ref(state: &AppState) -> Self {
        state.download.clone()
    }
}

async fn build_store(storage: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match storage.backend {
        StorageBackend::Gcs => {
            let store = if let Some(host) = &storage.emulator_host {
                info!(endpoint = %host, "Using Cloud Storage emulator");
                GcsStore::emulator(&storage.bucket, host)
            } else {
                let auth = match &storage.access_token {
                    Some(token) => TokenSource::Static(token.expose().to_string()),
                    None => TokenSource::metadata_server(&storage.metadata_host),
                };
                GcsStore::new(&storage.bucket, auth)
            };
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            let store = EphemeralStore::new(&storage.bucket);
            if let Some(dir) = &storage.seed_dir {
                seed(&store, dir).await?;
            }
            Ok(Arc::new(store))
        }
    }
}

/// Load every regular file in `dir` into the memory backend, keyed by file name
async fn seed(store: &EphemeralStore, dir: &Path) -> anyhow::Result<()> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read seed directory {}", dir.display()))?;

    let mut count = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let data = tokio::fs::read(entry.path())
            .await
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        store.put(name, data);
        count += 1;
    }

    info!(count, dir = %dir.display(), "Seeded memory backend");
    Ok(())
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/download/:filename", get(handlers::download))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "running",
        "bucket": state.config.storage.bucket,
        "backend": state.download.store.backend(),
    }))
}
