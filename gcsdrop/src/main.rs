//! gcsdrop - Cloud Storage download server
//!
//! Streams objects from a single bucket to HTTP clients as file downloads.

use clap::Parser;
use gcsdrop::{create_router, AppState, Args, Config};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_level = args.log_level.clone().unwrap_or_else(|| "info".to_string());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "gcsdrop={level},gcsdrop_storage={level},tower_http=debug",
                    level = log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&args)?;
    if config.storage.bucket.is_empty() {
        warn!("BUCKET_NAME is not set; every download will fail");
    }

    let state = AppState::from_config(config.clone()).await?;
    let app = create_router(state);

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!(
        port = config.server.port,
        bucket = %config.storage.bucket,
        backend = config.storage.backend.as_str(),
        "App rodando na porta {}, bucket: {}",
        config.server.port,
        config.storage.bucket
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        () = terminate => {
            info!("Received terminate signal, starting graceful shutdown...");
        }
    }
}
