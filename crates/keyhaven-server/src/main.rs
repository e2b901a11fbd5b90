//! Keyhaven server entry point.
//!
//! Bootstraps the store backend and the engine, then starts the Axum HTTP
//! server with graceful shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use keyhaven_core::SecretService;
use keyhaven_store::{MemoryStore, SecretStore};

use keyhaven_server::config::{ServerConfig, StoreBackendType};
use keyhaven_server::routes;
use keyhaven_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(store = config.store_backend_kind(), "keyhaven starting");

    let store = build_store(&config).await?;
    let state = Arc::new(AppState {
        service: SecretService::new(store),
    });

    let app = routes::router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "keyhaven server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("keyhaven server stopped");
    Ok(())
}

/// Bootstrap the configured store backend.
async fn build_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn SecretStore>> {
    match &config.store_backend {
        StoreBackendType::Memory => {
            info!("using in-memory store (data will not persist)");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "postgres")]
        StoreBackendType::Postgres { url } => {
            info!("using PostgreSQL store");
            let store = keyhaven_store::PostgresStore::connect(url)
                .await
                .context("failed to connect to PostgreSQL store")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackendType::Postgres { .. } => {
            anyhow::bail!("PostgreSQL store requested but feature 'postgres' is not enabled");
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
