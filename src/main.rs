//! idemstore - A multi-tenant idempotency-key store
//!
//! HTTP server exposing tenant registration and idempotency records.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idemstore::api::create_router;
use idemstore::config::StorageBackend;
use idemstore::store::{KeyStore, MemoryStore, RedisStore};
use idemstore::{spawn_cleanup_task, AppState, Config};

/// Main entry point for the idempotency server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the configured key store (and start the TTL sweep for memory)
/// 4. Create Axum router with all endpoints
/// 5. Serve until SIGINT/SIGTERM, then shut down gracefully
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idemstore=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting idempotency server");

    let config = Config::from_env().context("loading configuration")?;
    info!(
        "Configuration loaded: backend={:?}, port={}, operation_timeout={}ms",
        config.storage_backend, config.server_port, config.operation_timeout_ms
    );

    let (store, cleanup_handle): (Arc<dyn KeyStore>, Option<JoinHandle<()>>) =
        match config.storage_backend {
            StorageBackend::Memory => {
                let store = MemoryStore::new();
                let handle = spawn_cleanup_task(store.clone(), config.cleanup_interval);
                info!("In-memory store initialized, TTL cleanup task started");
                (Arc::new(store) as Arc<dyn KeyStore>, Some(handle))
            }
            StorageBackend::Redis => {
                let store = RedisStore::connect(&config.redis_url)
                    .await
                    .with_context(|| format!("connecting to Redis at {}", config.redis_url))?;
                (Arc::new(store) as Arc<dyn KeyStore>, None)
            }
        };

    let state = AppState::from_config(&config, store);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
