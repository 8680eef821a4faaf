//! Application wiring: builds the services from configuration and runs the
//! HTTP server until shutdown.

use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{app_router, AppState};
use crate::cache::{HistoricalStore, StoreError};
use crate::cli::{ConfigError, ServerConfig};
use crate::clock::{Clock, SystemClock};
use crate::data::CoinGeckoClient;
use crate::error::PriceError;
use crate::prune::{PruneConfig, PruneHandle};
use crate::service::{history_retention, PriceService};

/// Errors that stop the server from starting or running
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("failed to open historical cache: {0}")]
    Store(#[from] StoreError),

    #[error("failed to create upstream client: {0}")]
    Client(#[from] PriceError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens the store and builds the shared handler state
pub async fn build_state(
    config: &ServerConfig,
    clock: Arc<dyn Clock>,
) -> Result<(Arc<AppState>, HistoricalStore), AppError> {
    let store = HistoricalStore::open(&config.db_path, history_retention()).await?;
    info!(path = %config.db_path.display(), "opened historical price cache");

    let client = CoinGeckoClient::new(
        config.api_base_url.clone(),
        config.api_key.clone(),
        config.upstream_timeout,
    )?;
    if config.api_key.is_none() {
        info!("no CoinGecko API key configured, using anonymous access");
    }

    let prices = PriceService::new(Arc::new(client), store.clone(), clock);
    Ok((Arc::new(AppState { prices }), store))
}

/// Runs the server until Ctrl-C or SIGTERM, then stops the pruning task
pub async fn run(config: ServerConfig) -> Result<(), AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (state, store) = build_state(&config, clock.clone()).await?;

    let pruner = PruneHandle::spawn(store.clone(), clock, PruneConfig::default());
    let router = app_router(state, config.cors_origin.as_deref());

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    pruner.shutdown().await;
    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
