//! Background pruning of the historical price store
//!
//! Periodically deletes historical entries older than the retention window.
//! The task is owned by a [`PruneHandle`] and stopped through it on shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{HistoricalStore, StoreError};
use crate::clock::Clock;

/// Configuration for the pruning schedule
#[derive(Debug, Clone)]
pub struct PruneConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// Whether the background task runs at all
    pub enabled: bool,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60 * 60), // 5 hours
            enabled: true,
        }
    }
}

/// Runs one sweep, returning how many entries were removed
pub async fn run_sweep(store: &HistoricalStore, clock: &dyn Clock) -> Result<u64, StoreError> {
    let removed = store.prune(clock.now()).await?;
    info!(removed, "pruned expired historical price entries");
    Ok(removed)
}

/// Handle for controlling the background pruning task
pub struct PruneHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl PruneHandle {
    /// Spawns the pruning task
    ///
    /// The first sweep happens one full interval after spawning. A failed sweep
    /// is logged and the schedule carries on.
    pub fn spawn(store: HistoricalStore, clock: Arc<dyn Clock>, config: PruneConfig) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = if config.enabled {
            Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(e) = run_sweep(&store, clock.as_ref()).await {
                                warn!(error = %e, "historical cache sweep failed");
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
                info!("historical cache pruning stopped");
            }))
        } else {
            None
        };

        Self { shutdown_tx, task }
    }

    /// Whether a background task was started
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the pruning task and waits for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}
