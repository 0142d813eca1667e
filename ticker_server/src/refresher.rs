//! Periodic cache refresh task.
//!
//! `Refresher::start` spawns one tokio task that calls
//! [`CacheSynchronizer::refresh_all`] every `interval`, the first time one full
//! interval after startup. Ticks that arrive while a cycle is still running are
//! skipped rather than queued. The task ends when [`Refresher::stop`] is called
//! (or the handle is dropped); a cycle in flight is abandoned between two row
//! writes, never in the middle of one.
//!
//! A failed cycle is logged and the next tick runs as usual. Only an error that
//! is not recoverable (a configuration problem) ends the loop early.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use ticker_common::CacheError;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::sync::CacheSynchronizer;

/// Handle to the running refresh loop.
pub struct Refresher {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl Refresher {
    /// Spawn the refresh loop on the current runtime.
    pub fn start(sync: Arc<CacheSynchronizer>, every: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run(sync, every, shutdown_rx));
        info!("Refresh task started, interval {:?}", every);
        Refresher { shutdown_tx, handle }
    }

    /// Whether the loop has already ended on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            error!("Refresh task ended abnormally: {}", e);
        }
        info!("Refresh task stopped");
    }
}

async fn run(sync: Arc<CacheSynchronizer>, every: Duration, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    outcome = sync.refresh_all() => match outcome {
                        Ok(report) if !report.failed.is_empty() => {
                            let names: Vec<&str> = report.failed.iter().map(|s| s.as_str()).collect();
                            warn!("Refresh left {} symbols stale: {}", names.len(), names.join(", "));
                        }
                        Ok(_) => {}
                        Err(CacheError::RefreshInProgress) => {
                            info!("Previous refresh still running, skipping this tick");
                        }
                        Err(e) if e.is_recoverable() => error!("Refresh cycle failed: {}", e),
                        Err(e) => {
                            error!("Refresh task giving up: {}", e);
                            break;
                        }
                    },
                }
            }
        }
    }
}
