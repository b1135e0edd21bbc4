//! Background delivery of pending orders.
//!
//! The worker retries on a bounded exponential backoff and immediately when
//! the connectivity channel reports that the client is back online.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{SyncReconciler, SyncStatus};
use crate::config::ClientConfig;

/// Exponential retry delay between `base` and `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            current: base,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.backoff_base, config.backoff_max)
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Double the delay, up to the cap.
    pub fn grow(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.max);
    }
}

/// Handle to the running sync task.
#[derive(Debug)]
pub struct SyncWorker {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<SyncStatus>,
}

impl SyncWorker {
    /// Start the worker. `online` reports connectivity; `true` means online.
    pub fn spawn(
        reconciler: SyncReconciler,
        mut online: watch::Receiver<bool>,
        mut backoff: Backoff,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let (status_tx, status) = watch::channel(SyncStatus::default());

        let handle = tokio::spawn(async move {
            tracing::info!("Sync worker started");
            let mut connectivity_open = true;

            // Initial pass on load
            if *online.borrow_and_update() {
                run_pass(&reconciler, &mut backoff, &status_tx).await;
            }

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    changed = online.changed(), if connectivity_open => {
                        if changed.is_err() {
                            tracing::debug!("Connectivity channel closed, retrying on timer only");
                            connectivity_open = false;
                            continue;
                        }
                        if *online.borrow_and_update() {
                            tracing::info!("Connectivity restored, syncing pending orders");
                            backoff.reset();
                            run_pass(&reconciler, &mut backoff, &status_tx).await;
                            if let Err(e) = reconciler.check_for_updates().await {
                                tracing::error!("Order refresh failed: {}", e);
                            }
                        } else {
                            tracing::info!("Client went offline");
                        }
                    }
                    _ = tokio::time::sleep(backoff.current()) => {
                        if *online.borrow() {
                            run_pass(&reconciler, &mut backoff, &status_tx).await;
                        }
                    }
                }
            }
            tracing::info!("Sync worker stopped");
        });

        Self {
            handle,
            shutdown,
            status,
        }
    }

    /// Watch the delivery state after each pass.
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Stop the worker and wait for it to finish its current pass.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("Sync worker panicked: {}", e);
        }
    }
}

async fn run_pass(
    reconciler: &SyncReconciler,
    backoff: &mut Backoff,
    status_tx: &watch::Sender<SyncStatus>,
) {
    match reconciler.sync_pending().await {
        Ok(report) if report.delivered => backoff.reset(),
        Ok(_) => {
            backoff.grow();
            tracing::debug!("Next sync attempt in {:?}", backoff.current());
        }
        Err(e) => {
            tracing::error!("Sync pass failed: {}", e);
            backoff.grow();
        }
    }

    match reconciler.cache().status().await {
        Ok(status) => {
            status_tx.send_replace(status);
        }
        Err(e) => tracing::error!("Could not read sync status: {}", e),
    }
}
