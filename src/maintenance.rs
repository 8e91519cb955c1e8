//! Background maintenance
//!
//! Periodic expiry sweeps and adaptive rescale passes run on a tokio task
//! owned by a [`MaintenanceHandle`]. Dropping or shutting down the handle
//! cancels the task; the cache itself works fine without one, callers can
//! instead drive [`StrataCache::optimize`] themselves.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::manager::StrataCache;

/// Handle to the background maintenance task
pub struct MaintenanceHandle {
    token: CancellationToken,
    /// `None` once `shutdown` has taken and joined the task
    task: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Spawn the maintenance loops for a cache.
    ///
    /// Sweep and rescale run on their configured intervals until the handle
    /// is shut down. The first tick of each interval fires after one full
    /// period, not immediately.
    pub fn spawn(cache: Arc<StrataCache>) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let maintenance = cache.config().maintenance.clone();

        let task = tokio::spawn(async move {
            let mut sweep = tokio::time::interval(maintenance.sweep_interval);
            let mut rescale = tokio::time::interval(maintenance.rescale_interval);
            // Skip the immediate first tick of each interval
            sweep.tick().await;
            rescale.tick().await;

            info!(
                sweep_interval = ?maintenance.sweep_interval,
                rescale_interval = ?maintenance.rescale_interval,
                "maintenance task started"
            );

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        info!("maintenance task stopping");
                        break;
                    }
                    _ = sweep.tick() => {
                        let (expired, evicted) = cache.sweep_layers();
                        if expired > 0 || evicted > 0 {
                            debug!(expired, evicted, "sweep pass");
                        }
                    }
                    _ = rescale.tick() => {
                        let changes = cache.rescale_layers();
                        if !changes.is_empty() {
                            debug!(rescaled = changes.len(), "rescale pass");
                        }
                    }
                }
            }
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Whether the task has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the task and wait for it to finish
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Cancel the task without waiting
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        // A dropped handle must not leave an orphan loop running
        self.token.cancel();
    }
}

impl std::fmt::Debug for MaintenanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
