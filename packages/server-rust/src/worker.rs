//! Routing-table maintenance: periodic and on-demand reconcile, compaction.
//!
//! [`maintenance_channel`] splits into a cloneable [`MaintenanceHandle`]
//! (held by the router and handed to operators) and a
//! [`MaintenanceQueue`] that a [`MaintenanceWorker`] drains while the
//! listener runs. Requests submitted before the worker starts are queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::MaintenanceError;
use crate::loader::MapLoader;

/// Queue depth for pending maintenance requests.
const QUEUE_CAPACITY: usize = 16;

/// Table maintenance requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceTask {
    /// Rebuild the table from the store.
    Reconcile,
    /// Drop all but the last entry per route name, without touching the store.
    Compact,
}

/// Submits maintenance requests to the running worker.
#[derive(Debug, Clone)]
pub struct MaintenanceHandle {
    tx: mpsc::Sender<MaintenanceTask>,
}

impl MaintenanceHandle {
    /// Queues `task`, waiting if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`MaintenanceError::Stopped`] once the worker has stopped.
    pub async fn submit(&self, task: MaintenanceTask) -> Result<(), MaintenanceError> {
        self.tx
            .send(task)
            .await
            .map_err(|_| MaintenanceError::Stopped)
    }
}

/// Receiving side of the maintenance channel, consumed by
/// [`MaintenanceWorker::start`].
#[derive(Debug)]
pub struct MaintenanceQueue {
    rx: mpsc::Receiver<MaintenanceTask>,
}

/// Creates a connected handle/queue pair.
#[must_use]
pub fn maintenance_channel() -> (MaintenanceHandle, MaintenanceQueue) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    (MaintenanceHandle { tx }, MaintenanceQueue { rx })
}

/// Background task applying maintenance to the loader's table.
pub struct MaintenanceWorker {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MaintenanceWorker {
    /// Spawns the worker.
    ///
    /// With `reconcile_every` set, a reconcile also runs on that interval
    /// (first run one interval after start).
    #[must_use]
    pub fn start(
        loader: Arc<MapLoader>,
        queue: MaintenanceQueue,
        reconcile_every: Option<Duration>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(loader, queue.rx, reconcile_every, shutdown_rx));
        Self {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Stops the worker and waits for it to exit. Queued requests that have
    /// not started are discarded.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "maintenance worker panicked");
            }
        }
    }
}

async fn run(
    loader: Arc<MapLoader>,
    mut rx: mpsc::Receiver<MaintenanceTask>,
    reconcile_every: Option<Duration>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = reconcile_every.map(|period| {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            task = rx.recv() => match task {
                Some(task) => apply(&loader, task).await,
                // Every handle dropped.
                None => break,
            },
            () = next_tick(ticker.as_mut()) => apply(&loader, MaintenanceTask::Reconcile).await,
        }
    }
    debug!("maintenance worker stopped");
}

/// Waits for the next tick, or forever when periodic reconcile is off.
async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn apply(loader: &MapLoader, task: MaintenanceTask) {
    match task {
        MaintenanceTask::Reconcile => {
            if let Err(e) = loader.reconcile().await {
                warn!(error = %e, "routing table reconcile failed; keeping current table");
            }
        }
        MaintenanceTask::Compact => {
            let dropped = loader.table().compact();
            info!(dropped, table_len = loader.table().len(), "routing table compacted");
        }
    }
}
