// src/poller.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::api_client::ApiClientError;
use crate::models::{Employee, Scan, Shift};
use crate::session::Scope;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Where presence data comes from. `ApiClient` is the production source.
#[async_trait]
pub trait PresenceSource: Send + Sync {
    async fn fetch_employees(&self, scope: &Scope) -> Result<Vec<Employee>, ApiClientError>;
    async fn fetch_scans(&self) -> Result<Vec<Scan>, ApiClientError>;
    async fn fetch_segments(&self) -> Result<Vec<String>, ApiClientError>;
    async fn fetch_shifts(&self) -> Result<Vec<Shift>, ApiClientError>;
}

pub fn describe_error(err: &ApiClientError) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{}: {}", err, source),
        None => err.to_string(),
    }
}

/// Fetches everything concurrently. Employees and scans are required; segments and shifts
/// fall back to `previous` when they fail.
pub async fn poll_once(
    source: &dyn PresenceSource,
    scope: &Scope,
    previous: &Snapshot,
) -> Result<Snapshot, ApiClientError> {
    let (employees, scans, segments, shifts) = tokio::join!(
        source.fetch_employees(scope),
        source.fetch_scans(),
        source.fetch_segments(),
        source.fetch_shifts(),
    );
    let employees = employees?;
    let scans = scans?;

    let segments = segments.unwrap_or_else(|e| {
        warn!("Failed to load segments, keeping previous list: {}", describe_error(&e));
        previous.segments.clone()
    });
    let shifts = shifts.unwrap_or_else(|e| {
        warn!("Failed to load shifts, keeping previous list: {}", describe_error(&e));
        previous.shifts.clone()
    });

    debug!(
        "Poll fetched {} employees, {} scans, {} segments, {} shifts",
        employees.len(),
        scans.len(),
        segments.len(),
        shifts.len()
    );
    Ok(Snapshot {
        employees,
        scans,
        segments,
        shifts,
        fetched_at: Some(Utc::now()),
    })
}

/// Background task that keeps a `SnapshotStore` fresh.
pub struct Poller {
    source: Arc<dyn PresenceSource>,
    store: Arc<SnapshotStore>,
    scope: Scope,
    interval: Duration,
}

impl Poller {
    pub fn spawn(
        source: Arc<dyn PresenceSource>,
        store: Arc<SnapshotStore>,
        scope: Scope,
        interval: Duration,
    ) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let refresh = Arc::new(Notify::new());
        let poller = Poller {
            source,
            store,
            scope,
            interval,
        };
        let task = tokio::spawn(poller.run(shutdown_rx, refresh.clone()));
        PollerHandle {
            shutdown: shutdown_tx,
            refresh,
            task: Mutex::new(Some(task)),
        }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>, refresh: Arc<Notify>) {
        info!(
            "Starting presence poller ({:?} scope, every {}s)",
            self.scope,
            self.interval.as_secs()
        );

        loop {
            let previous = self.store.current().await;
            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                outcome = poll_once(self.source.as_ref(), &self.scope, &previous) => outcome,
            };

            // A poll that finished after cancellation must not be committed.
            if *shutdown_rx.borrow() {
                debug!("Discarding poll result received after cancellation");
                break;
            }
            match outcome {
                Ok(snapshot) => {
                    info!(
                        "Presence data updated: {} employees, {} scans",
                        snapshot.employees.len(),
                        snapshot.scans.len()
                    );
                    self.store.replace(snapshot).await;
                }
                Err(e) => {
                    let message = describe_error(&e);
                    error!("Presence poll failed: {}", message);
                    self.store.record_failure(message).await;
                }
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = refresh.notified() => debug!("Manual refresh requested"),
                _ = sleep(self.interval) => {}
            }
        }
        info!("Presence poller stopped");
    }
}

/// Owned by the service lifecycle. Dropping it also stops the poller.
#[derive(Debug)]
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    refresh: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollerHandle {
    /// Wakes the poller for an immediate fetch.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Cancels and waits for the task to exit.
    pub async fn shutdown(&self) {
        self.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Presence poller task ended abnormally: {}", e);
            }
        }
    }
}
