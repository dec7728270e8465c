// src/snapshot.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{Employee, Scan, Shift};

/// One complete fetch result. Never mutated after it is stored.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub employees: Vec<Employee>,
    pub scans: Vec<Scan>,
    pub segments: Vec<String>,
    pub shifts: Vec<Shift>,
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum FetchStatus {
    Loading,
    Connected,
    Error(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReport {
    pub status: FetchStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub employee_count: usize,
    pub scan_count: usize,
}

#[derive(Debug)]
struct StoreState {
    snapshot: Arc<Snapshot>,
    status: FetchStatus,
}

/// Holds the latest snapshot. Readers clone the `Arc` and never observe a half-applied poll.
#[derive(Debug)]
pub struct SnapshotStore {
    state: RwLock<StoreState>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                snapshot: Arc::new(Snapshot::default()),
                status: FetchStatus::Loading,
            }),
        }
    }

    pub async fn current(&self) -> Arc<Snapshot> {
        self.state.read().await.snapshot.clone()
    }

    pub async fn replace(&self, snapshot: Snapshot) {
        let mut state = self.state.write().await;
        state.snapshot = Arc::new(snapshot);
        state.status = FetchStatus::Connected;
    }

    /// Keeps the last good snapshot and records why the latest poll failed.
    pub async fn record_failure(&self, message: impl Into<String>) {
        self.state.write().await.status = FetchStatus::Error(message.into());
    }

    pub async fn status(&self) -> FetchReport {
        let state = self.state.read().await;
        FetchReport {
            status: state.status.clone(),
            last_updated: state.snapshot.fetched_at,
            employee_count: state.snapshot.employees.len(),
            scan_count: state.snapshot.scans.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(employees: usize) -> Snapshot {
        Snapshot {
            employees: vec![Employee::default(); employees],
            fetched_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_new_store_is_loading_and_empty() {
        let store = SnapshotStore::new();
        let report = store.status().await;
        assert_eq!(report.status, FetchStatus::Loading);
        assert_eq!(report.employee_count, 0);
        assert!(report.last_updated.is_none());
    }

    #[tokio::test]
    async fn test_replace_swaps_whole_snapshot() {
        let store = SnapshotStore::new();
        let before = store.current().await;
        store.replace(snapshot_with(3)).await;

        // Earlier readers keep their snapshot.
        assert!(before.employees.is_empty());
        assert_eq!(store.current().await.employees.len(), 3);
        assert_eq!(store.status().await.status, FetchStatus::Connected);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good_snapshot() {
        let store = SnapshotStore::new();
        store.replace(snapshot_with(2)).await;
        store.record_failure("HTTP request failed").await;

        let report = store.status().await;
        assert_eq!(report.status, FetchStatus::Error("HTTP request failed".to_string()));
        assert_eq!(report.employee_count, 2);
        assert_eq!(store.current().await.employees.len(), 2);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(FetchStatus::Error("boom".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "error", "message": "boom" }));
        let json = serde_json::to_value(FetchStatus::Connected).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "connected" }));
    }
}
