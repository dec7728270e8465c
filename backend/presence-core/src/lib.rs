// src/lib.rs

pub mod api_client;
pub mod attendance;
pub mod calendar;
pub mod config;
pub mod grid;
pub mod models;
pub mod poller;
pub mod render;
pub mod schedule;
pub mod server;
pub mod session;
pub mod snapshot;

mod attendance_tests;
mod grid_tests;

pub use api_client::{ApiClient, ApiClientError, ApiConfig};
pub use attendance::{evaluate, AttendanceEvaluator, StatusVerdict, ValidationPolicy};
pub use config::AppConfig;
pub use poller::{poll_once, Poller, PollerHandle, PresenceSource};
pub use session::{Role, Scope, Session};
pub use snapshot::{Snapshot, SnapshotStore};
