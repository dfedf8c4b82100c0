//! History archival for deploy coordination state.
//!
//! Finalized request, deploy and task lifecycle records are written to a
//! durable SQLite archive; a periodic reconciler moves finished deploy
//! records out of the live coordination store into that archive, one
//! isolated read-write-delete sequence per record, and the archive serves
//! paginated queries to reporting callers.

pub mod config;
pub mod db;
pub mod error;
pub mod history_store;
pub mod live_store;
pub mod reconciler;
pub mod scheduler;

pub use config::HistorianConfig;
pub use db::create_pool;
pub use error::{HistoryError, Result};
pub use history_store::{
    DeployHistoryRecord, DeployHistorySummary, HistoryStore, RequestHistoryEntry,
    RequestHistoryRecord, SortDirection, SqliteHistoryStore, TaskHistoryRecord, TaskHistorySummary,
};
pub use live_store::{DeployCoordinator, DeployKey, RequestDeployState};
pub use reconciler::{DeployHistoryReconciler, ReconcileSummary};
pub use scheduler::start_reconciler;
