use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scheduler::DEFAULT_POLL_INTERVAL_SECONDS;

/// Runtime configuration for the archival service.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HistorianConfig {
    /// Path to the SQLite archive database file.
    pub database_path: String,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

impl Default for HistorianConfig {
    fn default() -> Self {
        Self {
            database_path: "history.db".to_string(),
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
        }
    }
}

impl HistorianConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

fn default_poll_interval_seconds() -> u64 {
    DEFAULT_POLL_INTERVAL_SECONDS
}
