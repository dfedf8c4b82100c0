use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::history_store::HistoryStore;
use crate::live_store::{DeployCoordinator, DeployKey, RequestDeployState};

/// Counts reported at the end of one archival cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// Eligible records for which a transfer was attempted.
    pub total: u32,
    /// Records confirmed written to the archive and removed from the live store.
    pub transferred: u32,
}

/// Moves finalized deploy records from the live coordination store into the
/// historical store, one independent read-write-delete sequence per record.
///
/// Each cycle re-derives eligibility from current live state, so re-running
/// after a partial failure is safe: records already deleted simply vanish
/// from the enumeration, and failed writes stay in the live store for the
/// next cycle.
pub struct DeployHistoryReconciler {
    coordinator: Arc<dyn DeployCoordinator>,
    history: Arc<dyn HistoryStore>,
}

impl DeployHistoryReconciler {
    pub fn new(coordinator: Arc<dyn DeployCoordinator>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            coordinator,
            history,
        }
    }

    /// Runs one archival cycle and reports transferred/total counts.
    ///
    /// Only a failed enumeration read ends the cycle with an error; every
    /// per-record failure is logged and isolated so the rest of the batch
    /// still transfers.
    pub async fn run_once(&self) -> Result<ReconcileSummary> {
        info!("Checking inactive deploys for history archival");

        let started = Instant::now();

        // Two independent reads; a deploy promoted to active between them
        // can still be archived this cycle.
        let deploy_keys = self.coordinator.list_all_deploy_keys().await?;
        let states_by_request_id = self.coordinator.list_deploy_states_by_request_id().await?;

        let mut summary = ReconcileSummary::default();

        for key in deploy_keys {
            if !should_transfer(states_by_request_id.get(&key.request_id), &key) {
                continue;
            }

            if self.transfer(&key).await {
                summary.transferred += 1;
            }

            summary.total += 1;
        }

        info!(
            "Transferred {} out of {} deploys in {:?}",
            summary.transferred,
            summary.total,
            started.elapsed()
        );

        Ok(summary)
    }

    /// One record's transfer: read from live, append to history, delete from
    /// live. The delete only ever happens after a confirmed write; a failed
    /// write leaves the record in the live store for the next cycle.
    async fn transfer(&self, key: &DeployKey) -> bool {
        let started = Instant::now();

        let record = match self.coordinator.get_deploy_history(key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("Deploy history for {} not found", key);
                return false;
            }
            Err(err) => {
                warn!("Failed to read deploy history for {}: {}", key, err);
                return false;
            }
        };

        if let Err(err) = self.history.insert_deploy_history(&record).await {
            warn!(
                "Failed to persist deploy history {:?} for {}: {}",
                record, key, err
            );
            return false;
        }

        if let Err(err) = self.coordinator.delete_deploy_history(key).await {
            // Written but not deleted: the archive is append-only, so the
            // retried insert next cycle is harmless.
            warn!(
                "Failed to delete live deploy history for {} after archiving: {}",
                key, err
            );
            return false;
        }

        debug!(
            "Moved deploy history for {} into the archive in {:?}",
            key,
            started.elapsed()
        );

        true
    }
}

/// A deploy is eligible unless its request's current state still references
/// it as active or pending. A missing state means the live store can no
/// longer assert the deploy is in use, so it is archived with a warning.
fn should_transfer(state: Option<&RequestDeployState>, key: &DeployKey) -> bool {
    let Some(state) = state else {
        warn!("Missing request deploy state for deploy {}", key);
        return true;
    };

    if state
        .active_deploy
        .as_ref()
        .is_some_and(|active| active.deploy_id == key.deploy_id)
    {
        return false;
    }

    if state
        .pending_deploy
        .as_ref()
        .is_some_and(|pending| pending.deploy_id == key.deploy_id)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests;
