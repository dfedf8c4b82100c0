use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::reconciler::DeployHistoryReconciler;

pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 300;

/// Spawns the periodic archival loop. Cycles run strictly one at a time on
/// the returned task, which preserves the per-record read-write-delete
/// ordering without any further locking. Abort the handle to stop.
pub fn start_reconciler(
    reconciler: Arc<DeployHistoryReconciler>,
    interval: Duration,
) -> JoinHandle<()> {
    let runner_id = format!("history-reconciler-{}", uuid::Uuid::new_v4());

    tokio::spawn(async move {
        info!(
            "History archival runner started (id={}, interval={:?})",
            runner_id, interval
        );

        loop {
            sleep(interval).await;

            if let Err(err) = reconciler.run_once().await {
                warn!("History archival cycle failed: {}", err);
            }
        }
    })
}
