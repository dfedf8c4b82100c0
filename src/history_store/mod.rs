pub mod models;
pub mod storage;

pub use models::*;
pub use storage::SqliteHistoryStore;

use async_trait::async_trait;

use crate::error::Result;

/// Typed access layer over the historical store: one method per operation,
/// no business logic. Insert paths append; list paths page with an
/// offset/limit window over a fixed sort key, except request history where
/// the caller picks the direction.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert_request_history(&self, record: &RequestHistoryRecord) -> Result<()>;

    async fn insert_deploy_history(&self, record: &DeployHistoryRecord) -> Result<()>;

    async fn insert_task_history(&self, record: &TaskHistoryRecord) -> Result<()>;

    /// Most recent payload for the task, or None when the task is unknown.
    async fn get_task_history_for_task(&self, task_id: &str) -> Result<Option<Vec<u8>>>;

    async fn get_deploy_history_for_deploy(
        &self,
        request_id: &str,
        deploy_id: &str,
    ) -> Result<Option<Vec<u8>>>;

    /// Deploy summaries for a request, newest first by createdAt.
    async fn get_deploy_history_for_request(
        &self,
        request_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DeployHistorySummary>>;

    /// Task summaries for a request, newest first by updatedAt.
    async fn get_task_history_for_request(
        &self,
        request_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TaskHistorySummary>>;

    async fn get_request_history(
        &self,
        request_id: &str,
        direction: SortDirection,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<RequestHistoryEntry>>;

    /// Distinct request ids starting with the given prefix.
    async fn get_request_history_like(
        &self,
        request_id_prefix: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<String>>;

    /// Releases the underlying connections. Safe to call more than once.
    async fn close(&self);
}
