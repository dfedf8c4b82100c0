use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

use crate::error::{HistoryError, Result};
use crate::history_store::models::{
    DeployHistoryRecord, DeployHistorySummary, RequestHistoryEntry, RequestHistoryRecord,
    SortDirection, TaskHistoryRecord, TaskHistorySummary,
};
use crate::history_store::HistoryStore;

/// SQLite adapter for the historical store. Tables are append-only; the
/// reconciler never updates or deletes rows here.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: Pool<Sqlite>,
}

impl SqliteHistoryStore {
    pub async fn new(pool: Pool<Sqlite>) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        // Enable WAL for concurrent readers
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| HistoryError::Connection(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS requestHistory (
                requestId TEXT NOT NULL,
                payload BLOB NOT NULL,
                createdAt DATETIME NOT NULL,
                requestState TEXT NOT NULL,
                user TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deployHistory (
                requestId TEXT NOT NULL,
                deployId TEXT NOT NULL,
                createdAt DATETIME NOT NULL,
                user TEXT NOT NULL,
                deployStateAt DATETIME NOT NULL,
                deployState TEXT NOT NULL,
                payload BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS taskHistory (
                requestId TEXT NOT NULL,
                taskId TEXT NOT NULL,
                payload BLOB NOT NULL,
                updatedAt DATETIME NOT NULL,
                lastTaskStatus TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_requestHistory_request_created ON requestHistory(requestId, createdAt DESC);
            CREATE INDEX IF NOT EXISTS idx_deployHistory_request_created ON deployHistory(requestId, createdAt DESC);
            CREATE INDEX IF NOT EXISTS idx_deployHistory_deploy ON deployHistory(requestId, deployId);
            CREATE INDEX IF NOT EXISTS idx_taskHistory_task ON taskHistory(taskId);
            CREATE INDEX IF NOT EXISTS idx_taskHistory_request_updated ON taskHistory(requestId, updatedAt DESC);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Connection(format!("Failed to init history schema: {}", e)))?;

        Ok(())
    }

    pub fn get_pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn row_to_deploy_summary(row: &SqliteRow) -> std::result::Result<DeployHistorySummary, sqlx::Error> {
        Ok(DeployHistorySummary {
            request_id: row.try_get("requestId")?,
            deploy_id: row.try_get("deployId")?,
            created_at: row.try_get("createdAt")?,
            user: row.try_get("user")?,
            deploy_state_at: row.try_get("deployStateAt")?,
            deploy_state: row.try_get("deployState")?,
        })
    }

    fn row_to_task_summary(row: &SqliteRow) -> std::result::Result<TaskHistorySummary, sqlx::Error> {
        Ok(TaskHistorySummary {
            task_id: row.try_get("taskId")?,
            request_id: row.try_get("requestId")?,
            updated_at: row.try_get("updatedAt")?,
            last_task_status: row.try_get("lastTaskStatus")?,
        })
    }

    fn row_to_request_entry(row: &SqliteRow) -> std::result::Result<RequestHistoryEntry, sqlx::Error> {
        Ok(RequestHistoryEntry {
            payload: row.try_get("payload")?,
            created_at: row.try_get("createdAt")?,
            request_state: row.try_get("requestState")?,
            user: row.try_get("user")?,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn insert_request_history(&self, record: &RequestHistoryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO requestHistory (requestId, payload, createdAt, requestState, user)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.request_id)
        .bind(record.payload.as_slice())
        .bind(record.created_at)
        .bind(&record.request_state)
        .bind(&record.user)
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::StoreWrite(record.request_id.clone(), e.to_string()))?;

        Ok(())
    }

    async fn insert_deploy_history(&self, record: &DeployHistoryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deployHistory (requestId, deployId, createdAt, user, deployStateAt, deployState, payload)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.request_id)
        .bind(&record.deploy_id)
        .bind(record.created_at)
        .bind(&record.user)
        .bind(record.deploy_state_at)
        .bind(&record.deploy_state)
        .bind(record.payload.as_slice())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            HistoryError::StoreWrite(
                format!("{}-{}", record.request_id, record.deploy_id),
                e.to_string(),
            )
        })?;

        Ok(())
    }

    async fn insert_task_history(&self, record: &TaskHistoryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO taskHistory (requestId, taskId, payload, updatedAt, lastTaskStatus)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.request_id)
        .bind(&record.task_id)
        .bind(record.payload.as_slice())
        .bind(record.updated_at)
        .bind(&record.last_task_status)
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::StoreWrite(record.task_id.clone(), e.to_string()))?;

        Ok(())
    }

    async fn get_task_history_for_task(&self, task_id: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query(
            r#"
            SELECT payload
            FROM taskHistory
            WHERE taskId = ?
            ORDER BY updatedAt DESC
            LIMIT 1
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HistoryError::StoreRead(task_id.to_string(), e.to_string()))?;

        match row {
            Some(row) => {
                let payload: Vec<u8> = row
                    .try_get("payload")
                    .map_err(|e| HistoryError::StoreRead(task_id.to_string(), e.to_string()))?;
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    async fn get_deploy_history_for_deploy(
        &self,
        request_id: &str,
        deploy_id: &str,
    ) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query(
            r#"
            SELECT payload
            FROM deployHistory
            WHERE requestId = ? AND deployId = ?
            ORDER BY createdAt DESC
            LIMIT 1
            "#,
        )
        .bind(request_id)
        .bind(deploy_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            HistoryError::StoreRead(format!("{}-{}", request_id, deploy_id), e.to_string())
        })?;

        match row {
            Some(row) => {
                let payload: Vec<u8> = row.try_get("payload").map_err(|e| {
                    HistoryError::StoreRead(format!("{}-{}", request_id, deploy_id), e.to_string())
                })?;
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    async fn get_deploy_history_for_request(
        &self,
        request_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DeployHistorySummary>> {
        let rows = sqlx::query(
            r#"
            SELECT requestId, deployId, createdAt, user, deployStateAt, deployState
            FROM deployHistory
            WHERE requestId = ?
            ORDER BY createdAt DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(request_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::StoreRead(request_id.to_string(), e.to_string()))?;

        rows.iter()
            .map(|row| {
                Self::row_to_deploy_summary(row)
                    .map_err(|e| HistoryError::StoreRead(request_id.to_string(), e.to_string()))
            })
            .collect()
    }

    async fn get_task_history_for_request(
        &self,
        request_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TaskHistorySummary>> {
        let rows = sqlx::query(
            r#"
            SELECT taskId, requestId, updatedAt, lastTaskStatus
            FROM taskHistory
            WHERE requestId = ?
            ORDER BY updatedAt DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(request_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::StoreRead(request_id.to_string(), e.to_string()))?;

        rows.iter()
            .map(|row| {
                Self::row_to_task_summary(row)
                    .map_err(|e| HistoryError::StoreRead(request_id.to_string(), e.to_string()))
            })
            .collect()
    }

    async fn get_request_history(
        &self,
        request_id: &str,
        direction: SortDirection,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<RequestHistoryEntry>> {
        // The sort direction cannot be bound as a parameter; it is
        // interpolated from a closed enum.
        let query = format!(
            "SELECT payload, createdAt, requestState, user FROM requestHistory WHERE requestId = ? ORDER BY createdAt {} LIMIT ? OFFSET ?",
            direction.as_sql()
        );

        let rows = sqlx::query(&query)
            .bind(request_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HistoryError::StoreRead(request_id.to_string(), e.to_string()))?;

        rows.iter()
            .map(|row| {
                Self::row_to_request_entry(row)
                    .map_err(|e| HistoryError::StoreRead(request_id.to_string(), e.to_string()))
            })
            .collect()
    }

    async fn get_request_history_like(
        &self,
        request_id_prefix: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT requestId
            FROM requestHistory
            WHERE requestId LIKE ? || '%'
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(request_id_prefix)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::StoreRead(request_id_prefix.to_string(), e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("requestId").map_err(|e| {
                    HistoryError::StoreRead(request_id_prefix.to_string(), e.to_string())
                })
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
