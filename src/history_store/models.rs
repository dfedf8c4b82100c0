use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full request lifecycle record. `payload` is an opaque serialized blob
/// owned by the caller; the store never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHistoryRecord {
    pub request_id: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub request_state: String,
    pub user: String,
}

/// Full deploy lifecycle record, migrated at most once from the live store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployHistoryRecord {
    pub request_id: String,
    pub deploy_id: String,
    pub created_at: DateTime<Utc>,
    pub user: String,
    pub deploy_state_at: DateTime<Utc>,
    pub deploy_state: String,
    pub payload: Vec<u8>,
}

/// Full task lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistoryRecord {
    pub request_id: String,
    pub task_id: String,
    pub payload: Vec<u8>,
    pub updated_at: DateTime<Utc>,
    pub last_task_status: String,
}

/// Summary projection of a deploy history row; excludes the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployHistorySummary {
    pub request_id: String,
    pub deploy_id: String,
    pub created_at: DateTime<Utc>,
    pub user: String,
    pub deploy_state_at: DateTime<Utc>,
    pub deploy_state: String,
}

/// Summary projection of a task history row; excludes the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistorySummary {
    pub task_id: String,
    pub request_id: String,
    pub updated_at: DateTime<Utc>,
    pub last_task_status: String,
}

/// One request history row as returned to query callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHistoryEntry {
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub request_state: String,
    pub user: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}
