use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::history_store::models::DeployHistoryRecord;

/// Composite identifier of one deploy lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployKey {
    pub request_id: String,
    pub deploy_id: String,
}

impl DeployKey {
    pub fn new(request_id: impl Into<String>, deploy_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deploy_id: deploy_id.into(),
        }
    }
}

impl fmt::Display for DeployKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.request_id, self.deploy_id)
    }
}

/// Current deploy tracking for one request in the live store. Mutated by the
/// scheduling subsystem; read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDeployState {
    pub request_id: String,
    pub active_deploy: Option<DeployKey>,
    pub pending_deploy: Option<DeployKey>,
}

/// Client surface of the live coordination store consumed by the reconciler.
/// Implementations wrap whatever backend holds current scheduling state.
#[async_trait]
pub trait DeployCoordinator: Send + Sync {
    async fn list_all_deploy_keys(&self) -> Result<Vec<DeployKey>>;

    async fn list_deploy_states_by_request_id(
        &self,
    ) -> Result<HashMap<String, RequestDeployState>>;

    /// Full record including payload, or None when already transferred.
    async fn get_deploy_history(&self, key: &DeployKey) -> Result<Option<DeployHistoryRecord>>;

    async fn delete_deploy_history(&self, key: &DeployKey) -> Result<()>;
}
