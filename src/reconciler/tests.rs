use super::*;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::error::HistoryError;
use crate::history_store::{
    DeployHistoryRecord, DeployHistorySummary, RequestHistoryEntry, RequestHistoryRecord,
    SortDirection, SqliteHistoryStore, TaskHistoryRecord, TaskHistorySummary,
};

/// Live-store double backed by plain maps. Keys iterate in lexical order so
/// failure-injection tests address records deterministically.
struct InMemoryCoordinator {
    deploys: Mutex<BTreeMap<DeployKey, DeployHistoryRecord>>,
    phantom_keys: Mutex<Vec<DeployKey>>,
    states: Mutex<HashMap<String, RequestDeployState>>,
    fail_enumeration: bool,
}

impl InMemoryCoordinator {
    fn new() -> Self {
        Self {
            deploys: Mutex::new(BTreeMap::new()),
            phantom_keys: Mutex::new(Vec::new()),
            states: Mutex::new(HashMap::new()),
            fail_enumeration: false,
        }
    }

    fn insert_deploy(&self, record: DeployHistoryRecord) {
        let key = DeployKey::new(record.request_id.clone(), record.deploy_id.clone());
        self.deploys.lock().unwrap().insert(key, record);
    }

    /// A key the live store enumerates without holding the record, as after
    /// a transfer that raced this cycle's enumeration.
    fn insert_phantom_key(&self, key: DeployKey) {
        self.phantom_keys.lock().unwrap().push(key);
    }

    fn set_state(&self, state: RequestDeployState) {
        self.states
            .lock()
            .unwrap()
            .insert(state.request_id.clone(), state);
    }

    fn contains(&self, key: &DeployKey) -> bool {
        self.deploys.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl DeployCoordinator for InMemoryCoordinator {
    async fn list_all_deploy_keys(&self) -> crate::error::Result<Vec<DeployKey>> {
        if self.fail_enumeration {
            return Err(HistoryError::StoreRead(
                "deploys".to_string(),
                "live store unavailable".to_string(),
            ));
        }

        let mut keys: Vec<DeployKey> = self.deploys.lock().unwrap().keys().cloned().collect();
        keys.extend(self.phantom_keys.lock().unwrap().iter().cloned());
        Ok(keys)
    }

    async fn list_deploy_states_by_request_id(
        &self,
    ) -> crate::error::Result<HashMap<String, RequestDeployState>> {
        Ok(self.states.lock().unwrap().clone())
    }

    async fn get_deploy_history(
        &self,
        key: &DeployKey,
    ) -> crate::error::Result<Option<DeployHistoryRecord>> {
        Ok(self.deploys.lock().unwrap().get(key).cloned())
    }

    async fn delete_deploy_history(&self, key: &DeployKey) -> crate::error::Result<()> {
        self.deploys.lock().unwrap().remove(key);
        Ok(())
    }
}

/// History-store double that rejects inserts for selected deploy ids and
/// delegates everything else to a real SQLite store.
struct RejectingStore {
    inner: SqliteHistoryStore,
    reject_deploy_ids: HashSet<String>,
}

#[async_trait]
impl HistoryStore for RejectingStore {
    async fn insert_request_history(
        &self,
        record: &RequestHistoryRecord,
    ) -> crate::error::Result<()> {
        self.inner.insert_request_history(record).await
    }

    async fn insert_deploy_history(
        &self,
        record: &DeployHistoryRecord,
    ) -> crate::error::Result<()> {
        if self.reject_deploy_ids.contains(record.deploy_id.as_str()) {
            return Err(HistoryError::StoreWrite(
                format!("{}-{}", record.request_id, record.deploy_id),
                "injected write failure".to_string(),
            ));
        }
        self.inner.insert_deploy_history(record).await
    }

    async fn insert_task_history(&self, record: &TaskHistoryRecord) -> crate::error::Result<()> {
        self.inner.insert_task_history(record).await
    }

    async fn get_task_history_for_task(
        &self,
        task_id: &str,
    ) -> crate::error::Result<Option<Vec<u8>>> {
        self.inner.get_task_history_for_task(task_id).await
    }

    async fn get_deploy_history_for_deploy(
        &self,
        request_id: &str,
        deploy_id: &str,
    ) -> crate::error::Result<Option<Vec<u8>>> {
        self.inner
            .get_deploy_history_for_deploy(request_id, deploy_id)
            .await
    }

    async fn get_deploy_history_for_request(
        &self,
        request_id: &str,
        offset: i64,
        limit: i64,
    ) -> crate::error::Result<Vec<DeployHistorySummary>> {
        self.inner
            .get_deploy_history_for_request(request_id, offset, limit)
            .await
    }

    async fn get_task_history_for_request(
        &self,
        request_id: &str,
        offset: i64,
        limit: i64,
    ) -> crate::error::Result<Vec<TaskHistorySummary>> {
        self.inner
            .get_task_history_for_request(request_id, offset, limit)
            .await
    }

    async fn get_request_history(
        &self,
        request_id: &str,
        direction: SortDirection,
        offset: i64,
        limit: i64,
    ) -> crate::error::Result<Vec<RequestHistoryEntry>> {
        self.inner
            .get_request_history(request_id, direction, offset, limit)
            .await
    }

    async fn get_request_history_like(
        &self,
        request_id_prefix: &str,
        offset: i64,
        limit: i64,
    ) -> crate::error::Result<Vec<String>> {
        self.inner
            .get_request_history_like(request_id_prefix, offset, limit)
            .await
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

async fn memory_history_store() -> SqliteHistoryStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    SqliteHistoryStore::new(pool).await.unwrap()
}

fn deploy_record(request_id: &str, deploy_id: &str) -> DeployHistoryRecord {
    let now = Utc::now();
    DeployHistoryRecord {
        request_id: request_id.to_string(),
        deploy_id: deploy_id.to_string(),
        created_at: now,
        user: "deployer".to_string(),
        deploy_state_at: now,
        deploy_state: "SUCCEEDED".to_string(),
        payload: serde_json::to_vec(&serde_json::json!({ "deployId": deploy_id })).unwrap(),
    }
}

#[test]
fn missing_state_is_eligible() {
    let key = DeployKey::new("svc-a", "d1");
    assert!(should_transfer(None, &key));
}

#[test]
fn active_and_pending_deploys_are_not_eligible() {
    let state = RequestDeployState {
        request_id: "svc-a".to_string(),
        active_deploy: Some(DeployKey::new("svc-a", "d1")),
        pending_deploy: Some(DeployKey::new("svc-a", "d2")),
    };

    assert!(!should_transfer(Some(&state), &DeployKey::new("svc-a", "d1")));
    assert!(!should_transfer(Some(&state), &DeployKey::new("svc-a", "d2")));
    assert!(should_transfer(Some(&state), &DeployKey::new("svc-a", "d3")));
}

#[tokio::test]
async fn archives_only_unreferenced_deploys() {
    let coordinator = Arc::new(InMemoryCoordinator::new());
    for deploy_id in ["d1", "d2", "d3"] {
        coordinator.insert_deploy(deploy_record("svc-a", deploy_id));
    }
    coordinator.set_state(RequestDeployState {
        request_id: "svc-a".to_string(),
        active_deploy: Some(DeployKey::new("svc-a", "d1")),
        pending_deploy: Some(DeployKey::new("svc-a", "d2")),
    });

    let history = Arc::new(memory_history_store().await);
    let reconciler = DeployHistoryReconciler::new(coordinator.clone(), history.clone());

    let summary = reconciler.run_once().await.unwrap();
    assert_eq!(
        summary,
        ReconcileSummary {
            total: 1,
            transferred: 1
        }
    );

    // d3 moved, d1/d2 untouched.
    assert!(history
        .get_deploy_history_for_deploy("svc-a", "d3")
        .await
        .unwrap()
        .is_some());
    assert!(!coordinator.contains(&DeployKey::new("svc-a", "d3")));
    assert!(coordinator.contains(&DeployKey::new("svc-a", "d1")));
    assert!(coordinator.contains(&DeployKey::new("svc-a", "d2")));
    assert!(history
        .get_deploy_history_for_deploy("svc-a", "d1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn deploy_without_state_is_archived() {
    let coordinator = Arc::new(InMemoryCoordinator::new());
    coordinator.insert_deploy(deploy_record("svc-orphan", "d1"));

    let history = Arc::new(memory_history_store().await);
    let reconciler = DeployHistoryReconciler::new(coordinator.clone(), history.clone());

    let summary = reconciler.run_once().await.unwrap();
    assert_eq!(
        summary,
        ReconcileSummary {
            total: 1,
            transferred: 1
        }
    );
    assert!(!coordinator.contains(&DeployKey::new("svc-orphan", "d1")));
    assert!(history
        .get_deploy_history_for_deploy("svc-orphan", "d1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn second_cycle_transfers_nothing_new() {
    let coordinator = Arc::new(InMemoryCoordinator::new());
    coordinator.insert_deploy(deploy_record("svc-a", "d1"));
    coordinator.insert_deploy(deploy_record("svc-b", "d2"));

    let history = Arc::new(memory_history_store().await);
    let reconciler = DeployHistoryReconciler::new(coordinator.clone(), history.clone());

    let first = reconciler.run_once().await.unwrap();
    assert_eq!(
        first,
        ReconcileSummary {
            total: 2,
            transferred: 2
        }
    );

    let second = reconciler.run_once().await.unwrap();
    assert_eq!(second, ReconcileSummary::default());

    // Still exactly one archived row per deploy.
    let rows = history
        .get_deploy_history_for_request("svc-a", 0, 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn one_rejected_write_does_not_block_the_batch() {
    let coordinator = Arc::new(InMemoryCoordinator::new());
    for deploy_id in ["d1", "d2", "d3"] {
        coordinator.insert_deploy(deploy_record("svc-a", deploy_id));
    }

    let history = Arc::new(RejectingStore {
        inner: memory_history_store().await,
        reject_deploy_ids: HashSet::from(["d2".to_string()]),
    });
    let reconciler = DeployHistoryReconciler::new(coordinator.clone(), history.clone());

    let summary = reconciler.run_once().await.unwrap();
    assert_eq!(
        summary,
        ReconcileSummary {
            total: 3,
            transferred: 2
        }
    );

    // The rejected record stays live for the next cycle; the others moved.
    assert!(coordinator.contains(&DeployKey::new("svc-a", "d2")));
    assert!(!coordinator.contains(&DeployKey::new("svc-a", "d1")));
    assert!(!coordinator.contains(&DeployKey::new("svc-a", "d3")));
    assert!(history
        .get_deploy_history_for_deploy("svc-a", "d2")
        .await
        .unwrap()
        .is_none());
    assert!(history
        .get_deploy_history_for_deploy("svc-a", "d1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn enumerated_key_without_record_counts_as_attempted() {
    let coordinator = Arc::new(InMemoryCoordinator::new());
    coordinator.insert_phantom_key(DeployKey::new("svc-a", "d1"));

    let history = Arc::new(memory_history_store().await);
    let reconciler = DeployHistoryReconciler::new(coordinator, history.clone());

    let summary = reconciler.run_once().await.unwrap();
    assert_eq!(
        summary,
        ReconcileSummary {
            total: 1,
            transferred: 0
        }
    );
    assert!(history
        .get_deploy_history_for_deploy("svc-a", "d1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn failed_enumeration_ends_the_cycle() {
    let coordinator = Arc::new(InMemoryCoordinator {
        fail_enumeration: true,
        ..InMemoryCoordinator::new()
    });

    let history = Arc::new(memory_history_store().await);
    let reconciler = DeployHistoryReconciler::new(coordinator, history);

    let result = reconciler.run_once().await;
    assert!(matches!(result, Err(HistoryError::StoreRead(_, _))));
}
