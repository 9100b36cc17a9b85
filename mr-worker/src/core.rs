//
// Import gRPC stubs/definitions.
//
pub use worker::worker_server::{Worker, WorkerServer};
pub use worker::{
    task_request::Task, MapTask, ProducedKeysRequest, ProducedKeysResponse, ReduceTask,
    StatusRequest, StatusResponse, TaskRequest, TaskResponse,
};
pub mod worker {
    tonic::include_proto!("worker");
}

use std::sync::Arc;

use tokio::sync::Mutex;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn};

use common::error::TaskError;
use common::status::{Role, WorkerStatus};
use common::store::SharedStore;

use crate::{map, reduce};

/// Status of one role, plus why its last task failed.
#[derive(Debug)]
struct RoleState {
    status: WorkerStatus,
    error: Option<String>,
}

impl Default for RoleState {
    fn default() -> Self {
        Self {
            status: WorkerStatus::Idle,
            error: None,
        }
    }
}

#[derive(Debug, Default)]
struct WorkerState {
    map: RoleState,
    reduce: RoleState,

    /// Store keys written by the last successful map task.
    produced_keys: Vec<String>,
}

impl WorkerState {
    fn role(&self, role: Role) -> &RoleState {
        match role {
            Role::Map => &self.map,
            Role::Reduce => &self.reduce,
        }
    }

    fn role_mut(&mut self, role: Role) -> &mut RoleState {
        match role {
            Role::Map => &mut self.map,
            Role::Reduce => &mut self.reduce,
        }
    }

    /// Role-agnostic status.
    fn overall(&self) -> WorkerStatus {
        if self.map.status.is_running() || self.reduce.status.is_running() {
            WorkerStatus::Running
        } else {
            WorkerStatus::Idle
        }
    }
}

/// A worker able to run one map task and one reduce task at a time.
#[derive(Clone)]
pub struct MRWorker {
    /// Address the coordinator knows this worker by. Part of every store
    /// key the worker writes.
    identity: String,

    store: SharedStore,

    state: Arc<Mutex<WorkerState>>,
}

impl MRWorker {
    pub fn new(identity: impl Into<String>, store: SharedStore) -> MRWorker {
        MRWorker {
            identity: identity.into(),
            store,
            state: Arc::new(Mutex::new(WorkerState::default())),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    async fn status_of(&self, role: Role) -> StatusResponse {
        let state = self.state.lock().await;
        let role = state.role(role);
        StatusResponse {
            status: role.status.to_string(),
            error: role.error.clone().unwrap_or_default(),
        }
    }

    /// Execute a task that has already been marked as running.
    async fn run(self, task: Task) {
        match task {
            Task::Map(task) => {
                let result = map::perform_map(task, &self.identity, self.store.as_ref()).await;
                let mut state = self.state.lock().await;
                match result {
                    Ok(keys) => {
                        // Keys are published together with the status flip, after
                        // every write has returned.
                        state.produced_keys = keys;
                        state.map.status = WorkerStatus::MapCompleted;
                        info!("Map task completed");
                    }
                    Err(err) => Self::record_failure(&mut state, Role::Map, err),
                }
            }
            Task::Reduce(task) => {
                let result = reduce::perform_reduce(task, self.store.as_ref()).await;
                let mut state = self.state.lock().await;
                match result {
                    Ok(location) => {
                        state.reduce.status = WorkerStatus::ReduceCompleted;
                        info!("Reduce task completed, output at `{location}`");
                    }
                    Err(err) => Self::record_failure(&mut state, Role::Reduce, err),
                }
            }
        }
    }

    fn record_failure(state: &mut WorkerState, role: Role, err: TaskError) {
        error!("{role} task failed: {err}");
        let role_state = state.role_mut(role);
        role_state.status = role.failed();
        role_state.error = Some(err.to_string());
    }
}

#[tonic::async_trait]
impl Worker for MRWorker {
    async fn accept_task(
        &self,
        request: Request<TaskRequest>,
    ) -> Result<Response<TaskResponse>, Status> {
        debug!("Received a work request");

        let task = request
            .into_inner()
            .task
            .ok_or_else(|| Status::invalid_argument("task payload missing"))?;
        let role = match &task {
            Task::Map(_) => Role::Map,
            Task::Reduce(_) => Role::Reduce,
        };

        {
            let mut state = self.state.lock().await;

            // we accept the work only if this role is free
            let current = state.role(role).status;
            if current.is_running() {
                warn!("Refusing {role} task, one is already running");
                return Ok(Response::new(TaskResponse {
                    status: current.to_string(),
                    accepted: false,
                }));
            }

            let role_state = state.role_mut(role);
            role_state.status = role.running();
            role_state.error = None;
            if role == Role::Map {
                state.produced_keys.clear();
            }
        }

        tokio::spawn(self.clone().run(task));

        Ok(Response::new(TaskResponse {
            status: role.running().to_string(),
            accepted: true,
        }))
    }

    async fn map_status(
        &self,
        _: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        Ok(Response::new(self.status_of(Role::Map).await))
    }

    async fn reduce_status(
        &self,
        _: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        Ok(Response::new(self.status_of(Role::Reduce).await))
    }

    async fn worker_status(
        &self,
        _: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        let state = self.state.lock().await;
        Ok(Response::new(StatusResponse {
            status: state.overall().to_string(),
            error: String::new(),
        }))
    }

    async fn produced_keys(
        &self,
        _: Request<ProducedKeysRequest>,
    ) -> Result<Response<ProducedKeysResponse>, Status> {
        let state = self.state.lock().await;
        Ok(Response::new(ProducedKeysResponse {
            keys: state.produced_keys.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use common::partition::Partitioner;
    use common::store::{IntermediateStore, MemoryStore};

    fn map_request(input: &str, num_reducers: u32) -> Request<TaskRequest> {
        Request::new(TaskRequest {
            task: Some(Task::Map(MapTask {
                job_id: 3,
                input_location: input.to_string(),
                mapper: "wc".to_string(),
                num_reducers,
                partitioner: Partitioner::default().name().to_string(),
            })),
        })
    }

    async fn wait_for(worker: &MRWorker, role: Role) -> StatusResponse {
        for _ in 0..200 {
            let status = worker.status_of(role).await;
            if status.status != role.running().as_str() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{role} task never finished");
    }

    #[tokio::test]
    async fn starts_idle() {
        let worker = MRWorker::new("w", Arc::new(MemoryStore::new()));
        let map = worker.map_status(Request::new(StatusRequest {})).await.unwrap();
        let reduce = worker.reduce_status(Request::new(StatusRequest {})).await.unwrap();
        let overall = worker.worker_status(Request::new(StatusRequest {})).await.unwrap();
        assert_eq!(map.into_inner().status, "WORKER_IDLE");
        assert_eq!(reduce.into_inner().status, "WORKER_IDLE");
        assert_eq!(overall.into_inner().status, "WORKER_IDLE");
    }

    #[tokio::test]
    async fn map_task_completes_and_publishes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        std::fs::write(&input, "a b c").unwrap();
        let store = MemoryStore::new();
        let worker = MRWorker::new("127.0.0.1:9000", Arc::new(store.clone()));

        let accepted = worker
            .accept_task(map_request(&input.to_string_lossy(), 2))
            .await
            .unwrap()
            .into_inner();
        assert!(accepted.accepted);
        assert_eq!(accepted.status, "MAP_RUNNING");

        let done = wait_for(&worker, Role::Map).await;
        assert_eq!(done.status, "MAP_COMPLETED");

        let keys = worker
            .produced_keys(Request::new(ProducedKeysRequest {}))
            .await
            .unwrap()
            .into_inner()
            .keys;
        assert_eq!(keys.len(), 2);
        for key in &keys {
            assert!(store.get(key).await.is_ok());
        }

        let overall = worker.worker_status(Request::new(StatusRequest {})).await.unwrap();
        assert_eq!(overall.into_inner().status, "WORKER_IDLE");
    }

    #[tokio::test]
    async fn failed_map_reports_map_error() {
        let worker = MRWorker::new("w", Arc::new(MemoryStore::new()));
        worker
            .accept_task(map_request("/definitely/not/here.txt", 2))
            .await
            .unwrap();

        let done = wait_for(&worker, Role::Map).await;
        assert_eq!(done.status, "MAP_ERROR");
        assert!(done.error.contains("/definitely/not/here.txt"));

        // The reduce role is tracked separately.
        let reduce = worker.status_of(Role::Reduce).await;
        assert_eq!(reduce.status, "WORKER_IDLE");
    }

    #[tokio::test]
    async fn reduce_task_runs_through_the_service() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output-0.json");
        let store = MemoryStore::new();
        store
            .put("k0", common::codec::encode_partition(&[common::KeyValue::new("x", 4)]).unwrap())
            .await
            .unwrap();
        let worker = MRWorker::new("w", Arc::new(store));

        let accepted = worker
            .accept_task(Request::new(TaskRequest {
                task: Some(Task::Reduce(ReduceTask {
                    job_id: 3,
                    partition: 0,
                    store_keys: vec!["k0".to_string()],
                    reducer: "sum".to_string(),
                    output_location: output.to_string_lossy().into_owned(),
                })),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(accepted.accepted);
        assert_eq!(accepted.status, "REDUCE_RUNNING");

        assert_eq!(wait_for(&worker, Role::Reduce).await.status, "REDUCE_COMPLETED");
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(written, serde_json::json!({"x": 4}));
    }

    #[tokio::test]
    async fn missing_payload_is_invalid() {
        let worker = MRWorker::new("w", Arc::new(MemoryStore::new()));
        let err = worker
            .accept_task(Request::new(TaskRequest { task: None }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
