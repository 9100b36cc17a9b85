#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use common::store::SharedStore;
use mr_coordinator::core::worker::task_request::Task;
use mr_coordinator::core::worker::worker_server::{Worker, WorkerServer};
use mr_coordinator::core::worker::{
    ProducedKeysRequest, ProducedKeysResponse, StatusRequest, StatusResponse, TaskRequest,
    TaskResponse,
};
use mr_coordinator::{CoordinatorConfig, PollPolicy};

/// What a scripted worker answers.
#[derive(Debug)]
pub struct Script {
    pub map_status: String,
    pub reduce_status: String,
    pub error: String,

    /// Status a role switches to once a task is accepted.
    pub map_after: String,
    pub reduce_after: String,

    pub refuse: bool,
    pub keys: Vec<String>,
    pub received: Vec<Task>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            map_status: "WORKER_IDLE".into(),
            reduce_status: "WORKER_IDLE".into(),
            error: String::new(),
            map_after: "MAP_COMPLETED".into(),
            reduce_after: "REDUCE_COMPLETED".into(),
            refuse: false,
            keys: vec![],
            received: vec![],
        }
    }
}

/// Worker service answering from a [`Script`] instead of running tasks.
#[derive(Clone, Default)]
pub struct FakeWorker(Arc<Mutex<Script>>);

impl FakeWorker {
    pub fn new(configure: impl FnOnce(&mut Script)) -> Self {
        let fake = Self::default();
        fake.update(configure);
        fake
    }

    pub fn update(&self, configure: impl FnOnce(&mut Script)) {
        configure(&mut self.0.lock().unwrap());
    }

    pub fn received(&self) -> usize {
        self.0.lock().unwrap().received.len()
    }
}

#[tonic::async_trait]
impl Worker for FakeWorker {
    async fn accept_task(
        &self,
        request: Request<TaskRequest>,
    ) -> Result<Response<TaskResponse>, Status> {
        let task = request
            .into_inner()
            .task
            .ok_or_else(|| Status::invalid_argument("task payload missing"))?;
        let mut script = self.0.lock().unwrap();
        let busy = match &task {
            Task::Map(_) => script.map_status == "MAP_RUNNING",
            Task::Reduce(_) => script.reduce_status == "REDUCE_RUNNING",
        };
        if script.refuse || busy {
            return Ok(Response::new(TaskResponse {
                status: "MAP_RUNNING".into(),
                accepted: false,
            }));
        }

        let status = match &task {
            Task::Map(_) => {
                script.map_status = script.map_after.clone();
                "MAP_RUNNING"
            }
            Task::Reduce(_) => {
                script.reduce_status = script.reduce_after.clone();
                "REDUCE_RUNNING"
            }
        };
        script.received.push(task);
        Ok(Response::new(TaskResponse {
            status: status.into(),
            accepted: true,
        }))
    }

    async fn map_status(
        &self,
        _: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        let script = self.0.lock().unwrap();
        Ok(Response::new(StatusResponse {
            status: script.map_status.clone(),
            error: script.error.clone(),
        }))
    }

    async fn reduce_status(
        &self,
        _: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        let script = self.0.lock().unwrap();
        Ok(Response::new(StatusResponse {
            status: script.reduce_status.clone(),
            error: script.error.clone(),
        }))
    }

    async fn worker_status(
        &self,
        _: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        Ok(Response::new(StatusResponse {
            status: "WORKER_IDLE".into(),
            error: String::new(),
        }))
    }

    async fn produced_keys(
        &self,
        _: Request<ProducedKeysRequest>,
    ) -> Result<Response<ProducedKeysResponse>, Status> {
        Ok(Response::new(ProducedKeysResponse {
            keys: self.0.lock().unwrap().keys.clone(),
        }))
    }
}

/// Serve `fake` on an ephemeral port and return its address.
pub async fn spawn_fake(fake: FakeWorker) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(
        Server::builder()
            .add_service(WorkerServer::new(fake))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    addr
}

/// Run a real worker backed by `store` on an ephemeral port.
pub async fn spawn_worker(store: SharedStore) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let worker = mr_worker::MRWorker::new(addr.clone(), store);
    tokio::spawn(
        Server::builder()
            .add_service(mr_worker::WorkerServer::new(worker))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

pub fn write_inputs(dir: &Path, shards: &[&str]) {
    for (i, content) in shards.iter().enumerate() {
        std::fs::write(dir.join(format!("part-{i}.txt")), content).unwrap();
    }
}

/// Configuration polling every few milliseconds.
pub fn fast_config(
    map_workers: Vec<String>,
    reduce_workers: Vec<String>,
    inputs: &Path,
    output: &Path,
) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::new(map_workers, reduce_workers);
    config.input_glob = format!("{}/*.txt", inputs.display());
    config.output_dir = output.to_path_buf();
    config.poll = PollPolicy {
        interval: Duration::from_millis(10),
        multiplier: 1.5,
        max_interval: Duration::from_millis(50),
        phase_timeout: None,
    };
    config.dispatch_attempts = 1;
    config.drain_timeout = Duration::from_secs(5);
    config
}
