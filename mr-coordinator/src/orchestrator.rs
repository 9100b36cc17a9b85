//! Drives jobs through the map and reduce phases.
//!
//! Jobs are queued and run one at a time, since every task is bound to a
//! dedicated worker address. A job dispatches its map tasks, polls them
//! until all report completion, collects the store keys each mapper wrote,
//! then dispatches and polls one reduce task per partition.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, try_join_all};
use tokio::select;
use tokio::sync::{watch, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tracing::{debug, error, info, warn};

use common::job::JobPhase;
use common::status::{Role, WorkerStatus};
use common::store::{job_prefix, SharedStore};

use crate::config::{CoordinatorConfig, ErrorPolicy, PollPolicy};
use crate::core::worker::{ProducedKeysRequest, StatusRequest, StatusResponse, TaskRequest};
use crate::core::WorkerClient;
use crate::error::OrchestratorError;
use crate::jobs::{Job, JobId, JobQueue};
use crate::tasks::{
    create_map_tasks, create_reduce_tasks, resolve_inputs, ShuffleMatrix, TaskDescriptor,
};

/// Result of one round of status polling.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Every task reported its role's COMPLETED token.
    Completed,

    /// At least one task is still running, idle or unreachable.
    Pending,

    /// A task reported its role's ERROR token and the policy treats that
    /// as terminal.
    Failed {
        worker: String,
        role: Role,
        status: WorkerStatus,
        error: String,
    },
}

/// Ask one worker for the status of the role `task` runs in.
async fn query_status(task: &TaskDescriptor) -> Result<StatusResponse, OrchestratorError> {
    let poll_error = |reason: String| OrchestratorError::Poll {
        worker: task.worker.clone(),
        reason,
    };

    let mut client = WorkerClient::connect(task.endpoint())
        .await
        .map_err(|e| poll_error(e.to_string()))?;
    let request = Request::new(StatusRequest {});
    let response = match task.role() {
        Role::Map => client.map_status(request).await,
        Role::Reduce => client.reduce_status(request).await,
    };
    response
        .map(|r| r.into_inner())
        .map_err(|status| poll_error(status.message().to_string()))
}

/// Query every task's status endpoint concurrently and classify the
/// answers under `policy`. Never fails: an unreachable worker or an
/// unparseable token counts as pending.
pub async fn poll_tasks(tasks: &[TaskDescriptor], policy: ErrorPolicy) -> PollOutcome {
    let responses = join_all(tasks.iter().map(query_status)).await;

    let mut all_completed = true;
    for (task, response) in tasks.iter().zip(responses) {
        let role = task.role();
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!("{err}");
                all_completed = false;
                continue;
            }
        };

        match response.status.parse::<WorkerStatus>() {
            Ok(status) if status == role.completed() => {}
            Ok(status) if status == role.failed() && policy == ErrorPolicy::Fail => {
                return PollOutcome::Failed {
                    worker: task.worker.clone(),
                    role,
                    status,
                    error: response.error,
                };
            }
            Ok(status) => {
                debug!("{role} task on {} is {status}", task.worker);
                all_completed = false;
            }
            Err(err) => {
                warn!("{} answered with {err}", task.worker);
                all_completed = false;
            }
        }
    }

    if all_completed {
        PollOutcome::Completed
    } else {
        PollOutcome::Pending
    }
}

/// True only if every task reports its phase's COMPLETED token. Any other
/// token, ERROR included, reads as not done yet.
pub async fn poll_completion(tasks: &[TaskDescriptor]) -> bool {
    poll_tasks(tasks, ErrorPolicy::Wait).await == PollOutcome::Completed
}

async fn dispatch_task(task: &TaskDescriptor, attempts: u32) -> Result<(), OrchestratorError> {
    let role = task.role();
    let mut reason = String::new();

    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt - 1))).await;
        }
        info!("Sending {role} task to worker: {}", task.worker);

        let mut client = match WorkerClient::connect(task.endpoint()).await {
            Ok(client) => client,
            Err(err) => {
                reason = err.to_string();
                warn!("Attempt {attempt}/{attempts} to reach {} failed: {reason}", task.worker);
                continue;
            }
        };

        let request = Request::new(TaskRequest {
            task: Some(task.payload.clone()),
        });
        match client.accept_task(request).await {
            Ok(response) => {
                let response = response.into_inner();
                if response.accepted {
                    return Ok(());
                }
                reason = format!("worker busy ({})", response.status);
                warn!("Attempt {attempt}/{attempts}: {} refused the task, {reason}", task.worker);
            }
            Err(status) => {
                reason = status.message().to_string();
                warn!("Attempt {attempt}/{attempts} to dispatch to {} failed: {reason}", task.worker);
            }
        }
    }

    Err(OrchestratorError::Dispatch {
        worker: task.worker.clone(),
        role,
        reason,
    })
}

/// Send every task to its worker concurrently. Each dispatch is retried up
/// to `attempts` times; the first task that cannot be delivered fails the
/// whole dispatch.
pub async fn dispatch_tasks(tasks: &[TaskDescriptor], attempts: u32) -> Result<(), OrchestratorError> {
    try_join_all(tasks.iter().map(|task| dispatch_task(task, attempts))).await?;
    Ok(())
}

/// Poll `tasks` until they all complete, backing off between rounds.
pub async fn wait_for_completion(
    tasks: &[TaskDescriptor],
    phase: JobPhase,
    poll: &PollPolicy,
    policy: ErrorPolicy,
    cancel: &CancellationToken,
) -> Result<(), OrchestratorError> {
    let started = Instant::now();
    let mut delay = poll.interval;

    loop {
        match poll_tasks(tasks, policy).await {
            PollOutcome::Completed => {
                info!("All tasks of {phase} completed by the workers");
                return Ok(());
            }
            PollOutcome::Failed {
                worker,
                role,
                status,
                error,
            } => {
                return Err(OrchestratorError::TaskFailed {
                    worker,
                    role,
                    status,
                    error,
                });
            }
            PollOutcome::Pending => {}
        }

        if let Some(timeout) = poll.phase_timeout {
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(OrchestratorError::Timeout { phase, waited });
            }
        }

        info!("Not all tasks of {phase} are completed. Waiting {delay:?}...");
        select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        delay = poll.next_delay(delay);
    }
}

/// Poll `tasks` until none of them reports its role's RUNNING token, or
/// until `limit` has passed. Returns whether they all went quiet.
/// Unreachable workers and unparseable tokens count as quiet.
pub async fn wait_until_settled(tasks: &[TaskDescriptor], poll: &PollPolicy, limit: Duration) -> bool {
    let started = Instant::now();
    let mut delay = poll.interval;

    loop {
        let responses = join_all(tasks.iter().map(query_status)).await;
        let running = tasks
            .iter()
            .zip(responses)
            .filter(|(task, response)| match response {
                Ok(response) => response.status.parse::<WorkerStatus>().ok() == Some(task.role().running()),
                Err(err) => {
                    warn!("{err}");
                    false
                }
            })
            .count();

        if running == 0 {
            return true;
        }
        if started.elapsed() >= limit {
            warn!("{running} tasks still running after {limit:?}");
            return false;
        }

        debug!("{running} tasks still running. Waiting {delay:?}...");
        tokio::time::sleep(delay).await;
        delay = poll.next_delay(delay);
    }
}

/// Ask every map worker which store keys it produced, one row per mapper.
/// Each row must hold exactly one key per partition.
pub async fn get_all_file_locations(
    map_tasks: &[TaskDescriptor],
    num_reducers: usize,
) -> Result<ShuffleMatrix, OrchestratorError> {
    info!("Getting all file locations from the mapper tasks");

    let queries = map_tasks.iter().map(|task| async move {
        let poll_error = |reason: String| OrchestratorError::Poll {
            worker: task.worker.clone(),
            reason,
        };
        let mut client = WorkerClient::connect(task.endpoint())
            .await
            .map_err(|e| poll_error(e.to_string()))?;
        let keys = client
            .produced_keys(Request::new(ProducedKeysRequest {}))
            .await
            .map_err(|status| poll_error(status.message().to_string()))?
            .into_inner()
            .keys;

        if keys.len() != num_reducers {
            return Err(OrchestratorError::Shuffle {
                worker: task.worker.clone(),
                expected: num_reducers,
                got: keys.len(),
            });
        }
        debug!("{} produced {keys:?}", task.worker);
        Ok::<_, OrchestratorError>(keys)
    });

    let matrix = try_join_all(queries).await?;
    info!("Received all file locations from the mapper tasks");
    Ok(matrix)
}

/// Handle to a submitted job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    phase: watch::Receiver<JobPhase>,
    cancel: CancellationToken,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Latest published phase.
    pub fn phase(&self) -> JobPhase {
        *self.phase.borrow()
    }

    /// Ask the job to stop. It ends in `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the job reaches a terminal phase and return it.
    pub async fn wait(mut self) -> JobPhase {
        loop {
            let phase = *self.phase.borrow_and_update();
            if phase.is_terminal() {
                return phase;
            }
            if self.phase.changed().await.is_err() {
                return *self.phase.borrow();
            }
        }
    }
}

/// What the status query returns.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusView {
    pub id: JobId,
    pub phase: JobPhase,
    pub output_files: Vec<String>,
    pub error: Option<String>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id(),
            phase: job.phase(),
            output_files: job.output_locations(),
            error: job.error().map(str::to_string),
        }
    }
}

/// Owns the job table and runs queued jobs against the worker topology.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<CoordinatorConfig>,
    jobs: Arc<Mutex<JobQueue>>,
    wakeup: Arc<Notify>,
    store: SharedStore,
}

impl Orchestrator {
    pub fn new(config: CoordinatorConfig, store: SharedStore) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            jobs: Arc::new(Mutex::new(JobQueue::new())),
            wakeup: Arc::new(Notify::new()),
            store,
        })
    }

    /// Queue a job and return right away. The job runs once every job
    /// submitted before it has finished.
    pub async fn submit(&self, mapper: &str, reducer: &str) -> Result<JobHandle, OrchestratorError> {
        if workload::try_named_mapper(mapper).is_none() {
            return Err(OrchestratorError::UnknownWorkload(mapper.to_string()));
        }
        if workload::try_named_reducer(reducer).is_none() {
            return Err(OrchestratorError::UnknownWorkload(reducer.to_string()));
        }

        let (id, phase, cancel) = self.jobs.lock().await.push_job(mapper, reducer);
        info!("Job {id} submitted (mapper `{mapper}`, reducer `{reducer}`)");
        self.wakeup.notify_one();

        Ok(JobHandle { id, phase, cancel })
    }

    /// How clients ask for a job's status: the `JobStatus` call on this
    /// coordinator, spelled as the matching `mr-ctl` command.
    pub fn status_location(&self, id: JobId) -> String {
        format!("mr-ctl --coordinator {} status {}", self.config.advertise_url, id)
    }

    /// Status of `id`, or of the latest job when `id` is `None`. Before any
    /// submission the latest job reads as idle.
    pub async fn status(&self, id: Option<JobId>) -> Result<JobStatusView, OrchestratorError> {
        let jobs = self.jobs.lock().await;
        match id {
            Some(id) => jobs
                .get(id)
                .map(JobStatusView::from)
                .ok_or(OrchestratorError::NoSuchJob(id)),
            None => Ok(jobs.latest().map(JobStatusView::from).unwrap_or(JobStatusView {
                id: 0,
                phase: JobPhase::Idle,
                output_files: vec![],
                error: None,
            })),
        }
    }

    /// Every job submitted so far, oldest first.
    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.get_all_jobs().cloned().collect()
    }

    pub async fn cancel(&self, id: JobId) -> bool {
        let cancelled = self.jobs.lock().await.cancel(id);
        if cancelled {
            info!("Cancellation requested for job {id}");
        }
        cancelled
    }

    /// Run queued jobs one after the other, forever.
    pub async fn run(self) {
        loop {
            let next = self.jobs.lock().await.pop_job();
            match next {
                Some((job, cancel)) => self.process_job(job, cancel).await,
                None => self.wakeup.notified().await,
            }
        }
    }

    async fn process_job(&self, job: Job, cancel: CancellationToken) {
        let id = job.id();
        info!("Starting job {id}");

        let result = self.run_job(&job, &cancel).await;
        let completed = result.is_ok();

        let dispatched = {
            let mut jobs = self.jobs.lock().await;
            let recorded = match result {
                Ok(()) => jobs.advance(id, JobPhase::ReduceCompleted),
                Err(OrchestratorError::Cancelled) => {
                    warn!("Job {id} cancelled");
                    jobs.advance(id, JobPhase::Cancelled)
                }
                Err(err) => {
                    error!("Job {id} failed: {err}");
                    jobs.fail(id, err.to_string())
                }
            };
            if let Err(err) = recorded {
                error!("Could not record the outcome of job {id}: {err}");
            }
            let dispatched = jobs
                .get(id)
                .map(|job| [job.map_tasks(), job.reduce_tasks()].concat())
                .unwrap_or_default();
            dispatched
        };

        // Tasks of an abandoned job may still be running. Their workers
        // must finish before they accept the next job's tasks, and a late
        // mapper would write after the cleanup below.
        if !completed && !dispatched.is_empty() {
            info!("Waiting for the workers of job {id} to finish");
            if !wait_until_settled(&dispatched, &self.config.poll, self.config.drain_timeout).await {
                warn!("Moving on from job {id} with workers still running");
            }
        }

        if !self.config.keep_intermediate {
            match self.store.delete_prefix(&job_prefix(id)).await {
                Ok(removed) => debug!("Removed {removed} intermediate entries of job {id}"),
                Err(err) => warn!("Failed to clean up intermediate entries of job {id}: {err}"),
            }
        }
    }

    async fn advance(&self, id: JobId, phase: JobPhase) -> Result<(), OrchestratorError> {
        self.jobs.lock().await.advance(id, phase)
    }

    /// Dispatch, unless cancelled first.
    async fn dispatch(&self, tasks: &[TaskDescriptor], cancel: &CancellationToken) -> Result<(), OrchestratorError> {
        select! {
            biased;
            _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
            result = dispatch_tasks(tasks, self.config.dispatch_attempts) => result,
        }
    }

    async fn run_job(&self, job: &Job, cancel: &CancellationToken) -> Result<(), OrchestratorError> {
        let id = job.id();
        let config = &self.config;
        let num_reducers = config.num_reducers();

        // 1. Map phase.
        info!(".......................Starting MAP PHASE.......................");
        self.advance(id, JobPhase::MapPhase).await?;

        let inputs = resolve_inputs(&config.input_glob)?;
        let map_tasks = create_map_tasks(
            id,
            &inputs,
            &config.map_workers,
            job.mapper(),
            num_reducers,
            config.partitioner,
        )?;
        info!("Created {} map tasks", map_tasks.len());
        self.jobs.lock().await.set_map_tasks(id, map_tasks.clone())?;

        self.dispatch(&map_tasks, cancel).await?;
        wait_for_completion(&map_tasks, JobPhase::MapPhase, &config.poll, config.error_policy, cancel).await?;

        // 2. Shuffle and reduce phase.
        info!(".......................Starting REDUCE PHASE.......................");
        let matrix = get_all_file_locations(&map_tasks, num_reducers).await?;
        let reduce_tasks = create_reduce_tasks(
            id,
            &matrix,
            &config.reduce_workers,
            job.reducer(),
            &config.output_dir,
        );
        {
            let mut jobs = self.jobs.lock().await;
            jobs.set_reduce_tasks(id, reduce_tasks.clone())?;
            jobs.advance(id, JobPhase::ReducePhase)?;
        }

        self.dispatch(&reduce_tasks, cancel).await?;
        wait_for_completion(&reduce_tasks, JobPhase::ReducePhase, &config.poll, config.error_policy, cancel).await?;

        info!("Job {id} completed");
        Ok(())
    }
}
