use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use common::job::JobPhase;

use crate::error::OrchestratorError;
use crate::tasks::TaskDescriptor;

pub type JobId = u64;

/// A job context.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,

    /// Name of the map function.
    mapper: String,

    /// Name of the reduce function.
    reducer: String,

    /// The current phase of the job.
    phase: JobPhase,

    map_tasks: Vec<TaskDescriptor>,

    reduce_tasks: Vec<TaskDescriptor>,

    /// Why the job failed.
    error: Option<String>,
}

impl Job {
    pub fn new(id: JobId, mapper: impl Into<String>, reducer: impl Into<String>) -> Self {
        Self {
            id,
            mapper: mapper.into(),
            reducer: reducer.into(),
            phase: JobPhase::Idle,
            map_tasks: vec![],
            reduce_tasks: vec![],
            error: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn mapper(&self) -> &str {
        &self.mapper
    }

    pub fn reducer(&self) -> &str {
        &self.reducer
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn map_tasks(&self) -> &[TaskDescriptor] {
        &self.map_tasks
    }

    pub fn reduce_tasks(&self) -> &[TaskDescriptor] {
        &self.reduce_tasks
    }

    /// Move to `next`, refusing anything but a forward step.
    pub fn advance(&mut self, next: JobPhase) -> Result<(), OrchestratorError> {
        if !self.phase.can_advance_to(next) {
            return Err(OrchestratorError::IllegalTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Output files of the job. Empty until every reduce task completed.
    pub fn output_locations(&self) -> Vec<String> {
        if self.phase != JobPhase::ReduceCompleted {
            return vec![];
        }
        self.reduce_tasks
            .iter()
            .filter_map(|task| task.output_location().map(str::to_string))
            .collect()
    }
}

/// A queued job together with the handles used to observe and cancel it.
#[derive(Debug)]
struct JobEntry {
    job: Job,
    phase_tx: watch::Sender<JobPhase>,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
/// Job queue.
///
/// Jobs are kept in order to maintain history, and a job's id is its
/// position in the queue.
pub struct JobQueue {
    /// Job contexts.
    jobs: Vec<JobEntry>,

    /// Index of the next job to run.
    current_index: usize,
}

impl JobQueue {
    /// Default Ctor.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of jobs which have been queued (including completed ones).
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Return the number of jobs which have not been picked up yet.
    pub fn number_of_jobs_pending(&self) -> usize {
        self.len() - self.current_index
    }

    /// Queue a new job, returning its id and the receiving end of its phase
    /// updates.
    pub fn push_job(
        &mut self,
        mapper: &str,
        reducer: &str,
    ) -> (JobId, watch::Receiver<JobPhase>, CancellationToken) {
        let id = self.jobs.len() as JobId;
        let (phase_tx, phase_rx) = watch::channel(JobPhase::Idle);
        let cancel = CancellationToken::new();
        self.jobs.push(JobEntry {
            job: Job::new(id, mapper, reducer),
            phase_tx,
            cancel: cancel.clone(),
        });
        (id, phase_rx, cancel)
    }

    /// Return the next job to run and move past it. Jobs cancelled while
    /// queued are skipped.
    pub fn pop_job(&mut self) -> Option<(Job, CancellationToken)> {
        while let Some(entry) = self.jobs.get(self.current_index) {
            self.current_index += 1;
            if !entry.job.phase.is_terminal() {
                return Some((entry.job.clone(), entry.cancel.clone()));
            }
        }
        None
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(id as usize).map(|entry| &entry.job)
    }

    /// The most recently submitted job.
    pub fn latest(&self) -> Option<&Job> {
        self.jobs.last().map(|entry| &entry.job)
    }

    /// Get the entries of all jobs.
    pub fn get_all_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().map(|entry| &entry.job)
    }

    fn entry_mut(&mut self, id: JobId) -> Result<&mut JobEntry, OrchestratorError> {
        self.jobs
            .get_mut(id as usize)
            .ok_or(OrchestratorError::NoSuchJob(id))
    }

    /// Advance a job's phase and publish it to its watchers.
    pub fn advance(&mut self, id: JobId, next: JobPhase) -> Result<(), OrchestratorError> {
        let entry = self.entry_mut(id)?;
        entry.job.advance(next)?;
        entry.phase_tx.send_replace(next);
        Ok(())
    }

    /// End a job in `Failed` with the given reason.
    pub fn fail(&mut self, id: JobId, reason: String) -> Result<(), OrchestratorError> {
        self.advance(id, JobPhase::Failed)?;
        self.entry_mut(id)?.job.error = Some(reason);
        Ok(())
    }

    pub fn set_map_tasks(&mut self, id: JobId, tasks: Vec<TaskDescriptor>) -> Result<(), OrchestratorError> {
        self.entry_mut(id)?.job.map_tasks = tasks;
        Ok(())
    }

    pub fn set_reduce_tasks(&mut self, id: JobId, tasks: Vec<TaskDescriptor>) -> Result<(), OrchestratorError> {
        self.entry_mut(id)?.job.reduce_tasks = tasks;
        Ok(())
    }

    /// Request cancellation. A job that was not picked up yet ends
    /// `Cancelled` right away, a running one once the runner notices. Returns false for unknown or
    /// finished jobs.
    pub fn cancel(&mut self, id: JobId) -> bool {
        let queued = id as usize >= self.current_index;
        let Ok(entry) = self.entry_mut(id) else {
            return false;
        };
        if entry.job.phase.is_terminal() {
            return false;
        }
        entry.cancel.cancel();
        if queued {
            let _ = self.advance(id, JobPhase::Cancelled);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::worker::{task_request::Task, ReduceTask};

    fn reduce_task(output: &str) -> TaskDescriptor {
        TaskDescriptor {
            worker: "r".into(),
            payload: Task::Reduce(ReduceTask {
                output_location: output.into(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn outputs_only_after_completion() {
        let mut job = Job::new(0, "wc", "wc");
        job.reduce_tasks = vec![reduce_task("out/output-0.json"), reduce_task("out/output-1.json")];

        for phase in [JobPhase::MapPhase, JobPhase::ReducePhase] {
            job.advance(phase).unwrap();
            assert!(job.output_locations().is_empty());
        }
        job.advance(JobPhase::ReduceCompleted).unwrap();
        assert_eq!(job.output_locations(), vec!["out/output-0.json", "out/output-1.json"]);
    }

    #[test]
    fn phases_never_regress() {
        let mut job = Job::new(0, "wc", "wc");
        job.advance(JobPhase::MapPhase).unwrap();
        assert!(matches!(
            job.advance(JobPhase::Idle),
            Err(OrchestratorError::IllegalTransition { .. })
        ));
        assert!(job.advance(JobPhase::ReduceCompleted).is_err());
        assert_eq!(job.phase(), JobPhase::MapPhase);
    }

    #[test]
    fn queue_hands_out_jobs_in_order() {
        let mut queue = JobQueue::new();
        let (first, _, _) = queue.push_job("wc", "wc");
        let (second, _, _) = queue.push_job("wc", "sum");
        assert_eq!((first, second), (0, 1));
        assert_eq!(queue.number_of_jobs_pending(), 2);

        assert_eq!(queue.pop_job().unwrap().0.id(), 0);
        assert_eq!(queue.pop_job().unwrap().0.reducer(), "sum");
        assert!(queue.pop_job().is_none());
        assert_eq!(queue.latest().unwrap().id(), 1);
    }

    #[test]
    fn cancelled_queued_jobs_are_skipped() {
        let mut queue = JobQueue::new();
        let (first, phase, token) = queue.push_job("wc", "wc");
        queue.push_job("wc", "wc");

        assert!(queue.cancel(first));
        assert!(token.is_cancelled());
        assert_eq!(*phase.borrow(), JobPhase::Cancelled);
        assert!(!queue.cancel(first));
        assert!(!queue.cancel(42));

        assert_eq!(queue.pop_job().unwrap().0.id(), 1);
    }

    #[test]
    fn running_jobs_are_left_to_the_runner() {
        let mut queue = JobQueue::new();
        let (id, phase, token) = queue.push_job("wc", "wc");
        queue.pop_job().unwrap();

        assert!(queue.cancel(id));
        assert!(token.is_cancelled());
        assert_eq!(*phase.borrow(), JobPhase::Idle);

        queue.advance(id, JobPhase::MapPhase).unwrap();
        queue.advance(id, JobPhase::Cancelled).unwrap();
        assert!(!queue.cancel(id));
    }

    #[test]
    fn advance_publishes_phase() {
        let mut queue = JobQueue::new();
        let (id, phase, _) = queue.push_job("wc", "wc");
        queue.advance(id, JobPhase::MapPhase).unwrap();
        assert_eq!(*phase.borrow(), JobPhase::MapPhase);

        queue.fail(id, "boom".into()).unwrap();
        assert_eq!(*phase.borrow(), JobPhase::Failed);
        assert_eq!(queue.get(id).unwrap().error(), Some("boom"));
    }
}
