use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use common::Partitioner;

use crate::error::OrchestratorError;

/// What the coordinator does when a worker reports a role-specific ERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ErrorPolicy {
    /// ERROR is terminal: the job fails and reports why.
    #[default]
    Fail,

    /// ERROR counts as not done yet; the job keeps polling until it is
    /// cancelled or times out.
    Wait,
}

/// How completion polling is paced.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay before the second poll.
    pub interval: Duration,

    /// Growth factor applied to the delay after every unsuccessful poll.
    /// `1.0` polls on a fixed interval.
    pub multiplier: f64,

    /// Upper bound on the delay.
    pub max_interval: Duration,

    /// Give up on a phase after this long. `None` waits forever.
    pub phase_timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            multiplier: 1.0,
            max_interval: Duration::from_secs(60),
            phase_timeout: None,
        }
    }
}

impl PollPolicy {
    pub fn next_delay(&self, current: Duration) -> Duration {
        let grown = current.as_secs_f64() * self.multiplier.max(1.0);
        Duration::try_from_secs_f64(grown)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// Static cluster topology and job settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Map workers, bound to input shards by position.
    pub map_workers: Vec<String>,

    /// Reduce workers. Their count is the number of partitions R.
    pub reduce_workers: Vec<String>,

    /// Glob selecting the input shards, resolved when a job starts.
    pub input_glob: String,

    /// Directory holding one `job-<id>/output-<j>.json` per job and partition.
    pub output_dir: PathBuf,

    /// Address clients reach the coordinator on.
    pub advertise_url: String,

    pub partitioner: Partitioner,

    pub poll: PollPolicy,

    /// Attempts per task dispatch before the job fails.
    pub dispatch_attempts: u32,

    /// How long a cancelled or failed job waits for its workers to stop
    /// running before its intermediates are collected and the next job
    /// starts.
    pub drain_timeout: Duration,

    pub error_policy: ErrorPolicy,

    /// Leave a finished job's intermediate partitions in the store.
    pub keep_intermediate: bool,
}

impl CoordinatorConfig {
    pub fn new(map_workers: Vec<String>, reduce_workers: Vec<String>) -> Self {
        Self {
            map_workers,
            reduce_workers,
            input_glob: "data/parts/*.txt".to_string(),
            output_dir: PathBuf::from("public"),
            advertise_url: "http://127.0.0.1:8030".to_string(),
            partitioner: Partitioner::default(),
            poll: PollPolicy::default(),
            dispatch_attempts: 3,
            drain_timeout: Duration::from_secs(300),
            error_policy: ErrorPolicy::default(),
            keep_intermediate: false,
        }
    }

    pub fn num_reducers(&self) -> usize {
        self.reduce_workers.len()
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.map_workers.is_empty() {
            return Err(OrchestratorError::Config("no map workers configured".into()));
        }
        if self.reduce_workers.is_empty() {
            return Err(OrchestratorError::Config("no reduce workers configured".into()));
        }
        if self.poll.interval.is_zero() {
            return Err(OrchestratorError::Config("poll interval must be positive".into()));
        }
        if !self.poll.multiplier.is_finite() || self.poll.multiplier < 1.0 {
            return Err(OrchestratorError::Config(format!(
                "poll multiplier must be a finite number of at least 1, got {}",
                self.poll.multiplier
            )));
        }
        if self.dispatch_attempts == 0 {
            return Err(OrchestratorError::Config("dispatch attempts must be at least 1".into()));
        }
        Ok(())
    }
}
