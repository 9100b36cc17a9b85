use std::fmt;
use std::str::FromStr;

/// Phase of a job.
///
/// Phases only move forward: `Idle -> MapPhase -> ReducePhase ->
/// ReduceCompleted`. `Failed` and `Cancelled` are terminal and can be entered
/// from any phase that is not already terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// Job not started.
    Idle,

    /// Mapping phase.
    MapPhase,

    /// Reducing phase.
    ReducePhase,

    /// Job completed.
    ReduceCompleted,

    /// A task failed, timed out, or could not be dispatched.
    Failed,

    /// Cancelled before completion.
    Cancelled,
}

impl JobPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            // An idle job reports the same token as an idle worker.
            JobPhase::Idle => "WORKER_IDLE",
            JobPhase::MapPhase => "MAP_PHASE",
            JobPhase::ReducePhase => "REDUCE_PHASE",
            JobPhase::ReduceCompleted => "REDUCE_COMPLETED",
            JobPhase::Failed => "FAILED",
            JobPhase::Cancelled => "CANCELLED",
        }
    }

    fn rank(self) -> u8 {
        match self {
            JobPhase::Idle => 0,
            JobPhase::MapPhase => 1,
            JobPhase::ReducePhase => 2,
            JobPhase::ReduceCompleted | JobPhase::Failed | JobPhase::Cancelled => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(self, next: JobPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobPhase::Failed | JobPhase::Cancelled => true,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WORKER_IDLE" => Ok(JobPhase::Idle),
            "MAP_PHASE" => Ok(JobPhase::MapPhase),
            "REDUCE_PHASE" => Ok(JobPhase::ReducePhase),
            "REDUCE_COMPLETED" => Ok(JobPhase::ReduceCompleted),
            "FAILED" => Ok(JobPhase::Failed),
            "CANCELLED" => Ok(JobPhase::Cancelled),
            other => Err(format!("unknown job phase `{other}`")),
        }
    }
}
