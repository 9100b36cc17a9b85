use std::time::Duration;

use thiserror::Error;
use tonic::Status;

use common::job::JobPhase;
use common::status::{Role, WorkerStatus};

use crate::jobs::JobId;

/// Why a job could not make progress.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{shards} input shards but only {workers} map workers are configured")]
    Capacity { shards: usize, workers: usize },

    #[error("cannot resolve inputs `{pattern}`: {reason}")]
    Input { pattern: String, reason: String },

    #[error("failed to dispatch {role} task to {worker}: {reason}")]
    Dispatch {
        worker: String,
        role: Role,
        reason: String,
    },

    #[error("failed to query {worker}: {reason}")]
    Poll { worker: String, reason: String },

    #[error("{role} task on {worker} reported {status}: {error}")]
    TaskFailed {
        worker: String,
        role: Role,
        status: WorkerStatus,
        error: String,
    },

    #[error("mapper {worker} produced {got} partitions, expected {expected}")]
    Shuffle {
        worker: String,
        expected: usize,
        got: usize,
    },

    #[error("{phase} did not complete within {waited:?}")]
    Timeout { phase: JobPhase, waited: Duration },

    #[error("job cancelled")]
    Cancelled,

    #[error("`{0}` is not a known workload")]
    UnknownWorkload(String),

    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: JobPhase, to: JobPhase },

    #[error("no job with id {0}")]
    NoSuchJob(JobId),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<OrchestratorError> for Status {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::UnknownWorkload(_) => Status::invalid_argument(err.to_string()),
            OrchestratorError::NoSuchJob(_) => Status::not_found(err.to_string()),
            _ => Status::internal(err.to_string()),
        }
    }
}
