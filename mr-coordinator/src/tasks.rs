//! Task descriptors and how each phase's tasks are built.

use std::path::Path;

use common::status::Role;
use common::Partitioner;

use crate::core::worker::{task_request::Task, MapTask, ReduceTask};
use crate::error::OrchestratorError;
use crate::jobs::JobId;

/// Store keys written by the map phase, indexed `[mapper][partition]`.
pub type ShuffleMatrix = Vec<Vec<String>>;

/// One unit of dispatchable work, bound to one worker address.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    /// Address of the worker the task is bound to.
    pub worker: String,

    /// Role-specific payload sent with the dispatch.
    pub payload: Task,
}

impl TaskDescriptor {
    pub fn role(&self) -> Role {
        match self.payload {
            Task::Map(_) => Role::Map,
            Task::Reduce(_) => Role::Reduce,
        }
    }

    /// gRPC endpoint serving dispatch, status and produced-keys calls. The
    /// status call used is the one matching [`TaskDescriptor::role`].
    pub fn endpoint(&self) -> String {
        if self.worker.contains("://") {
            self.worker.clone()
        } else {
            format!("http://{}", self.worker)
        }
    }

    /// Where a reduce task writes its output.
    pub fn output_location(&self) -> Option<&str> {
        match &self.payload {
            Task::Reduce(task) => Some(&task.output_location),
            Task::Map(_) => None,
        }
    }
}

/// Expand the input glob into a sorted list of shard paths.
pub fn resolve_inputs(pattern: &str) -> Result<Vec<String>, OrchestratorError> {
    let input_error = |reason: String| OrchestratorError::Input {
        pattern: pattern.to_string(),
        reason,
    };

    let mut inputs = Vec::new();
    for entry in glob::glob(pattern).map_err(|e| input_error(e.to_string()))? {
        let path = entry.map_err(|e| input_error(e.to_string()))?;
        if path.is_file() {
            inputs.push(path.to_string_lossy().into_owned());
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// Bind each input shard, by position, to one map worker.
pub fn create_map_tasks(
    job_id: JobId,
    inputs: &[String],
    map_workers: &[String],
    mapper: &str,
    num_reducers: usize,
    partitioner: Partitioner,
) -> Result<Vec<TaskDescriptor>, OrchestratorError> {
    if inputs.len() > map_workers.len() {
        return Err(OrchestratorError::Capacity {
            shards: inputs.len(),
            workers: map_workers.len(),
        });
    }

    Ok(inputs
        .iter()
        .zip(map_workers)
        .map(|(input, worker)| TaskDescriptor {
            worker: worker.clone(),
            payload: Task::Map(MapTask {
                job_id,
                input_location: input.clone(),
                mapper: mapper.to_string(),
                num_reducers: num_reducers as u32,
                partitioner: partitioner.name().to_string(),
            }),
        })
        .collect())
}

/// Build one reduce task per partition. Reducer `j` receives column `j` of
/// the shuffle matrix, one store key per mapper, and writes
/// `<output_dir>/job-<id>/output-<j>.json`.
pub fn create_reduce_tasks(
    job_id: JobId,
    matrix: &ShuffleMatrix,
    reduce_workers: &[String],
    reducer: &str,
    output_dir: &Path,
) -> Vec<TaskDescriptor> {
    reduce_workers
        .iter()
        .enumerate()
        .map(|(j, worker)| TaskDescriptor {
            worker: worker.clone(),
            payload: Task::Reduce(ReduceTask {
                job_id,
                partition: j as u32,
                store_keys: matrix.iter().map(|row| row[j].clone()).collect(),
                reducer: reducer.to_string(),
                output_location: output_dir
                    .join(format!("job-{job_id}"))
                    .join(format!("output-{j}.json"))
                    .to_string_lossy()
                    .into_owned(),
            }),
        })
        .collect()
}
