use thiserror::Error;

/// Errors raised by an intermediate store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no entry stored under `{0}`")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Everything that can go wrong while a worker executes a task.
///
/// Any of these ends the task in its role's ERROR status.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to read input `{path}`: {source}")]
    InputRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("map function failed on `{document}`: {source}")]
    MapExecution {
        document: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot partition into zero buckets")]
    NoReducers,

    #[error("failed to write `{key}` to the store: {source}")]
    StoreWrite {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to read `{key}` from the store: {source}")]
    StoreRead {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("malformed partition `{key}`: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("reduce function failed on key `{key}`: {source}")]
    ReduceExecution {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write output `{path}`: {source}")]
    OutputWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("`{0}` is not a known workload")]
    UnknownWorkload(String),

    #[error("partition hash `{0}` is not supported by this worker")]
    UnsupportedPartitioner(String),

    #[error("task aborted: {0}")]
    Aborted(String),
}
