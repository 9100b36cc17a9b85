//! Worker side of the cluster: accepts map and reduce tasks over gRPC,
//! runs them in the background and reports status tokens.

pub mod core;
pub mod map;
pub mod reduce;

pub use crate::core::{MRWorker, WorkerServer};
