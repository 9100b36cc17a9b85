pub mod config;
pub mod core;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod tasks;

pub use crate::config::{CoordinatorConfig, ErrorPolicy, PollPolicy};
pub use crate::core::{CoordinatorServer, MRCoordinator};
pub use crate::orchestrator::{JobHandle, Orchestrator};
