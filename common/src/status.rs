//! Worker status tokens.
//!
//! Tokens cross process boundaries as plain strings and are compared
//! byte-for-byte, so the spelling here is part of the wire contract.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Status reported by a worker, either per role or role-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Running,
    MapRunning,
    MapCompleted,
    MapError,
    ReduceRunning,
    ReduceCompleted,
    ReduceError,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown worker status token `{0}`")]
pub struct UnknownStatus(pub String);

impl WorkerStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Idle => "WORKER_IDLE",
            WorkerStatus::Running => "WORKER_RUNNING",
            WorkerStatus::MapRunning => "MAP_RUNNING",
            WorkerStatus::MapCompleted => "MAP_COMPLETED",
            WorkerStatus::MapError => "MAP_ERROR",
            WorkerStatus::ReduceRunning => "REDUCE_RUNNING",
            WorkerStatus::ReduceCompleted => "REDUCE_COMPLETED",
            WorkerStatus::ReduceError => "REDUCE_ERROR",
        }
    }

    /// Whether this is a role-specific running token.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            WorkerStatus::Running | WorkerStatus::MapRunning | WorkerStatus::ReduceRunning
        )
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "WORKER_IDLE" => WorkerStatus::Idle,
            "WORKER_RUNNING" => WorkerStatus::Running,
            "MAP_RUNNING" => WorkerStatus::MapRunning,
            "MAP_COMPLETED" => WorkerStatus::MapCompleted,
            "MAP_ERROR" => WorkerStatus::MapError,
            "REDUCE_RUNNING" => WorkerStatus::ReduceRunning,
            "REDUCE_COMPLETED" => WorkerStatus::ReduceCompleted,
            "REDUCE_ERROR" => WorkerStatus::ReduceError,
            other => return Err(UnknownStatus(other.to_string())),
        };
        Ok(status)
    }
}

/// The two roles a worker can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Map,
    Reduce,
}

impl Role {
    pub fn running(self) -> WorkerStatus {
        match self {
            Role::Map => WorkerStatus::MapRunning,
            Role::Reduce => WorkerStatus::ReduceRunning,
        }
    }

    pub fn completed(self) -> WorkerStatus {
        match self {
            Role::Map => WorkerStatus::MapCompleted,
            Role::Reduce => WorkerStatus::ReduceCompleted,
        }
    }

    pub fn failed(self) -> WorkerStatus {
        match self {
            Role::Map => WorkerStatus::MapError,
            Role::Reduce => WorkerStatus::ReduceError,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Map => f.write_str("map"),
            Role::Reduce => f.write_str("reduce"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [WorkerStatus; 8] = [
        WorkerStatus::Idle,
        WorkerStatus::Running,
        WorkerStatus::MapRunning,
        WorkerStatus::MapCompleted,
        WorkerStatus::MapError,
        WorkerStatus::ReduceRunning,
        WorkerStatus::ReduceCompleted,
        WorkerStatus::ReduceError,
    ];

    #[test]
    fn tokens_parse_back() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<WorkerStatus>(), Ok(status));
        }
    }

    #[test]
    fn tokens_are_case_sensitive() {
        assert!("map_completed".parse::<WorkerStatus>().is_err());
        assert!("".parse::<WorkerStatus>().is_err());
    }

    #[test]
    fn role_tokens() {
        assert_eq!(Role::Map.completed().as_str(), "MAP_COMPLETED");
        assert_eq!(Role::Reduce.failed().as_str(), "REDUCE_ERROR");
        assert!(Role::Reduce.running().is_running());
        assert!(!Role::Map.completed().is_running());
    }
}
