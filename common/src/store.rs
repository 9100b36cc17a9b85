//! The shared intermediate store.
//!
//! Each entry is written once by the mapper that owns it and read by the one
//! reducer owning that partition. Keys embed the job, the producing worker
//! and the partition index, so writers never need to coordinate.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Key→blob store used to shuffle partitions from mappers to reducers.
#[async_trait]
pub trait IntermediateStore: Send + Sync + 'static {
    /// Store `blob` under `key`. Must only return once the entry is visible
    /// to every other reader.
    async fn put(&self, key: &str, blob: Bytes) -> Result<(), StoreError>;

    /// Fetch the blob stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Remove every entry whose key starts with `prefix`, returning how many
    /// were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError>;
}

pub type SharedStore = Arc<dyn IntermediateStore>;

/// Prefix under which every intermediate entry of a job lives.
pub fn job_prefix(job_id: u64) -> String {
    format!("job-{job_id}/")
}

/// Store key of partition `partition` produced by `worker` for `job_id`.
pub fn partition_key(job_id: u64, worker: &str, partition: usize) -> String {
    format!("{}{}-{}", job_prefix(job_id), worker_slug(worker), partition)
}

/// Turn a worker address into something safe to embed in an object key.
fn worker_slug(worker: &str) -> String {
    let slug: String = worker
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("worker-{slug}")
}

/// In-process store. Shared between workers by cloning.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl IntermediateStore for MemoryStore {
    async fn put(&self, key: &str, blob: Bytes) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), blob);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}
