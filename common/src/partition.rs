//! Deterministic partitioning and sort-based grouping of intermediate pairs.
//!
//! Every worker must put a given key into the same bucket, otherwise values
//! for one key end up at different reducers. The bucket hash is therefore a
//! fixed function with a version name that travels with every map task.

use std::hash::Hasher;

use serde_json::Value;

use crate::error::TaskError;
use crate::KeyValue;

/// Hashes an intermediate key with 64-bit FNV-1a and keeps the low 31 bits.
/// Compute a reduce bucket for a given key by calculating
/// `ihash(key) % n_reduce`.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key);
    (hasher.finish() & 0x7fff_ffff) as u32
}

/// The bucket function used by mappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Partitioner {
    /// [`ihash`] modulo the reducer count.
    #[default]
    Fnv1aV1,
}

impl Partitioner {
    pub const fn name(self) -> &'static str {
        match self {
            Partitioner::Fnv1aV1 => "fnv1a-v1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fnv1a-v1" => Some(Partitioner::Fnv1aV1),
            _ => None,
        }
    }

    /// Bucket index of `key` among `n_reduce` buckets. `n_reduce` must be
    /// non-zero.
    pub fn bucket(self, key: &str, n_reduce: usize) -> usize {
        match self {
            Partitioner::Fnv1aV1 => ihash(key.as_bytes()) as usize % n_reduce,
        }
    }

    /// Split `records` into exactly `n_reduce` buckets, keeping the relative
    /// order of records within each bucket.
    pub fn partition(
        self,
        records: Vec<KeyValue>,
        n_reduce: usize,
    ) -> Result<Vec<Vec<KeyValue>>, TaskError> {
        if n_reduce == 0 {
            return Err(TaskError::NoReducers);
        }

        let mut buckets = vec![Vec::new(); n_reduce];
        for record in records {
            let index = self.bucket(record.key(), n_reduce);
            buckets[index].push(record);
        }
        Ok(buckets)
    }
}

/// Partition with the default bucket function.
pub fn partition(records: Vec<KeyValue>, n_reduce: usize) -> Result<Vec<Vec<KeyValue>>, TaskError> {
    Partitioner::default().partition(records, n_reduce)
}

/// Sort pairs by key and merge runs of equal keys.
///
/// The sort is stable, so values of one key keep the order in which they
/// were concatenated.
pub fn group_by_key(mut pairs: Vec<KeyValue>) -> Vec<(String, Vec<Value>)> {
    pairs.sort_by(|a, b| a.key.cmp(&b.key));

    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
    for KeyValue { key, value } in pairs {
        match groups.last_mut() {
            Some((previous_key, values)) if *previous_key == key => values.push(value),
            _ => groups.push((key, vec![value])),
        }
    }
    groups
}
