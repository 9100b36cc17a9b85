//! Users pick a named map and reduce function, and the coordinator
//! distributes the work to a fixed set of workers. Mapper output is
//! partitioned and shuffled to reducers through a shared store, which is an
//! S3-compatible system in a real cluster.

use std::fmt;
use std::fmt::Formatter;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod codec;
pub mod error;
pub mod job;
pub mod minio;
pub mod partition;
pub mod status;
pub mod store;

pub use partition::{group_by_key, ihash, partition, Partitioner};

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
pub type MapOutput = anyhow::Result<Vec<KeyValue>>;

/// A map function takes a document id (the input file name) and the
/// document content. It returns the intermediate key-value pairs.
pub type MapFn = fn(document_id: &str, content: &str) -> MapOutput;

/// A reduce function takes in a key and every value emitted for that key,
/// in shuffle order. It returns a single aggregate.
pub type ReduceFn = fn(key: &str, values: &[Value]) -> anyhow::Result<Value>;

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single intermediate key-value pair.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct KeyValue {
    /// The key. Partitioning and grouping only look at this.
    pub key: String,

    /// The value.
    pub value: Value,
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.value)
    }
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }
}
