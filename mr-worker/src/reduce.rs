use std::collections::BTreeMap;
use std::path::Path;

use futures::future::try_join_all;
use tracing::info;

use common::codec::{decode_partition, encode_output};
use common::error::TaskError;
use common::store::IntermediateStore;
use common::{group_by_key, KeyValue};

use crate::core::worker::ReduceTask;

/// Run a reduce task: fetch one partition per mapper from the store, group
/// the pairs by key, apply the named reduce function to every group and
/// write the key→aggregate object to the output location.
///
/// Returns the output location.
pub async fn perform_reduce(
    request: ReduceTask,
    store: &dyn IntermediateStore,
) -> Result<String, TaskError> {
    let ReduceTask {
        job_id,
        partition,
        store_keys,
        reducer,
        output_location,
    } = request;

    info!("Received reduce task {partition} of job {job_id} with workload `{reducer}`");

    let reduce_fn = workload::try_named_reducer(&reducer)
        .ok_or_else(|| TaskError::UnknownWorkload(reducer.clone()))?;

    let pairs = fetch_partitions(&store_keys, store).await?;
    info!("Reducer {partition} loaded {} pairs from {} mappers", pairs.len(), store_keys.len());

    let output = tokio::task::spawn_blocking(move || {
        let mut output = BTreeMap::new();
        for (key, values) in group_by_key(pairs) {
            let aggregate = reduce_fn(&key, &values).map_err(|source| {
                TaskError::ReduceExecution {
                    key: key.clone(),
                    source,
                }
            })?;
            output.insert(key, aggregate);
        }
        Ok::<_, TaskError>(output)
    })
    .await
    .map_err(|e| TaskError::Aborted(e.to_string()))??;

    write_output(&output_location, &encode_output(&output)?).await?;

    info!("Reducer {partition} wrote {} keys to `{output_location}`", output.len());
    Ok(output_location)
}

/// Fetch and decode every listed entry, concatenated in the order given.
async fn fetch_partitions(
    store_keys: &[String],
    store: &dyn IntermediateStore,
) -> Result<Vec<KeyValue>, TaskError> {
    let fetches = store_keys.iter().map(|key| async move {
        let blob = store.get(key).await.map_err(|source| TaskError::StoreRead {
            key: key.clone(),
            source,
        })?;
        decode_partition(&blob).map_err(|source| TaskError::Decode {
            key: key.clone(),
            source,
        })
    });

    Ok(try_join_all(fetches).await?.into_iter().flatten().collect())
}

async fn write_output(location: &str, data: &[u8]) -> Result<(), TaskError> {
    let output_error = |source| TaskError::OutputWrite {
        path: location.to_string(),
        source,
    };

    if let Some(parent) = Path::new(location).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(output_error)?;
        }
    }
    tokio::fs::write(location, data).await.map_err(output_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::codec::{decode_output, encode_partition};
    use common::store::MemoryStore;
    use serde_json::json;

    async fn seed(store: &MemoryStore, key: &str, records: &[KeyValue]) {
        store.put(key, encode_partition(records).unwrap()).await.unwrap();
    }

    fn task(keys: &[&str], reducer: &str, output: &Path) -> ReduceTask {
        ReduceTask {
            job_id: 1,
            partition: 0,
            store_keys: keys.iter().map(|k| k.to_string()).collect(),
            reducer: reducer.to_string(),
            output_location: output.to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn merges_every_mapper_and_reduces_per_key() {
        let store = MemoryStore::new();
        seed(&store, "m0", &[KeyValue::new("a", 1), KeyValue::new("c", 1), KeyValue::new("a", 1)]).await;
        seed(&store, "m1", &[KeyValue::new("c", 1)]).await;
        seed(&store, "m2", &[]).await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("output-0.json");

        let written = perform_reduce(task(&["m0", "m1", "m2"], "sum", &output), &store)
            .await
            .unwrap();
        assert_eq!(written, output.to_string_lossy());

        let result = decode_output(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result["a"], json!(2));
        assert_eq!(result["c"], json!(2));
    }

    #[tokio::test]
    async fn document_lists_come_back_sorted() {
        let store = MemoryStore::new();
        seed(&store, "m0", &[KeyValue::new("w", "d0")]).await;
        seed(&store, "m1", &[KeyValue::new("w", "d1")]).await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output-0.json");
        perform_reduce(task(&["m1", "m0"], "inverted_index", &output), &store)
            .await
            .unwrap();

        let result = decode_output(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(result["w"], json!(["d0", "d1"]));
    }

    #[tokio::test]
    async fn missing_entry_is_a_store_read_error() {
        let store = MemoryStore::new();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output-0.json");

        let err = perform_reduce(task(&["gone"], "sum", &output), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::StoreRead { key, .. } if key == "gone"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_decode_error() {
        let store = MemoryStore::new();
        store.put("bad", bytes::Bytes::from_static(b"nope")).await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = perform_reduce(task(&["bad"], "sum", &dir.path().join("o.json")), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Decode { .. }));
    }

    #[tokio::test]
    async fn reducer_errors_surface_with_the_key() {
        let store = MemoryStore::new();
        seed(&store, "m0", &[KeyValue::new("k", "not a number")]).await;
        let dir = tempfile::tempdir().unwrap();

        let err = perform_reduce(task(&["m0"], "sum", &dir.path().join("o.json")), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::ReduceExecution { key, .. } if key == "k"));
    }
}
