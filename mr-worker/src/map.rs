use std::path::Path;

use futures::future::try_join_all;
use tracing::{debug, info};

use common::codec::encode_partition;
use common::error::TaskError;
use common::store::{partition_key, IntermediateStore};
use common::Partitioner;

use crate::core::worker::MapTask;

/// Run a map task: read the shard, apply the named map function, split the
/// pairs into one bucket per reducer and write every bucket to the store.
///
/// Returns the store keys written, indexed by partition. Only returns once
/// every write has completed, so callers may publish the keys right away.
pub async fn perform_map(
    request: MapTask,
    worker: &str,
    store: &dyn IntermediateStore,
) -> Result<Vec<String>, TaskError> {
    let MapTask {
        job_id,
        input_location,
        mapper,
        num_reducers,
        partitioner,
    } = request;

    info!("Received map task with workload `{mapper}` and input path `{input_location}`");

    let map_fn = workload::try_named_mapper(&mapper)
        .ok_or_else(|| TaskError::UnknownWorkload(mapper.clone()))?;
    let partitioner = Partitioner::from_name(&partitioner)
        .ok_or_else(|| TaskError::UnsupportedPartitioner(partitioner.clone()))?;

    let content = tokio::fs::read_to_string(&input_location)
        .await
        .map_err(|source| TaskError::InputRead {
            path: input_location.clone(),
            source,
        })?;

    let document_id = document_id(&input_location);
    let records = {
        let id = document_id.clone();
        tokio::task::spawn_blocking(move || map_fn(&id, &content))
            .await
            .map_err(|e| TaskError::Aborted(e.to_string()))?
            .map_err(|source| TaskError::MapExecution {
                document: document_id.clone(),
                source,
            })?
    };
    debug!("Map over `{document_id}` emitted {} pairs", records.len());

    let buckets = partitioner.partition(records, num_reducers as usize)?;

    let writes = buckets.iter().enumerate().map(|(index, bucket)| async move {
        let key = partition_key(job_id, worker, index);
        let blob = encode_partition(bucket)?;
        store
            .put(&key, blob)
            .await
            .map_err(|source| TaskError::StoreWrite {
                key: key.clone(),
                source,
            })?;
        Ok::<_, TaskError>(key)
    });
    let keys = try_join_all(writes).await?;

    info!("Map over `{document_id}` wrote {} partitions", keys.len());
    Ok(keys)
}

/// The document id handed to map functions is the shard's file name.
fn document_id(input_location: &str) -> String {
    Path::new(input_location)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_location.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::codec::decode_partition;
    use common::store::MemoryStore;
    use common::KeyValue;

    fn task(input: &Path, mapper: &str, num_reducers: u32) -> MapTask {
        MapTask {
            job_id: 7,
            input_location: input.to_string_lossy().into_owned(),
            mapper: mapper.to_string(),
            num_reducers,
            partitioner: Partitioner::default().name().to_string(),
        }
    }

    #[tokio::test]
    async fn writes_one_entry_per_partition() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("part-0.txt");
        std::fs::write(&input, "a b a").unwrap();
        let store = MemoryStore::new();

        let keys = perform_map(task(&input, "wc", 2), "127.0.0.1:7001", &store)
            .await
            .unwrap();

        assert_eq!(
            keys,
            vec!["job-7/worker-127.0.0.1_7001-0", "job-7/worker-127.0.0.1_7001-1"]
        );

        // "a" hashes to bucket 0 and "b" to bucket 1 with two reducers.
        let first = decode_partition(&store.get(&keys[0]).await.unwrap()).unwrap();
        let second = decode_partition(&store.get(&keys[1]).await.unwrap()).unwrap();
        assert_eq!(first, vec![KeyValue::new("a", 1), KeyValue::new("a", 1)]);
        assert_eq!(second, vec![KeyValue::new("b", 1)]);
    }

    #[tokio::test]
    async fn empty_buckets_are_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.txt");
        std::fs::write(&input, "").unwrap();
        let store = MemoryStore::new();

        let keys = perform_map(task(&input, "wc", 3), "w", &store).await.unwrap();

        assert_eq!(keys.len(), 3);
        assert_eq!(store.keys().await.len(), 3);
    }

    #[tokio::test]
    async fn missing_input_is_an_input_error() {
        let store = MemoryStore::new();
        let err = perform_map(task(Path::new("/no/such/shard"), "wc", 1), "w", &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::InputRead { .. }));
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_mapper_and_hash_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        std::fs::write(&input, "x").unwrap();
        let store = MemoryStore::new();

        let err = perform_map(task(&input, "nope", 1), "w", &store).await.unwrap_err();
        assert!(matches!(err, TaskError::UnknownWorkload(name) if name == "nope"));

        let mut bad_hash = task(&input, "wc", 1);
        bad_hash.partitioner = "md5".to_string();
        let err = perform_map(bad_hash, "w", &store).await.unwrap_err();
        assert!(matches!(err, TaskError::UnsupportedPartitioner(_)));
    }

    #[tokio::test]
    async fn map_function_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("graph.txt");
        std::fs::write(&input, "1 x\n").unwrap();
        let store = MemoryStore::new();

        let err = perform_map(task(&input, "vertex_degree", 1), "w", &store)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::MapExecution { document, .. } if document == "graph.txt"));
    }

    #[tokio::test]
    async fn zero_reducers_fail() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        std::fs::write(&input, "x").unwrap();

        let err = perform_map(task(&input, "wc", 0), "w", &MemoryStore::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NoReducers));
    }
}
