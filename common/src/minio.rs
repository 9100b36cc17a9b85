/// Helper functions and structures for dealing with minio.
use anyhow::Error;
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::store::IntermediateStore;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// id
    pub access_key_id: String,

    /// password
    pub secret_access_key: String,

    /// object store region
    pub region: String,

    /// minio url
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Client {
    pub client: s3::Client,
}

impl Client {
    pub fn from_conf(cfg: ClientConfig) -> Self {
        let cred = s3::config::Credentials::new(
            cfg.access_key_id,
            cfg.secret_access_key,
            None,
            None,
            "mr-cluster",
        );
        let region = s3::config::Region::new(cfg.region);
        let conf = s3::config::Builder::new()
            .credentials_provider(cred)
            .region(region)
            .endpoint_url(cfg.url)
            .force_path_style(true)
            .behavior_version_latest()
            .build();

        Self {
            client: s3::Client::from_conf(conf),
        }
    }

    /// Create `bucket` unless it already exists.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<(), Error> {
        if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
            debug!("Bucket {bucket} already exists");
            return Ok(());
        }
        self.client.create_bucket().bucket(bucket).send().await?;
        info!("Created bucket {bucket}");
        Ok(())
    }

    /// Fetch an object, `None` if there is no such key.
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>, Error> {
        let response = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(response) => response,
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    return Ok(None);
                }
                return Err(err.into());
            }
        };
        let data = response.body.collect().await?.into_bytes();
        Ok(Some(data))
    }

    pub async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), Error> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    /// Lists all objects found under the prefix `key`.
    pub async fn list_objects_in_dir(&self, bucket: &str, key: &str) -> Result<Vec<String>, Error> {
        let mut response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(key)
            .max_keys(50)
            .into_paginator()
            .send();

        let mut objects = vec![];
        while let Some(result) = response.next().await {
            match result {
                Ok(output) => {
                    for object in output.contents() {
                        if let Some(key) = object.key() {
                            objects.push(key.to_string());
                        }
                    }
                }
                Err(err) => {
                    error!("{err:?}");
                    return Err(err.into());
                }
            }
        }

        Ok(objects)
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    /// Delete every object under `path`, returning how many went away.
    pub async fn delete_path(&self, bucket: &str, path: &str) -> Result<usize, Error> {
        let objects = self.list_objects_in_dir(bucket, path).await?;
        for object in &objects {
            self.delete_object(bucket, object).await?;
        }

        Ok(objects.len())
    }
}

/// Intermediate store kept in one minio bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl IntermediateStore for S3Store {
    async fn put(&self, key: &str, blob: Bytes) -> Result<(), StoreError> {
        // PutObject is read-after-write consistent, so the entry is visible
        // once this returns.
        self.client.put_object(&self.bucket, key, blob).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.client
            .get_object(&self.bucket, key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        Ok(self.client.delete_path(&self.bucket, prefix).await?)
    }
}
