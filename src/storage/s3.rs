//! AWS S3 storage implementation.
//!
//! Key layout under the configured prefix:
//! - `{prefix}/snapshots/{courseId}.json` - latest snapshot per course
//! - `{prefix}/settings/{name}` - small text settings

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::models::{CourseSnapshot, StorageConfig};
use crate::storage::{SnapshotStore, sanitize_key};

/// S3-based snapshot storage.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create S3 storage from the storage section, using the default AWS
    /// credential chain.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let bucket = config
            .s3_bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| AppError::config("storage.s3_bucket is not set"))?;

        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&sdk_config);

        log::info!("Using S3 snapshot store s3://{}/{}", bucket, config.s3_prefix);
        Ok(Self::new(client, bucket, config.s3_prefix.clone()))
    }

    /// Full object key for a path below the prefix.
    fn key(&self, rest: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            rest.to_string()
        } else {
            format!("{prefix}/{rest}")
        }
    }

    /// Read an object, returning None if the key does not exist.
    pub async fn read_bytes_optional(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output.body.collect().await.map_err(AppError::store)?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                // Check if it's a "not found" error
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::debug!("No object at s3://{}/{}", self.bucket, key);
                    Ok(None)
                } else {
                    Err(AppError::store(format!(
                        "get s3://{}/{}: {}",
                        self.bucket, key, service_err
                    )))
                }
            }
        }
    }

    /// Write an object.
    async fn write_bytes(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::store(format!("put s3://{}/{}: {}", self.bucket, key, e)))?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for S3Store {
    async fn get_snapshot(&self, course_id: &str) -> Result<Option<CourseSnapshot>> {
        let key = self.key(&format!("snapshots/{}.json", sanitize_key(course_id)));
        match self.read_bytes_optional(&key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_snapshot(&self, snapshot: &CourseSnapshot) -> Result<()> {
        let key = self.key(&format!("snapshots/{}.json", sanitize_key(&snapshot.course_id)));
        let json = serde_json::to_vec_pretty(snapshot)?;
        self.write_bytes(&key, json, "application/json").await?;
        log::info!(
            "Wrote snapshot of {} ({} items) to s3://{}/{}",
            snapshot.course_id,
            snapshot.items.len(),
            self.bucket,
            key
        );
        Ok(())
    }

    async fn get_setting(&self, name: &str) -> Result<Option<String>> {
        let key = self.key(&format!("settings/{}", sanitize_key(name)));
        match self.read_bytes_optional(&key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(|s| Some(s.trim().to_string()))
                .map_err(|e| AppError::store(format!("setting {name} is not UTF-8: {e}"))),
            None => Ok(None),
        }
    }

    async fn put_setting(&self, name: &str, value: &str) -> Result<()> {
        let key = self.key(&format!("settings/{}", sanitize_key(name)));
        self.write_bytes(&key, value.as_bytes().to_vec(), "text/plain; charset=utf-8")
            .await
    }
}
