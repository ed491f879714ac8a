//! Local filesystem storage implementation.
//!
//! One JSON document per course plus a shared `settings.json`. Writes go to a
//! temporary file first and are renamed into place.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::CourseSnapshot;
use crate::storage::{SnapshotStore, sanitize_key};

const SETTINGS_FILE: &str = "settings.json";

/// Local filesystem storage backend.
pub struct LocalStore {
    root_dir: PathBuf,
    /// Serializes read-modify-write cycles on `settings.json`
    settings_lock: Mutex<()>,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            settings_lock: Mutex::new(()),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn snapshot_key(course_id: &str) -> String {
        format!("snapshots/{}.json", sanitize_key(course_id))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data. A present but unreadable document is an error.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn read_settings(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.read_json(SETTINGS_FILE).await?.unwrap_or_default())
    }
}

#[async_trait]
impl SnapshotStore for LocalStore {
    async fn get_snapshot(&self, course_id: &str) -> Result<Option<CourseSnapshot>> {
        self.read_json(&Self::snapshot_key(course_id)).await
    }

    async fn put_snapshot(&self, snapshot: &CourseSnapshot) -> Result<()> {
        let key = Self::snapshot_key(&snapshot.course_id);
        self.write_json(&key, snapshot).await?;
        log::debug!(
            "Stored snapshot for {} ({} items) at {}",
            snapshot.course_id,
            snapshot.items.len(),
            key
        );
        Ok(())
    }

    async fn get_setting(&self, name: &str) -> Result<Option<String>> {
        let _guard = self.settings_lock.lock().await;
        Ok(self.read_settings().await?.remove(name))
    }

    async fn put_setting(&self, name: &str, value: &str) -> Result<()> {
        let _guard = self.settings_lock.lock().await;
        let mut settings = self.read_settings().await?;
        settings.insert(name.to_string(), value.to_string());
        self.write_json(SETTINGS_FILE, &settings).await
    }
}
