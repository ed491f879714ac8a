//! Storage abstractions for snapshot persistence.
//!
//! A store keeps exactly one document per course (the latest snapshot, fully
//! replaced on every write) plus a handful of small named settings.
//!
//! ## Local Layout
//!
//! ```text
//! {root}/
//! ├── settings.json          # Small persisted scalars
//! └── snapshots/
//!     ├── 19984.json         # Latest snapshot per course id
//!     └── 20008.json
//! ```

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;
#[cfg(not(feature = "s3"))]
use crate::error::AppError;
use crate::models::{CourseSnapshot, StorageBackend, StorageConfig};

// Re-export for convenience
pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Trait for snapshot storage backends.
///
/// `Ok(None)` means the key does not exist; any backend failure is an `Err`
/// and must never be read as "not found".
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the latest snapshot of a course.
    async fn get_snapshot(&self, course_id: &str) -> Result<Option<CourseSnapshot>>;

    /// Store a snapshot, replacing any previous one for the same course.
    async fn put_snapshot(&self, snapshot: &CourseSnapshot) -> Result<()>;

    /// Read a named setting.
    async fn get_setting(&self, name: &str) -> Result<Option<String>>;

    /// Write a named setting.
    async fn put_setting(&self, name: &str, value: &str) -> Result<()>;
}

/// Open the backend selected in the configuration.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn SnapshotStore>> {
    match config.backend {
        StorageBackend::Local => {
            log::info!("Using local snapshot store at {}", config.local_dir);
            Ok(Arc::new(LocalStore::new(&config.local_dir)))
        }
        #[cfg(feature = "s3")]
        StorageBackend::S3 => {
            let store = S3Store::from_config(config).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(AppError::config(
            "storage.backend = \"s3\" requires the `s3` feature",
        )),
    }
}

/// File-name-safe form of a course id.
///
/// Ids that had to be rewritten get a short digest suffix so two different ids
/// never share a key.
pub(crate) fn sanitize_key(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if !cleaned.is_empty() && cleaned == id {
        return cleaned;
    }
    let digest = hex::encode(Sha256::digest(id.as_bytes()));
    format!("{cleaned}-{}", &digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("19984"), "19984");
        assert_eq!(sanitize_key("civil-eng_2"), "civil-eng_2");

        let url_key = sanitize_key("https://x/view.php?id=1");
        assert!(url_key.starts_with("https___x_view_php_id_1-"));
        assert_ne!(sanitize_key("a.b"), sanitize_key("a_b"));
        assert_ne!(sanitize_key(""), "");
    }

    #[tokio::test]
    async fn test_open_local_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = StorageConfig {
            local_dir: tmp.path().display().to_string(),
            ..StorageConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert!(store.get_snapshot("missing").await.unwrap().is_none());
    }
}
