//! Filesystem-backed object store.
//!
//! Objects live at `<root>/<bucket>/<name>`. Each write goes to a
//! temporary sibling first and is renamed into place, so a reader never
//! sees a half-written object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use super::ObjectStore;
use crate::domain::{StorageArtifact, StoredArtifact};
use crate::error::StorageWriteError;

/// Object store rooted in a local directory
pub struct FsObjectStore {
    /// Directory holding the bucket
    bucket_dir: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Self {
        Self {
            bucket_dir: root.as_ref().join(bucket),
        }
    }

    /// Get the bucket directory
    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    /// Path an object with this name is stored at
    pub fn object_path(&self, name: &str) -> PathBuf {
        self.bucket_dir.join(name)
    }

    /// Load an object back, if present
    pub async fn read(&self, name: &str) -> std::io::Result<Option<Vec<u8>>> {
        let path = self.object_path(name);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        fs::read(&path).await.map(Some)
    }

    async fn write_atomic(&self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.bucket_dir).await?;

        let final_path = self.object_path(name);
        let tmp_path = self
            .bucket_dir
            .join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        Ok(final_path)
    }
}

/// Hex SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn write(&self, artifact: StorageArtifact) -> Result<StoredArtifact, StorageWriteError> {
        if artifact.name.is_empty() || artifact.name.contains(['/', '\\']) {
            return Err(StorageWriteError {
                name: artifact.name,
                reason: "object name must be a single non-empty path segment".to_string(),
            });
        }

        let checksum = sha256_hex(&artifact.bytes);

        match self.write_atomic(&artifact.name, &artifact.bytes).await {
            Ok(path) => {
                let absolute = fs::canonicalize(&path).await.unwrap_or(path);
                let location = format!("file://{}", absolute.display());
                info!(name = %artifact.name, %location, "Object uploaded");

                Ok(StoredArtifact {
                    kind: artifact.kind,
                    size_bytes: artifact.size_bytes(),
                    name: artifact.name,
                    location,
                    sha256: Some(checksum),
                })
            }
            Err(e) => {
                error!(name = %artifact.name, error = %e, "Failed to write object");
                Err(StorageWriteError {
                    name: artifact.name,
                    reason: e.to_string(),
                })
            }
        }
    }
}
