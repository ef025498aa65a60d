//! Filesystem-based storage backend
//!
//! Used for local development and Docker-free integration tests. Objects are
//! stored as plain files under a root directory, with content type and
//! metadata in a hidden JSON sidecar next to each data file:
//!
//! ```text
//! {root}/{key}                      # object content
//! {root}/{parent}/.{name}.meta.json # ObjectHead sidecar
//! ```
//!
//! Writes go to a temp file in the destination directory and are renamed
//! into place, so readers never observe a partially written object.

use super::traits::{ChunkStream, ObjectHead, StorageBackend, StorageError};
use async_trait::async_trait;
use futures::StreamExt;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

/// Async-safe path existence check (avoids blocking the Tokio runtime)
async fn path_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Filesystem storage backend
pub struct FilesystemBackend {
    /// Root directory for all data
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given root directory.
    pub async fn new(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve an object key to a path under the root.
    ///
    /// Unlike S3, where `.` and `..` are inert key characters, here they
    /// would address real directories — so keys containing them (or empty
    /// path segments) are rejected rather than resolved.
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.ends_with('/') {
            return Err(StorageError::Other(format!("Invalid object key: {:?}", key)));
        }
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StorageError::Other(format!("Invalid object key: {:?}", key)));
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Sidecar path holding the ObjectHead for a data file.
    fn meta_path(data_path: &Path) -> PathBuf {
        let name = data_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        data_path.with_file_name(format!(".{}.meta.json", name))
    }

    /// Load the sidecar for a data file, synthesizing a minimal ObjectHead
    /// from the file length when the sidecar is missing.
    async fn load_head(&self, data_path: &Path) -> Result<ObjectHead, StorageError> {
        match fs::read(Self::meta_path(data_path)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let len = fs::metadata(data_path).await?.len();
                Ok(ObjectHead {
                    content_length: Some(len),
                    ..ObjectHead::default()
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    #[instrument(skip(self))]
    async fn head(&self, key: &str) -> Result<ObjectHead, StorageError> {
        let data_path = self.object_path(key)?;
        if !path_exists(&data_path).await {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.load_head(&data_path).await
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<(ObjectHead, ChunkStream), StorageError> {
        let data_path = self.object_path(key)?;
        let file = fs::File::open(&data_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        let head = self.load_head(&data_path).await?;

        debug!("FS GET stream {:?}", data_path);

        let stream = ReaderStream::new(file).map_err(StorageError::Io);
        Ok((head, stream.boxed()))
    }

    #[instrument(skip(self, metadata, body))]
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
        mut body: ChunkStream,
    ) -> Result<(), StorageError> {
        let data_path = self.object_path(key)?;
        let parent = data_path
            .parent()
            .ok_or_else(|| StorageError::Other(format!("Invalid object key: {:?}", key)))?
            .to_path_buf();
        fs::create_dir_all(&parent).await?;

        // Unique temp file in the destination directory; cleaned up on drop
        // if the write fails partway.
        let tmp = tokio::task::spawn_blocking(move || NamedTempFile::new_in(&parent))
            .await
            .map_err(|e| StorageError::Other(format!("spawn_blocking join failed: {}", e)))??;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(tmp.path())
            .await?;

        let mut total: u64 = 0;
        while let Some(chunk) = body.try_next().await? {
            total += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.sync_all().await?;
        drop(file);

        let head = ObjectHead {
            content_length: Some(total),
            content_type: Some(content_type.to_string()),
            metadata,
        };
        let sidecar = serde_json::to_vec_pretty(&head)?;

        // Rename data into place, then write the sidecar. A missing sidecar
        // degrades to a synthesized head, never to a missing object.
        let persist_path = data_path.clone();
        tokio::task::spawn_blocking(move || tmp.persist(&persist_path))
            .await
            .map_err(|e| StorageError::Other(format!("spawn_blocking join failed: {}", e)))?
            .map_err(|e| StorageError::Io(e.error))?;
        fs::write(Self::meta_path(&data_path), sidecar).await?;

        debug!("FS PUT {:?} ({} bytes)", data_path, total);
        Ok(())
    }
}
