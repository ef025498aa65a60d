//! Storage backend trait definitions

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Request body error: {0}")]
    Body(String),

    #[error("Storage error: {0}")]
    Other(String),
}

/// Byte chunks of an object's content, delivered strictly in content order.
pub type ChunkStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// Attributes of a stored object, as reported by a metadata-only query.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ObjectHead {
    /// Content length in bytes, when the backend reports it
    pub content_length: Option<u64>,

    /// Content type recorded at upload time
    pub content_type: Option<String>,

    /// Metadata entries attached to the object
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Abstract object-storage backend behind the gateway.
///
/// Implementations must be safe for concurrent use by simultaneous requests:
/// no per-request mutable state. The trait is object-safe and used as
/// `Box<dyn StorageBackend>`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Metadata-only existence query for a key
    async fn head(&self, key: &str) -> Result<ObjectHead, StorageError>;

    /// Open an object for sequential streaming download.
    ///
    /// The returned stream yields chunks in strict content order; a backend
    /// failure mid-transfer surfaces as an `Err` item terminating the
    /// stream, never as silent truncation.
    async fn get(&self, key: &str) -> Result<(ObjectHead, ChunkStream), StorageError>;

    /// Store an object from a chunk stream.
    ///
    /// The body is consumed incrementally; implementations must not buffer
    /// it in full. Returns once the backend has accepted the whole stream.
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
        body: ChunkStream,
    ) -> Result<(), StorageError>;
}
