//! Object storage client: byte streams in, byte streams out, plus
//! time-limited access URLs.

pub mod config;
pub mod keys;
pub mod memory;

pub use config::StorageConfig;
pub use memory::InMemoryObjectStore;

use std::sync::Arc;
use std::time::Duration;

/// Object storage error.
///
/// `NotFound` is distinct from `Transport` so callers can decide
/// retry-ability: a missing object will stay missing, a transport blip
/// might not.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("storage transport error: {0}")]
    Transport(String),
    #[error("storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Transport errors are worth retrying; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transport(_))
    }
}

/// Content-addressed-by-key blob store.
///
/// Uploads are write-once by convention: callers pick unique keys per
/// job/run. No cleanup of partial writes is guaranteed here.
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under `bucket/key`; returns the canonical location
    /// string (`s3://bucket/key`).
    fn upload(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Read the object at `bucket/key`.
    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Generate a time-limited read URL for `bucket/key`, derived from the
    /// publicly reachable endpoint (which may differ from the internal one
    /// the service itself uses).
    fn presign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError>;
}

impl<S> ObjectStore for Arc<S>
where
    S: ObjectStore + ?Sized,
{
    fn upload(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        (**self).upload(bucket, key, bytes)
    }

    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        (**self).download(bucket, key)
    }

    fn presign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError> {
        (**self).presign(bucket, key, ttl)
    }
}

/// Canonical `s3://bucket/key` location string.
pub fn location(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}
