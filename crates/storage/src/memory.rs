//! In-memory object store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::config::StorageConfig;
use crate::{ObjectStore, StorageError, location};

/// In-memory blob store keyed by `(bucket, key)`.
#[derive(Debug)]
pub struct InMemoryObjectStore {
    config: StorageConfig,
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc(config: StorageConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Number of stored objects (test helper).
    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .read()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn upload(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| StorageError::Transport("object map lock poisoned".to_string()))?;
        objects.insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        debug!(bucket, key, size = bytes.len(), "object stored");
        Ok(location(bucket, key))
    }

    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| StorageError::Transport("object map lock poisoned".to_string()))?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn presign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| StorageError::Transport("object map lock poisoned".to_string()))?;
        if !objects.contains_key(&(bucket.to_string(), key.to_string())) {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        drop(objects);

        let expires = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StorageError::Config(format!("system clock before epoch: {e}")))?
            .as_secs()
            + ttl.as_secs();

        Ok(format!(
            "{}/{bucket}/{key}?X-Expires={expires}",
            self.config.presign_endpoint()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryObjectStore {
        InMemoryObjectStore::new(StorageConfig::default())
    }

    #[test]
    fn upload_then_download_round_trip() {
        let store = store();
        let loc = store
            .upload("benchrun-datasets", "projects/p/expr.csv", b"gene,a,b\n")
            .unwrap();
        assert_eq!(loc, "s3://benchrun-datasets/projects/p/expr.csv");

        let bytes = store
            .download("benchrun-datasets", "projects/p/expr.csv")
            .unwrap();
        assert_eq!(bytes, b"gene,a,b\n");
    }

    #[test]
    fn download_of_missing_object_is_not_found() {
        let err = store().download("benchrun-datasets", "nope").unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn presign_uses_public_endpoint_when_configured() {
        let config = StorageConfig {
            public_endpoint: Some("https://files.example.org".to_string()),
            ..StorageConfig::default()
        };
        let store = InMemoryObjectStore::new(config);
        store.upload("b", "k", b"data").unwrap();

        let url = store.presign("b", "k", Duration::from_secs(60)).unwrap();
        assert!(url.starts_with("https://files.example.org/b/k?"));
        assert!(url.contains("X-Expires="));
    }

    #[test]
    fn presign_of_missing_object_is_not_found() {
        let err = store()
            .presign("b", "missing", Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
