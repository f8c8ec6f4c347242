//! Durable key-value backends
//!
//! The observer process can be evicted and restarted between events, so tab
//! state must land on a surface that outlives it. The JSON-file backend is
//! the production backing; the in-memory backend exists for tests and for
//! callers that explicitly opt out of durability.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StoreError;

/// Durable key-value surface
///
/// Values are JSON; a `set` must be visible to every `get` issued after it
/// returns, including from a restarted process for durable implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory backend; state dies with the process
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// JSON-file backend: one file holding a key -> value object
///
/// Every write rewrites the whole file through a temp-and-rename, so a crash
/// mid-write leaves the previous state intact. Callers serialize access (the
/// tab store holds its lock across the read-modify-write cycle).
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, Value>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                    key: self.path.display().to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StoreError::ReadFailed {
                key: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn persist(&self, entries: &HashMap<String, Value>) -> Result<(), StoreError> {
        let key = self.path.display().to_string();
        let write_failed = |reason: String| StoreError::WriteFailed {
            key: key.clone(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_failed(e.to_string()))?;
        }

        let bytes = serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Serialize {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        assert!(backend.get("tab_1").await.unwrap().is_none());

        backend.set("tab_1", json!({"n": 1})).await.unwrap();
        assert_eq!(backend.get("tab_1").await.unwrap(), Some(json!({"n": 1})));

        backend.remove("tab_1").await.unwrap();
        assert!(backend.get("tab_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backend_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let backend = JsonFileBackend::new(&path);
        backend.set("tab_7", json!(["a", "b"])).await.unwrap();
        drop(backend);

        // a fresh instance stands in for a restarted process
        let reopened = JsonFileBackend::new(&path);
        assert_eq!(
            reopened.get("tab_7").await.unwrap(),
            Some(json!(["a", "b"]))
        );
    }

    #[tokio::test]
    async fn test_file_backend_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("never-written.json"));
        assert!(backend.get("tab_1").await.unwrap().is_none());
        // removing an absent key is a no-op, not an error
        backend.remove("tab_1").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_backend_corrupt_file_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();

        let backend = JsonFileBackend::new(&path);
        assert!(matches!(
            backend.get("tab_1").await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
