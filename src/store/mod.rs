//! Tab state store
//!
//! Durable, lock-protected mapping from tab id to accumulated findings,
//! fetch errors, and the instrumentation-active flag. All mutation funnels
//! through [`TabStore::update`], serialized by one async mutex shared across
//! every tab: update bodies are short, so a single lock domain is enough and
//! two concurrent read-modify-write cycles can never interleave and lose a
//! side's findings.

#![allow(dead_code)]

mod backend;

pub use backend::{JsonFileBackend, MemoryBackend, StorageBackend};

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::error::StoreError;
use crate::scanner::TabRecord;

/// Capacity of the change-notification channel
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A committed change to one tab's record
#[derive(Debug, Clone)]
pub struct TabUpdate {
    pub tab_id: u32,
    pub record: TabRecord,
}

/// The per-tab state store
pub struct TabStore {
    backend: Arc<dyn StorageBackend>,
    /// Single mutual-exclusion domain for every update and delete
    write_lock: Mutex<()>,
    changes: broadcast::Sender<TabUpdate>,
}

fn tab_key(tab_id: u32) -> String {
    format!("tab_{tab_id}")
}

impl TabStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            backend,
            write_lock: Mutex::new(()),
            changes,
        }
    }

    /// Subscribe to committed record changes
    pub fn subscribe(&self) -> broadcast::Receiver<TabUpdate> {
        self.changes.subscribe()
    }

    /// Read a tab's record straight from the durable backing
    pub async fn read(&self, tab_id: u32) -> Result<Option<TabRecord>, StoreError> {
        let key = tab_key(tab_id);
        match self.backend.get(&key).await? {
            Some(value) => {
                let record = serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
                    key,
                    reason: e.to_string(),
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Load-or-create, mutate, persist, and return the committed record
    ///
    /// The whole cycle runs under the store's lock. The returned copy is the
    /// state as written; subscribers see the same copy.
    pub async fn update<F>(&self, tab_id: u32, mutate: F) -> Result<TabRecord, StoreError>
    where
        F: FnOnce(&mut TabRecord),
    {
        let _guard = self.write_lock.lock().await;

        let mut record = self.read(tab_id).await?.unwrap_or_default();
        mutate(&mut record);

        let key = tab_key(tab_id);
        let value = serde_json::to_value(&record).map_err(|e| StoreError::Serialize {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.backend.set(&key, value).await?;

        // nobody listening is fine
        let _ = self.changes.send(TabUpdate {
            tab_id,
            record: record.clone(),
        });

        Ok(record)
    }

    /// Remove a tab's record entirely (tab closed)
    pub async fn delete(&self, tab_id: u32) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.backend.remove(&tab_key(tab_id)).await
    }

    /// Navigation started: drop findings and errors, keep the
    /// instrumentation flag
    pub async fn clear_for_navigation(&self, tab_id: u32) -> Result<TabRecord, StoreError> {
        self.update(tab_id, |record| record.clear_results()).await
    }
}
