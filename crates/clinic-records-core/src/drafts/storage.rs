//! Namespaced JSON draft persistence over a string key-value store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{DraftKey, FormData};

/// Default namespace for draft entries.
pub const DEFAULT_DRAFT_PREFIX: &str = "clinic_draft_";

/// Local draft storage errors.
#[derive(Error, Debug)]
pub enum DraftStorageError {
    #[error("Draft storage unavailable: {0}")]
    Unavailable(String),

    #[error("Draft serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DraftStorageResult<T> = Result<T, DraftStorageError>;

/// Synchronous string-keyed storage for drafts.
pub trait DraftStorage: Send + Sync {
    fn get_item(&self, key: &str) -> DraftStorageResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> DraftStorageResult<()>;
    fn remove_item(&self, key: &str) -> DraftStorageResult<()>;
}

/// Process-local storage. Can be switched offline to simulate quota or
/// availability failures.
#[derive(Debug, Default)]
pub struct MemoryDraftStorage {
    items: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryDraftStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Raw stored keys, including the namespace prefix.
    pub fn keys(&self) -> Vec<String> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = items.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn items(&self) -> DraftStorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DraftStorageError::Unavailable("storage offline".into()));
        }
        self.items
            .lock()
            .map_err(|_| DraftStorageError::Unavailable("storage lock poisoned".into()))
    }
}

impl DraftStorage for MemoryDraftStorage {
    fn get_item(&self, key: &str) -> DraftStorageResult<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> DraftStorageResult<()> {
        self.items()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> DraftStorageResult<()> {
        self.items()?.remove(key);
        Ok(())
    }
}

/// Persisted draft payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredDraft {
    /// Form fields as last autosaved
    pub data: FormData,
    /// RFC 3339 save time
    pub saved_at: String,
}

/// Reads and writes [`StoredDraft`]s under a fixed namespace prefix.
#[derive(Clone)]
pub struct DraftStore {
    storage: Arc<dyn DraftStorage>,
    prefix: String,
}

impl DraftStore {
    pub fn new(storage: Arc<dyn DraftStorage>) -> Self {
        Self::with_prefix(storage, DEFAULT_DRAFT_PREFIX)
    }

    pub fn with_prefix(storage: Arc<dyn DraftStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    fn storage_key(&self, key: &DraftKey) -> String {
        format!("{}{}", self.prefix, key.storage_key())
    }

    pub fn has_draft(&self, key: &DraftKey) -> DraftStorageResult<bool> {
        Ok(self.storage.get_item(&self.storage_key(key))?.is_some())
    }

    pub fn load(&self, key: &DraftKey) -> DraftStorageResult<Option<StoredDraft>> {
        match self.storage.get_item(&self.storage_key(key))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save(
        &self,
        key: &DraftKey,
        data: &FormData,
        saved_at: DateTime<Utc>,
    ) -> DraftStorageResult<()> {
        let draft = StoredDraft {
            data: data.clone(),
            saved_at: saved_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        let raw = serde_json::to_string(&draft)?;
        self.storage.set_item(&self.storage_key(key), &raw)
    }

    pub fn remove(&self, key: &DraftKey) -> DraftStorageResult<()> {
        self.storage.remove_item(&self.storage_key(key))
    }
}
