//! Runtime configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drafts::{
    DraftKey, DraftSession, DraftStore, FormData, DEFAULT_DEBOUNCE_MS, DEFAULT_DRAFT_PREFIX,
};
use crate::models::Language;
use crate::store::{PatientQuery, RecordStore, StoreResult};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Clinic records configuration. Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClinicConfig {
    /// SQLite file; `None` keeps everything in memory
    pub database_path: Option<PathBuf>,
    /// Quiet period before a draft is autosaved
    pub draft_debounce_ms: u64,
    /// Namespace prefix for stored drafts
    pub draft_prefix: String,
    /// Cap for patient listings
    pub patient_list_limit: usize,
    pub default_language: Language,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            draft_debounce_ms: DEFAULT_DEBOUNCE_MS as u64,
            draft_prefix: DEFAULT_DRAFT_PREFIX.to_string(),
            patient_list_limit: 100,
            default_language: Language::En,
        }
    }
}

impl ClinicConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load config from file, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_json_str(&content)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn draft_debounce(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.draft_debounce_ms.min(i64::MAX as u64) as i64)
    }

    /// Unfiltered patient query capped at the configured limit.
    pub fn patient_query(&self) -> PatientQuery {
        PatientQuery::default().with_limit(self.patient_list_limit)
    }

    /// Drafts kept in `store` under the configured prefix.
    pub fn draft_store(&self, store: &RecordStore) -> DraftStore {
        store.draft_store(&self.draft_prefix)
    }

    /// Draft session with the configured prefix and debounce.
    pub fn start_draft(
        &self,
        store: &RecordStore,
        key: Option<DraftKey>,
        initial: FormData,
    ) -> DraftSession {
        DraftSession::start(self.draft_store(store), key, initial)
            .with_debounce(self.draft_debounce())
    }

    /// Open the record store this config points at.
    pub fn open_store(&self) -> StoreResult<RecordStore> {
        match &self.database_path {
            Some(path) => RecordStore::open(path),
            None => RecordStore::open_in_memory(),
        }
    }
}
