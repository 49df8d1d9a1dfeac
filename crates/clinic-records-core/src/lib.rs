//! Clinic Records Core Library
//!
//! Local-first patient and therapy-session records for a bilingual
//! (English/Arabic) clinic.
//!
//! # Architecture
//!
//! ```text
//!   Patient / Session forms ──► validation ──► Normalizer (to canonical {en, ar})
//!            │                                            │
//!     [DraftSession: debounced autosave]                  ▼
//!            │                              ┌──────────── RecordStore ────────────┐
//!            ▼                              │ patients ─┬─ sessions               │
//!     local_drafts table ◄──────────────────│           └─ session_index (copy)   │
//!                                           │ one transaction per grouped write   │
//!                                           └──────────────┬──────────────────────┘
//!                                                          │
//!                                            subscribers (fresh listings)
//! ```
//!
//! # Modules
//!
//! - [`bilingual`]: Category catalog, translations and the value normalizer
//! - [`config`]: JSON runtime configuration
//! - [`db`]: SQLite schema, row mapping and consistency repair
//! - [`drafts`]: Draft autosave / restore lifecycle
//! - [`models`]: Domain types (Patient, Session, SessionIndexEntry, etc.)
//! - [`store`]: Thread-safe record store with subscriptions
//! - [`validation`]: Form validation and national ID checksum

pub mod bilingual;
pub mod config;
pub mod db;
pub mod drafts;
pub mod models;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use bilingual::{Domain, Locale, Normalizer, Translator};
pub use config::ClinicConfig;
pub use db::{ConsistencyReport, Database};
pub use drafts::{DraftKey, DraftSession, DraftStore};
pub use models::{
    BilingualValue, CategoricalValue, Gender, Language, NewPatient, NewSession, Patient,
    PatientUpdate, Session, SessionIndexEntry, SessionUpdate,
};
pub use store::{PatientQuery, RecordStore, StoreError, Subscription};
pub use validation::{PatientForm, SessionForm, ValidationErrors};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transient; the same call may be retried.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StoreError> for ClinicError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ClinicError::NotFound(what),
            StoreError::Unavailable(why) => ClinicError::Unavailable(why),
            StoreError::Database(e) => ClinicError::DatabaseError(e.to_string()),
        }
    }
}

impl From<db::DbError> for ClinicError {
    fn from(e: db::DbError) -> Self {
        StoreError::from(e).into()
    }
}

impl From<ValidationErrors> for ClinicError {
    fn from(e: ValidationErrors) -> Self {
        ClinicError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::SerializationError(e.to_string())
    }
}

impl From<drafts::DraftStorageError> for ClinicError {
    fn from(e: drafts::DraftStorageError) -> Self {
        match e {
            drafts::DraftStorageError::Unavailable(why) => ClinicError::Unavailable(why),
            drafts::DraftStorageError::Serialization(e) => e.into(),
        }
    }
}

impl From<config::ConfigError> for ClinicError {
    fn from(e: config::ConfigError) -> Self {
        ClinicError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::Unavailable(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<ClinicRecordsCore>, ClinicError> {
    let config = ClinicConfig {
        database_path: Some(path.into()),
        ..Default::default()
    };
    let store = config.open_store()?;
    Ok(ClinicRecordsCore::wrap(store, config))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicRecordsCore>, ClinicError> {
    let config = ClinicConfig::default();
    let store = config.open_store()?;
    Ok(ClinicRecordsCore::wrap(store, config))
}

/// Open the store described by a JSON config file (defaults if missing).
#[uniffi::export]
pub fn open_with_config(config_path: String) -> Result<Arc<ClinicRecordsCore>, ClinicError> {
    let config = ClinicConfig::load(std::path::Path::new(&config_path))?;
    let store = config.open_store()?;
    Ok(ClinicRecordsCore::wrap(store, config))
}

/// Install a global tracing subscriber. Later calls are no-ops.
#[uniffi::export]
pub fn init_logging(filter: String) {
    let filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Check an Israeli national ID (zero-padded to nine digits first).
#[uniffi::export]
pub fn validate_national_id(national_id: String) -> bool {
    validation::validate_national_id(&validation::format_national_id(&national_id))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe record store wrapper for FFI.
#[derive(uniffi::Object)]
pub struct ClinicRecordsCore {
    store: RecordStore,
    normalizer: Normalizer,
    config: ClinicConfig,
}

impl ClinicRecordsCore {
    fn wrap(store: RecordStore, config: ClinicConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            normalizer: Normalizer::new(),
            config,
        })
    }

    /// Patient query with the configured cap unless the caller gives one.
    fn patient_query(&self, search: Option<String>, limit: Option<u32>) -> PatientQuery {
        let query = PatientQuery {
            search,
            ..self.config.patient_query()
        };
        match limit {
            Some(limit) => query.with_limit(limit as usize),
            None => query,
        }
    }

    /// Requested language, or the configured default.
    fn language(&self, raw: Option<String>) -> Result<Language, ClinicError> {
        match raw {
            Some(raw) => parse_language(&raw),
            None => Ok(self.config.default_language),
        }
    }

    fn draft_store(&self) -> DraftStore {
        self.config.draft_store(&self.store)
    }
}

#[uniffi::export]
impl ClinicRecordsCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Validate the form and create the patient (with its first session, if any).
    pub fn create_patient(&self, form: FfiPatientForm) -> Result<FfiPatient, ClinicError> {
        let (fields, first_session) = PatientForm::from(form).into_new_patient(&self.normalizer)?;
        let patient = self.store.create_patient(&fields, first_session.as_ref())?;
        Ok(patient.into())
    }

    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, ClinicError> {
        match self.store.get_patient(&id) {
            Ok(patient) => Ok(Some(patient.into())),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Validate the form and replace every editable field of the patient.
    pub fn update_patient(
        &self,
        id: String,
        form: FfiPatientForm,
    ) -> Result<FfiPatient, ClinicError> {
        let update = PatientForm::from(form).into_patient_update(&self.normalizer)?;
        Ok(self.store.update_patient(&id, &update)?.into())
    }

    pub fn delete_patient(&self, id: String) -> Result<(), ClinicError> {
        Ok(self.store.delete_patient(&id)?)
    }

    /// Patients newest first, filtered by name or national ID.
    pub fn list_patients(
        &self,
        search: Option<String>,
        limit: Option<u32>,
    ) -> Result<Vec<FfiPatient>, ClinicError> {
        let query = self.patient_query(search, limit);
        let patients = self.store.list_patients(&query)?;
        Ok(patients.into_iter().map(Into::into).collect())
    }

    /// Edit form pre-filled from the stored patient.
    pub fn patient_form(
        &self,
        id: String,
        language: Option<String>,
    ) -> Result<FfiPatientForm, ClinicError> {
        let patient = self.store.get_patient(&id)?;
        let locale = Locale::new(self.language(language)?);
        Ok(PatientForm::from_patient(&patient, &self.normalizer, &locale).into())
    }

    pub fn subscribe_patients(
        &self,
        search: Option<String>,
        limit: Option<u32>,
        observer: Box<dyn PatientListObserver>,
    ) -> Result<Arc<FfiSubscription>, ClinicError> {
        let observer: Arc<dyn PatientListObserver> = Arc::from(observer);
        let query = self.patient_query(search, limit);
        let subscription = self.store.subscribe_patients(query, move |patients| {
            observer.on_change(patients.iter().cloned().map(Into::into).collect());
        })?;
        Ok(FfiSubscription::wrap(subscription))
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    pub fn create_session(
        &self,
        patient_id: String,
        form: FfiSessionForm,
    ) -> Result<FfiSession, ClinicError> {
        let fields = SessionForm::from(form).into_new_session(&self.normalizer)?;
        Ok(self.store.create_session(&patient_id, &fields)?.into())
    }

    pub fn get_session(
        &self,
        patient_id: String,
        session_id: String,
    ) -> Result<Option<FfiSession>, ClinicError> {
        match self.store.get_session(&patient_id, &session_id) {
            Ok(session) => Ok(Some(session.into())),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn update_session(
        &self,
        patient_id: String,
        session_id: String,
        form: FfiSessionForm,
    ) -> Result<FfiSession, ClinicError> {
        let fields = SessionForm::from(form).into_new_session(&self.normalizer)?;
        let update = SessionUpdate {
            session_type: Some(fields.session_type),
            session_date: Some(fields.session_date),
            notes: Some(fields.notes),
        };
        Ok(self
            .store
            .update_session(&patient_id, &session_id, &update)?
            .into())
    }

    pub fn delete_session(&self, patient_id: String, session_id: String) -> Result<(), ClinicError> {
        Ok(self.store.delete_session(&patient_id, &session_id)?)
    }

    pub fn list_sessions(&self, patient_id: String) -> Result<Vec<FfiSession>, ClinicError> {
        let sessions = self.store.list_sessions(&patient_id)?;
        Ok(sessions.into_iter().map(Into::into).collect())
    }

    /// Sessions across all patients, latest first.
    pub fn list_all_sessions(&self) -> Result<Vec<FfiSessionIndexEntry>, ClinicError> {
        let entries = self.store.list_all_sessions()?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    /// Search the session index by patient, national ID, type or notes.
    pub fn search_all_sessions(
        &self,
        term: String,
        language: Option<String>,
    ) -> Result<Vec<FfiSessionIndexEntry>, ClinicError> {
        let entries = self
            .store
            .search_all_sessions(&term, self.language(language)?)?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    pub fn subscribe_sessions(
        &self,
        patient_id: String,
        observer: Box<dyn SessionListObserver>,
    ) -> Result<Arc<FfiSubscription>, ClinicError> {
        let observer: Arc<dyn SessionListObserver> = Arc::from(observer);
        let subscription = self.store.subscribe_sessions(&patient_id, move |sessions| {
            observer.on_change(sessions.iter().cloned().map(Into::into).collect());
        })?;
        Ok(FfiSubscription::wrap(subscription))
    }

    pub fn subscribe_all_sessions(
        &self,
        observer: Box<dyn SessionIndexObserver>,
    ) -> Result<Arc<FfiSubscription>, ClinicError> {
        let observer: Arc<dyn SessionIndexObserver> = Arc::from(observer);
        let subscription = self.store.subscribe_all_sessions(move |entries| {
            observer.on_change(entries.iter().cloned().map(Into::into).collect());
        })?;
        Ok(FfiSubscription::wrap(subscription))
    }

    // =========================================================================
    // Normalizer Operations
    // =========================================================================

    /// Display text of a categorical value in `language`.
    pub fn display_value(
        &self,
        value: Option<FfiCategoricalValue>,
        language: Option<String>,
    ) -> Result<String, ClinicError> {
        let value = value.map(CategoricalValue::from);
        Ok(self
            .normalizer
            .to_display(value.as_ref(), self.language(language)?))
    }

    /// Canonical bilingual pair for a key, translation or free text.
    pub fn canonical_value(
        &self,
        domain: FfiDomain,
        input: String,
        custom_text: Option<String>,
    ) -> Option<FfiCategoricalValue> {
        self.normalizer
            .to_canonical(domain.into(), &input, custom_text.as_deref())
            .map(|value| CategoricalValue::from(value).into())
    }

    /// Select options for a category in `language`.
    pub fn category_options(
        &self,
        domain: FfiDomain,
        language: Option<String>,
    ) -> Result<Vec<FfiCategoryOption>, ClinicError> {
        let locale = Locale::new(self.language(language)?);
        Ok(self
            .normalizer
            .options(domain.into(), &locale)
            .into_iter()
            .map(|option| FfiCategoryOption {
                key: option.key,
                label: option.label,
            })
            .collect())
    }

    // =========================================================================
    // Draft Operations
    // =========================================================================

    /// Quiet period the host should wait before autosaving a draft.
    pub fn draft_debounce_ms(&self) -> u64 {
        self.config.draft_debounce_ms
    }

    pub fn has_draft(&self, key: FfiDraftKey) -> Result<bool, ClinicError> {
        Ok(self.draft_store().has_draft(&key.into())?)
    }

    /// Stored draft form data as a JSON object string.
    pub fn load_draft(&self, key: FfiDraftKey) -> Result<Option<String>, ClinicError> {
        match self.draft_store().load(&key.into())? {
            Some(stored) => Ok(Some(serde_json::to_string(&stored.data)?)),
            None => Ok(None),
        }
    }

    /// Save a JSON object string as the draft under `key`.
    pub fn save_draft(&self, key: FfiDraftKey, data_json: String) -> Result<(), ClinicError> {
        let data: drafts::FormData = serde_json::from_str(&data_json)?;
        self.draft_store()
            .save(&key.into(), &data, chrono::Utc::now())?;
        Ok(())
    }

    pub fn remove_draft(&self, key: FfiDraftKey) -> Result<(), ClinicError> {
        Ok(self.draft_store().remove(&key.into())?)
    }

    // =========================================================================
    // Maintenance Operations
    // =========================================================================

    pub fn check_consistency(&self) -> Result<FfiConsistencyReport, ClinicError> {
        Ok(self.store.check_consistency()?.into())
    }

    /// Rebuild index entries and counters; returns the number of repairs.
    pub fn repair_consistency(&self) -> Result<u32, ClinicError> {
        Ok(self.store.repair_consistency()? as u32)
    }
}

fn parse_language(raw: &str) -> Result<Language, ClinicError> {
    raw.parse::<Language>()
        .map_err(|_| ClinicError::InvalidInput(format!("Unknown language: {}", raw)))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// =========================================================================
// Subscriptions
// =========================================================================

#[uniffi::export(callback_interface)]
pub trait PatientListObserver: Send + Sync {
    fn on_change(&self, patients: Vec<FfiPatient>);
}

#[uniffi::export(callback_interface)]
pub trait SessionListObserver: Send + Sync {
    fn on_change(&self, sessions: Vec<FfiSession>);
}

#[uniffi::export(callback_interface)]
pub trait SessionIndexObserver: Send + Sync {
    fn on_change(&self, entries: Vec<FfiSessionIndexEntry>);
}

/// Live listing handle. Dropping it on the foreign side also cancels.
#[derive(uniffi::Object)]
pub struct FfiSubscription {
    inner: Mutex<Option<Subscription>>,
}

impl FfiSubscription {
    fn wrap(subscription: Subscription) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Some(subscription)),
        })
    }
}

#[uniffi::export]
impl FfiSubscription {
    /// Stop receiving updates. Safe to call more than once.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(subscription) = inner.take() {
            subscription.unsubscribe();
        }
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe stored categorical value.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiCategoricalValue {
    pub en: String,
    pub ar: String,
    /// Plain string from before bilingual storage; `en` and `ar` are equal
    pub legacy: bool,
}

impl From<CategoricalValue> for FfiCategoricalValue {
    fn from(value: CategoricalValue) -> Self {
        let legacy = value.is_legacy();
        let pair = value.to_bilingual();
        Self {
            en: pair.en,
            ar: pair.ar,
            legacy,
        }
    }
}

impl From<FfiCategoricalValue> for CategoricalValue {
    fn from(value: FfiCategoricalValue) -> Self {
        if value.legacy {
            CategoricalValue::Legacy(value.en)
        } else {
            BilingualValue::new(value.en, value.ar).into()
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiDomain {
    Diagnosis,
    Insurance,
    SessionType,
}

impl From<FfiDomain> for Domain {
    fn from(domain: FfiDomain) -> Self {
        match domain {
            FfiDomain::Diagnosis => Domain::Diagnosis,
            FfiDomain::Insurance => Domain::Insurance,
            FfiDomain::SessionType => Domain::SessionType,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCategoryOption {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiDraftKey {
    PatientCreate,
    PatientEdit { patient_id: String },
    SessionCreate { patient_id: String },
    SessionEdit { patient_id: String, session_id: String },
}

impl From<FfiDraftKey> for DraftKey {
    fn from(key: FfiDraftKey) -> Self {
        match key {
            FfiDraftKey::PatientCreate => DraftKey::PatientCreate,
            FfiDraftKey::PatientEdit { patient_id } => DraftKey::PatientEdit(patient_id),
            FfiDraftKey::SessionCreate { patient_id } => DraftKey::SessionCreate(patient_id),
            FfiDraftKey::SessionEdit {
                patient_id,
                session_id,
            } => DraftKey::SessionEdit {
                patient_id,
                session_id,
            },
        }
    }
}

/// FFI-safe patient. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub full_name: String,
    pub national_id: String,
    pub birth_date: String,
    pub gender: String,
    pub diagnosis: Option<FfiCategoricalValue>,
    pub insurance: Option<FfiCategoricalValue>,
    pub therapy_name: String,
    pub total_sessions_planned: u32,
    pub session_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            full_name: patient.full_name,
            national_id: patient.national_id,
            birth_date: format_date(patient.birth_date),
            gender: patient.gender.to_string(),
            diagnosis: patient.diagnosis.map(Into::into),
            insurance: patient.insurance.map(Into::into),
            therapy_name: patient.therapy_name,
            total_sessions_planned: patient.total_sessions_planned,
            session_count: patient.session_count,
            created_at: patient.created_at,
            updated_at: patient.updated_at,
        }
    }
}

/// FFI-safe session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSession {
    pub id: String,
    pub patient_id: String,
    pub session_type: FfiCategoricalValue,
    pub session_date: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Session> for FfiSession {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            patient_id: session.patient_id,
            session_type: session.session_type.into(),
            session_date: format_date(session.session_date),
            notes: session.notes,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// FFI-safe session index entry (session plus patient snapshot).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSessionIndexEntry {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub patient_national_id: String,
    pub session_type: FfiCategoricalValue,
    pub session_date: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SessionIndexEntry> for FfiSessionIndexEntry {
    fn from(entry: SessionIndexEntry) -> Self {
        Self {
            id: entry.id,
            patient_id: entry.patient_id,
            patient_name: entry.patient_name,
            patient_national_id: entry.patient_national_id,
            session_type: entry.session_type.into(),
            session_date: format_date(entry.session_date),
            notes: entry.notes,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// FFI-safe patient form, fields as typed.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiPatientForm {
    pub full_name: String,
    pub national_id: String,
    pub birth_date: String,
    pub gender: String,
    pub diagnosis: String,
    pub diagnosis_other: String,
    pub insurance: String,
    pub therapy_name: String,
    pub total_sessions_planned: String,
    pub first_session: Option<FfiSessionForm>,
}

impl From<FfiPatientForm> for PatientForm {
    fn from(form: FfiPatientForm) -> Self {
        Self {
            full_name: form.full_name,
            national_id: form.national_id,
            birth_date: form.birth_date,
            gender: form.gender,
            diagnosis: form.diagnosis,
            diagnosis_other: form.diagnosis_other,
            insurance: form.insurance,
            therapy_name: form.therapy_name,
            total_sessions_planned: form.total_sessions_planned,
            first_session: form.first_session.map(Into::into),
        }
    }
}

impl From<PatientForm> for FfiPatientForm {
    fn from(form: PatientForm) -> Self {
        Self {
            full_name: form.full_name,
            national_id: form.national_id,
            birth_date: form.birth_date,
            gender: form.gender,
            diagnosis: form.diagnosis,
            diagnosis_other: form.diagnosis_other,
            insurance: form.insurance,
            therapy_name: form.therapy_name,
            total_sessions_planned: form.total_sessions_planned,
            first_session: form.first_session.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiSessionForm {
    pub session_type: String,
    pub session_date: String,
    pub notes: String,
}

impl From<FfiSessionForm> for SessionForm {
    fn from(form: FfiSessionForm) -> Self {
        Self {
            session_type: form.session_type,
            session_date: form.session_date,
            notes: form.notes,
        }
    }
}

impl From<SessionForm> for FfiSessionForm {
    fn from(form: SessionForm) -> Self {
        Self {
            session_type: form.session_type,
            session_date: form.session_date,
            notes: form.notes,
        }
    }
}

/// FFI-safe consistency report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsistencyReport {
    pub consistent: bool,
    pub patients_checked: u32,
    pub sessions_checked: u32,
    pub issues: Vec<String>,
}

impl From<ConsistencyReport> for FfiConsistencyReport {
    fn from(report: ConsistencyReport) -> Self {
        Self {
            consistent: report.is_consistent(),
            patients_checked: report.patients_checked as u32,
            sessions_checked: report.sessions_checked as u32,
            issues: report
                .issues
                .into_iter()
                .map(|issue| issue.description)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn patient_form() -> FfiPatientForm {
        FfiPatientForm {
            full_name: "Lina Haddad".into(),
            national_id: "18".into(),
            birth_date: "2019-05-20".into(),
            gender: "Female".into(),
            diagnosis: "ASD".into(),
            therapy_name: "Speech".into(),
            total_sessions_planned: "12".into(),
            first_session: Some(FfiSessionForm {
                session_type: "Assessment".into(),
                session_date: "2024-03-01".into(),
                notes: String::new(),
            }),
            ..Default::default()
        }
    }

    struct CountingObserver(Arc<AtomicUsize>);

    impl SessionIndexObserver for CountingObserver {
        fn on_change(&self, entries: Vec<FfiSessionIndexEntry>) {
            self.0.store(entries.len(), Ordering::SeqCst);
        }
    }

    #[test]
    fn test_create_and_list() {
        let core = open_database_in_memory().unwrap();
        let patient = core.create_patient(patient_form()).unwrap();
        assert_eq!(patient.national_id, "000000018");
        assert_eq!(patient.session_count, 1);
        assert_eq!(patient.birth_date, "2019-05-20");

        let sessions = core.list_sessions(patient.id.clone()).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_type.en, "Assessment");
        assert!(sessions[0].notes.is_none());

        let entries = core.list_all_sessions().unwrap();
        assert_eq!(entries[0].patient_name, "Lina Haddad");
    }

    #[test]
    fn test_invalid_form_rejected() {
        let core = open_database_in_memory().unwrap();
        let form = FfiPatientForm {
            national_id: "123456789".into(),
            ..patient_form()
        };
        assert!(matches!(
            core.create_patient(form),
            Err(ClinicError::InvalidInput(_))
        ));
        assert!(core.list_patients(None, Some(10)).unwrap().is_empty());
    }

    #[test]
    fn test_missing_records() {
        let core = open_database_in_memory().unwrap();
        assert!(core.get_patient("nope".into()).unwrap().is_none());
        assert!(matches!(
            core.delete_patient("nope".into()),
            Err(ClinicError::NotFound(_))
        ));
        assert!(matches!(
            core.list_patients(None, Some(10)).map(|p| p.len()),
            Ok(0)
        ));
    }

    #[test]
    fn test_subscription_cancel() {
        let core = open_database_in_memory().unwrap();
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let subscription = core
            .subscribe_all_sessions(Box::new(CountingObserver(seen.clone())))
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        let patient = core.create_patient(patient_form()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        subscription.cancel();
        subscription.cancel();
        core.create_session(
            patient.id,
            FfiSessionForm {
                session_type: "Follow-up".into(),
                session_date: "2024-03-08".into(),
                notes: "ok".into(),
            },
        )
        .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_display_and_canonical() {
        let core = open_database_in_memory().unwrap();
        let value = core
            .canonical_value(FfiDomain::Diagnosis, "ASD".into(), None)
            .unwrap();
        assert!(!value.legacy);
        assert_eq!(core.display_value(Some(value), Some("en".into())).unwrap(), "ASD");
        assert_eq!(core.display_value(None, Some("ar".into())).unwrap(), "");
        assert!(core.display_value(None, Some("fr".into())).is_err());
    }

    #[test]
    fn test_drafts_round_trip_through_store() {
        let core = open_database_in_memory().unwrap();
        let key = FfiDraftKey::PatientEdit {
            patient_id: "p-1".into(),
        };
        assert!(!core.has_draft(key.clone()).unwrap());
        core.save_draft(key.clone(), r#"{"fullName":"Omar"}"#.into())
            .unwrap();
        assert_eq!(
            core.load_draft(key.clone()).unwrap().as_deref(),
            Some(r#"{"fullName":"Omar"}"#)
        );
        core.remove_draft(key.clone()).unwrap();
        assert!(core.load_draft(key).unwrap().is_none());
        assert!(core.save_draft(FfiDraftKey::PatientCreate, "[]".into()).is_err());
    }

    #[test]
    fn test_config_file_shapes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("clinic.json");
        let config = ClinicConfig {
            database_path: Some(dir.path().join("clinic.db")),
            draft_debounce_ms: 250,
            draft_prefix: "ward_a_".into(),
            patient_list_limit: 1,
            default_language: Language::Ar,
        };
        config.save(&config_path).unwrap();

        let core = open_with_config(config_path.to_string_lossy().into_owned()).unwrap();
        assert_eq!(core.draft_debounce_ms(), 250);

        core.create_patient(patient_form()).unwrap();
        core.create_patient(patient_form()).unwrap();
        assert_eq!(core.list_patients(None, None).unwrap().len(), 1);
        assert_eq!(core.list_patients(None, Some(10)).unwrap().len(), 2);

        let options = core.category_options(FfiDomain::Diagnosis, None).unwrap();
        assert_eq!(options[2].label, "طيف التوحد");
        let value = core
            .canonical_value(FfiDomain::Diagnosis, "ASD".into(), None)
            .unwrap();
        assert_eq!(core.display_value(Some(value), None).unwrap(), "طيف التوحد");

        core.save_draft(FfiDraftKey::PatientCreate, r#"{"fullName":"Omar"}"#.into())
            .unwrap();
        let key = DraftKey::PatientCreate;
        assert!(core.store.draft_store("ward_a_").has_draft(&key).unwrap());
        assert!(!core
            .store
            .draft_store(drafts::DEFAULT_DRAFT_PREFIX)
            .has_draft(&key)
            .unwrap());
    }

    #[test]
    fn test_national_id_export() {
        assert!(validate_national_id("123456782".into()));
        assert!(!validate_national_id("123456789".into()));
    }
}
