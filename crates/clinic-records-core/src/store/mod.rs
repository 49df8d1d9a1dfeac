//! Record store: thread-safe patient and session storage with real-time
//! listings.
//!
//! Every grouped write (record + index entry + counter) commits as one SQLite
//! transaction. Subscribers receive a fresh listing after each committed
//! mutation that can change it. Callbacks run with no database lock held and
//! never see a listing older than one they already received.

mod subscriptions;

pub use subscriptions::{
    IndexCallback, PatientQuery, PatientsCallback, SessionsCallback, Subscription,
};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::db::{ConsistencyReport, Database, DbError};
use crate::drafts::{DraftStorage, DraftStorageError, DraftStorageResult, DraftStore};
use crate::models::{
    Language, NewPatient, NewSession, Patient, PatientUpdate, Session, SessionIndexEntry,
    SessionUpdate,
};
use subscriptions::{Affected, Listener, SessionScope, SubscriptionHub, Watch};

/// Record store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl StoreError {
    /// Whether the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => StoreError::NotFound(what),
            DbError::Sqlite(ref err)
                if matches!(
                    err.sqlite_error_code(),
                    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
                ) =>
            {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(e: PoisonError<T>) -> Self {
        StoreError::Unavailable(format!("Lock poisoned: {}", e))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to the clinic's patient and session records.
#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Mutex<Database>>,
    hub: Arc<SubscriptionHub>,
}

impl RecordStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            hub: Arc::new(SubscriptionHub::default()),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn db(&self) -> StoreResult<MutexGuard<'_, Database>> {
        Ok(self.db.lock()?)
    }

    // =========================================================================
    // Patients
    // =========================================================================

    /// Create a patient, optionally with its first session.
    pub fn create_patient(
        &self,
        fields: &NewPatient,
        first_session: Option<&NewSession>,
    ) -> StoreResult<Patient> {
        let (patient, session) = self.db()?.create_patient(fields, first_session)?;
        self.notify(Affected {
            patients: true,
            sessions: match session {
                Some(_) => SessionScope::Patient(patient.id.clone()),
                None => SessionScope::Untouched,
            },
            all_sessions: session.is_some(),
        });
        Ok(patient)
    }

    pub fn get_patient(&self, id: &str) -> StoreResult<Patient> {
        self.db()?
            .get_patient(id)?
            .ok_or_else(|| StoreError::NotFound(format!("patient {}", id)))
    }

    /// Merge `update` into the patient, refreshing index snapshots when the
    /// name or national ID changed.
    pub fn update_patient(&self, id: &str, update: &PatientUpdate) -> StoreResult<Patient> {
        let snapshot_changed = update.full_name.is_some() || update.national_id.is_some();
        let patient = self.db()?.update_patient(id, update)?;
        self.notify(Affected {
            patients: true,
            sessions: SessionScope::Untouched,
            all_sessions: snapshot_changed,
        });
        Ok(patient)
    }

    /// Delete a patient together with its sessions and index entries.
    pub fn delete_patient(&self, id: &str) -> StoreResult<()> {
        self.db()?.delete_patient(id)?;
        self.notify(Affected {
            patients: true,
            sessions: SessionScope::Patient(id.to_string()),
            all_sessions: true,
        });
        Ok(())
    }

    pub fn list_patients(&self, query: &PatientQuery) -> StoreResult<Vec<Patient>> {
        Ok(self
            .db()?
            .list_patients(query.search.as_deref(), query.limit)?)
    }

    /// Receive the filtered patient listing now and after every change.
    pub fn subscribe_patients<F>(&self, query: PatientQuery, callback: F) -> StoreResult<Subscription>
    where
        F: Fn(&[Patient]) + Send + Sync + 'static,
    {
        let callback: PatientsCallback = Arc::new(callback);
        self.subscribe(Watch::Patients { query, callback })
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub fn create_session(&self, patient_id: &str, fields: &NewSession) -> StoreResult<Session> {
        let session = self.db()?.create_session(patient_id, fields)?;
        self.notify(Affected {
            patients: true,
            sessions: SessionScope::Patient(patient_id.to_string()),
            all_sessions: true,
        });
        Ok(session)
    }

    pub fn update_session(
        &self,
        patient_id: &str,
        id: &str,
        update: &SessionUpdate,
    ) -> StoreResult<Session> {
        let session = self.db()?.update_session(patient_id, id, update)?;
        self.notify(Affected {
            patients: false,
            sessions: SessionScope::Patient(patient_id.to_string()),
            all_sessions: true,
        });
        Ok(session)
    }

    pub fn delete_session(&self, patient_id: &str, id: &str) -> StoreResult<()> {
        self.db()?.delete_session(patient_id, id)?;
        self.notify(Affected {
            patients: true,
            sessions: SessionScope::Patient(patient_id.to_string()),
            all_sessions: true,
        });
        Ok(())
    }

    pub fn get_session(&self, patient_id: &str, id: &str) -> StoreResult<Session> {
        self.db()?
            .get_session(patient_id, id)?
            .ok_or_else(|| StoreError::NotFound(format!("session {}/{}", patient_id, id)))
    }

    /// Sessions of one patient, latest first.
    pub fn list_sessions(&self, patient_id: &str) -> StoreResult<Vec<Session>> {
        Ok(self.db()?.list_sessions(patient_id)?)
    }

    /// Sessions across all patients, latest first, from the index.
    pub fn list_all_sessions(&self) -> StoreResult<Vec<SessionIndexEntry>> {
        Ok(self.db()?.list_all_sessions()?)
    }

    pub fn search_all_sessions(
        &self,
        term: &str,
        language: Language,
    ) -> StoreResult<Vec<SessionIndexEntry>> {
        Ok(self.db()?.search_all_sessions(term, language)?)
    }

    pub fn subscribe_sessions<F>(&self, patient_id: &str, callback: F) -> StoreResult<Subscription>
    where
        F: Fn(&[Session]) + Send + Sync + 'static,
    {
        let callback: SessionsCallback = Arc::new(callback);
        self.subscribe(Watch::Sessions {
            patient_id: patient_id.to_string(),
            callback,
        })
    }

    pub fn subscribe_all_sessions<F>(&self, callback: F) -> StoreResult<Subscription>
    where
        F: Fn(&[SessionIndexEntry]) + Send + Sync + 'static,
    {
        let callback: IndexCallback = Arc::new(callback);
        self.subscribe(Watch::AllSessions { callback })
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    pub fn check_consistency(&self) -> StoreResult<ConsistencyReport> {
        Ok(self.db()?.check_consistency()?)
    }

    /// Rebuild the index and counters; returns the number of repairs.
    pub fn repair_consistency(&self) -> StoreResult<usize> {
        let repaired = self.db()?.repair_consistency()?;
        if repaired > 0 {
            self.notify(Affected::everything());
        }
        Ok(repaired)
    }

    /// Draft store persisting into this database's local draft table.
    pub fn draft_store(&self, prefix: &str) -> DraftStore {
        DraftStore::with_prefix(Arc::new(self.clone()), prefix)
    }

    /// Register before the first read so no commit falls between the
    /// initial listing and the first notification.
    fn subscribe(&self, watch: Watch) -> StoreResult<Subscription> {
        let listener = Listener::new(watch);
        let subscription = self.hub.register(listener.clone());
        self.deliver(&listener)?;
        Ok(subscription)
    }

    /// Push fresh listings to every interested subscriber.
    fn notify(&self, affected: Affected) {
        for listener in self.hub.interested(&affected) {
            if let Err(e) = self.deliver(&listener) {
                tracing::warn!(error = %e, "Failed to refresh subscription");
            }
        }
    }

    /// Deliver the current listing to one listener.
    ///
    /// When another thread (or an outer frame on this one) is already
    /// delivering, the listener is marked dirty and that deliverer reads again
    /// after its callback returns.
    fn deliver(&self, listener: &Listener) -> StoreResult<()> {
        let Some(mut claim) = listener.delivery.claim() else {
            tracing::trace!("Delivery in progress, coalescing refresh");
            return Ok(());
        };
        loop {
            claim.start_pass();
            self.deliver_once(&listener.watch)?;
            if !claim.needs_another_pass() {
                return Ok(());
            }
        }
    }

    fn deliver_once(&self, watch: &Watch) -> StoreResult<()> {
        // Each listing is read under the lock; callbacks run after it is released.
        match watch {
            Watch::Patients { query, callback } => {
                let patients = self.list_patients(query)?;
                callback(&patients);
            }
            Watch::Sessions {
                patient_id,
                callback,
            } => {
                let sessions = self.list_sessions(patient_id)?;
                callback(&sessions);
            }
            Watch::AllSessions { callback } => {
                let entries = self.list_all_sessions()?;
                callback(&entries);
            }
        }
        Ok(())
    }
}

impl DraftStorage for RecordStore {
    fn get_item(&self, key: &str) -> DraftStorageResult<Option<String>> {
        let db = self.db().map_err(|e| DraftStorageError::Unavailable(e.to_string()))?;
        db.get_local_draft(key)
            .map_err(|e| DraftStorageError::Unavailable(e.to_string()))
    }

    fn set_item(&self, key: &str, value: &str) -> DraftStorageResult<()> {
        let db = self.db().map_err(|e| DraftStorageError::Unavailable(e.to_string()))?;
        db.set_local_draft(key, value)
            .map_err(|e| DraftStorageError::Unavailable(e.to_string()))
    }

    fn remove_item(&self, key: &str) -> DraftStorageResult<()> {
        let db = self.db().map_err(|e| DraftStorageError::Unavailable(e.to_string()))?;
        db.remove_local_draft(key)
            .map(|_| ())
            .map_err(|e| DraftStorageError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::DraftKey;
    use crate::models::{BilingualValue, Gender};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup_store() -> RecordStore {
        RecordStore::open_in_memory().unwrap()
    }

    fn new_patient(name: &str) -> NewPatient {
        NewPatient {
            full_name: name.into(),
            national_id: "000000018".into(),
            birth_date: NaiveDate::from_ymd_opt(2019, 9, 2).unwrap(),
            gender: Gender::Male,
            diagnosis: None,
            insurance: None,
            therapy_name: "Speech".into(),
            total_sessions_planned: 4,
        }
    }

    fn new_session() -> NewSession {
        NewSession {
            session_type: BilingualValue::new("Follow-up", "المتابعة").into(),
            session_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            notes: None,
        }
    }

    #[test]
    fn test_not_found_mapping() {
        let store = setup_store();
        let err = store.get_patient("missing").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!err.is_retryable());

        let err = store.delete_session("missing", "missing").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_busy_is_retryable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err = StoreError::from(DbError::Sqlite(busy));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_subscription_receives_initial_and_updates() {
        let store = setup_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let last_len = Arc::new(AtomicUsize::new(usize::MAX));

        let sub = {
            let calls = calls.clone();
            let last_len = last_len.clone();
            store
                .subscribe_patients(PatientQuery::default(), move |patients| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    last_len.store(patients.len(), Ordering::SeqCst);
                })
                .unwrap()
        };
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_len.load(Ordering::SeqCst), 0);

        store.create_patient(&new_patient("Adam"), None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(last_len.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        store.create_patient(&new_patient("Basel"), None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_session_subscription_scoped_to_patient() {
        let store = setup_store();
        let a = store.create_patient(&new_patient("Adam"), None).unwrap();
        let b = store.create_patient(&new_patient("Basel"), None).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let calls = calls.clone();
            store
                .subscribe_sessions(&a.id, move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };

        store.create_session(&b.id, &new_session()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        store.create_session(&a.id, &new_session()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_may_reenter_store() {
        let store = setup_store();
        let observed = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let inner = store.clone();
            let observed = observed.clone();
            store
                .subscribe_all_sessions(move |_| {
                    // Reading inside the callback must not deadlock
                    let count = inner.list_patients(&PatientQuery::default()).unwrap().len();
                    observed.store(count, Ordering::SeqCst);
                })
                .unwrap()
        };

        store
            .create_patient(&new_patient("Adam"), Some(&new_session()))
            .unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_write_to_store() {
        let store = setup_store();
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let inner = store.clone();
            let lengths = lengths.clone();
            store
                .subscribe_patients(PatientQuery::default(), move |patients| {
                    lengths.lock().unwrap().push(patients.len());
                    if patients.len() == 1 {
                        inner.create_patient(&new_patient("Basel"), None).unwrap();
                    }
                })
                .unwrap()
        };

        store.create_patient(&new_patient("Adam"), None).unwrap();
        // The nested write is picked up once the outer callback returns
        assert_eq!(*lengths.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_drafts_persist_in_database() {
        let store = setup_store();
        let drafts = store.draft_store("clinic_draft_");
        let data = serde_json::json!({"fullName": "Adam"})
            .as_object()
            .cloned()
            .unwrap();

        drafts
            .save(&DraftKey::PatientCreate, &data, chrono::Utc::now())
            .unwrap();
        assert!(drafts.has_draft(&DraftKey::PatientCreate).unwrap());
        assert_eq!(
            store.db().unwrap().list_local_draft_keys().unwrap(),
            vec!["clinic_draft_patient_create".to_string()]
        );
    }
}
