//! Deterministic draft keys per form and entity.

use std::fmt;

/// Identifies the form a draft belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DraftKey {
    /// New patient form
    PatientCreate,
    /// Edit form for an existing patient
    PatientEdit(String),
    /// New session form under a patient
    SessionCreate(String),
    /// Edit form for an existing session
    SessionEdit {
        patient_id: String,
        session_id: String,
    },
}

impl DraftKey {
    /// Key within the draft namespace (without prefix).
    pub fn storage_key(&self) -> String {
        match self {
            DraftKey::PatientCreate => "patient_create".to_string(),
            DraftKey::PatientEdit(id) => format!("patient_edit_{}", id),
            DraftKey::SessionCreate(patient_id) => format!("session_create_{}", patient_id),
            DraftKey::SessionEdit {
                patient_id,
                session_id,
            } => format!("session_edit_{}_{}", patient_id, session_id),
        }
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
