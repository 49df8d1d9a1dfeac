//! Therapy session models and the denormalized session index entry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{CategoricalValue, Language, Patient};

/// A therapy session, owned by exactly one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Store-assigned UUID
    pub id: String,
    /// Owning patient
    pub patient_id: String,
    pub session_type: CategoricalValue,
    pub session_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Flat copy of a session joined with a snapshot of its patient.
///
/// Used for cross-patient listings without touching every patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionIndexEntry {
    /// Same as the session ID
    pub id: String,
    pub patient_id: String,
    /// Patient name at the time of the last snapshot propagation
    pub patient_name: String,
    /// Patient national ID at the time of the last snapshot propagation
    pub patient_national_id: String,
    pub session_type: CategoricalValue,
    pub session_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionIndexEntry {
    /// Build the index entry for `session` using the current patient snapshot.
    pub fn from_session(session: &Session, patient: &Patient) -> Self {
        Self {
            id: session.id.clone(),
            patient_id: session.patient_id.clone(),
            patient_name: patient.full_name.clone(),
            patient_national_id: patient.national_id.clone(),
            session_type: session.session_type.clone(),
            session_date: session.session_date,
            notes: session.notes.clone(),
            created_at: session.created_at.clone(),
            updated_at: session.updated_at.clone(),
        }
    }

    /// Whether the session-owned fields agree with `session`.
    pub fn mirrors(&self, session: &Session) -> bool {
        self.id == session.id
            && self.patient_id == session.patient_id
            && self.session_type == session.session_type
            && self.session_date == session.session_date
            && self.notes == session.notes
            && self.created_at == session.created_at
            && self.updated_at == session.updated_at
    }

    /// Case-insensitive match over patient name, national ID, notes and the
    /// session type as displayed in `language`.
    pub fn matches_search(&self, term: &str, language: Language) -> bool {
        let term = term.to_lowercase();
        self.patient_name.to_lowercase().contains(&term)
            || self.patient_national_id.to_lowercase().contains(&term)
            || self
                .session_type
                .display(language)
                .to_lowercase()
                .contains(&term)
            || self
                .notes
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(&term)
    }
}

/// Fields supplied when creating a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSession {
    pub session_type: CategoricalValue,
    pub session_date: NaiveDate,
    pub notes: Option<String>,
}

/// Partial session update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionUpdate {
    pub session_type: Option<CategoricalValue>,
    pub session_date: Option<NaiveDate>,
    /// `Some(None)` clears the notes
    pub notes: Option<Option<String>>,
}

impl SessionUpdate {
    /// Merge this update into `session`.
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(session_type) = &self.session_type {
            session.session_type = session_type.clone();
        }
        if let Some(session_date) = self.session_date {
            session.session_date = session_date;
        }
        if let Some(notes) = &self.notes {
            session.notes = notes.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BilingualValue, Gender};

    fn make_session() -> Session {
        Session {
            id: "s-1".into(),
            patient_id: "p-1".into(),
            session_type: BilingualValue::new("Assessment", "التقييم").into(),
            session_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            notes: Some("Initial evaluation".into()),
            created_at: "2024-03-01T09:00:00.000000Z".into(),
            updated_at: "2024-03-01T09:00:00.000000Z".into(),
        }
    }

    fn make_patient() -> Patient {
        Patient {
            id: "p-1".into(),
            full_name: "Omar Saleh".into(),
            national_id: "000000018".into(),
            birth_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            gender: Gender::Male,
            diagnosis: None,
            insurance: None,
            therapy_name: "Physio".into(),
            total_sessions_planned: 10,
            session_count: 1,
            created_at: "2024-01-01T00:00:00.000000Z".into(),
            updated_at: "2024-01-01T00:00:00.000000Z".into(),
        }
    }

    #[test]
    fn test_index_entry_mirrors_session() {
        let session = make_session();
        let entry = SessionIndexEntry::from_session(&session, &make_patient());
        assert_eq!(entry.patient_name, "Omar Saleh");
        assert!(entry.mirrors(&session));

        let mut changed = session.clone();
        SessionUpdate {
            notes: Some(None),
            ..Default::default()
        }
        .apply_to(&mut changed);
        assert!(!entry.mirrors(&changed));
    }

    #[test]
    fn test_search_uses_display_language() {
        let entry = SessionIndexEntry::from_session(&make_session(), &make_patient());
        assert!(entry.matches_search("assess", Language::En));
        assert!(entry.matches_search("التقييم", Language::Ar));
        assert!(!entry.matches_search("التقييم", Language::En));
        assert!(entry.matches_search("OMAR", Language::Ar));
        assert!(entry.matches_search("evaluation", Language::En));
    }
}
