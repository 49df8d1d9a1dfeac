//! Patient models.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::CategoricalValue;

/// Patient gender as recorded on the intake form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Male" | "male" => Ok(Gender::Male),
            "Female" | "female" => Ok(Gender::Female),
            other => Err(format!("Unknown gender: {}", other)),
        }
    }
}

/// Age in whole years plus remaining months.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Age {
    pub years: u32,
    pub months: u32,
}

/// A patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Store-assigned UUID, immutable after creation
    pub id: String,
    /// Full name as entered
    pub full_name: String,
    /// 9-digit national ID (zero padded)
    pub national_id: String,
    /// Date of birth
    pub birth_date: NaiveDate,
    pub gender: Gender,
    /// Diagnosis (bilingual, or legacy plain string)
    pub diagnosis: Option<CategoricalValue>,
    /// Insurance provider (bilingual, or legacy plain string)
    pub insurance: Option<CategoricalValue>,
    /// Treating therapist
    pub therapy_name: String,
    /// Number of sessions planned for the treatment course
    pub total_sessions_planned: u32,
    /// Cached number of live sessions; maintained by the store
    pub session_count: u32,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Age on `today`, or `None` when the birth date lies in the future.
    pub fn age_on(&self, today: NaiveDate) -> Option<Age> {
        age_between(self.birth_date, today)
    }

    /// Case-insensitive substring match over name and national ID.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.full_name.to_lowercase().contains(&term)
            || self.national_id.to_lowercase().contains(&term)
    }
}

/// Fields supplied when creating a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub full_name: String,
    pub national_id: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub diagnosis: Option<CategoricalValue>,
    pub insurance: Option<CategoricalValue>,
    pub therapy_name: String,
    pub total_sessions_planned: u32,
}

/// Partial patient update. `None` leaves a field untouched.
///
/// `diagnosis` and `insurance` are doubly optional: `Some(None)` clears them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientUpdate {
    pub full_name: Option<String>,
    pub national_id: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub diagnosis: Option<Option<CategoricalValue>>,
    pub insurance: Option<Option<CategoricalValue>>,
    pub therapy_name: Option<String>,
    pub total_sessions_planned: Option<u32>,
}

impl PatientUpdate {
    /// Merge this update into `patient`.
    ///
    /// Returns true when a field denormalized into the session index changed.
    pub fn apply_to(&self, patient: &mut Patient) -> bool {
        let mut snapshot_changed = false;

        if let Some(full_name) = &self.full_name {
            snapshot_changed |= *full_name != patient.full_name;
            patient.full_name = full_name.clone();
        }
        if let Some(national_id) = &self.national_id {
            snapshot_changed |= *national_id != patient.national_id;
            patient.national_id = national_id.clone();
        }
        if let Some(birth_date) = self.birth_date {
            patient.birth_date = birth_date;
        }
        if let Some(gender) = self.gender {
            patient.gender = gender;
        }
        if let Some(diagnosis) = &self.diagnosis {
            patient.diagnosis = diagnosis.clone();
        }
        if let Some(insurance) = &self.insurance {
            patient.insurance = insurance.clone();
        }
        if let Some(therapy_name) = &self.therapy_name {
            patient.therapy_name = therapy_name.clone();
        }
        if let Some(total) = self.total_sessions_planned {
            patient.total_sessions_planned = total;
        }

        snapshot_changed
    }

    pub fn is_empty(&self) -> bool {
        *self == PatientUpdate::default()
    }
}

fn age_between(birth: NaiveDate, today: NaiveDate) -> Option<Age> {
    if birth > today {
        return None;
    }
    let mut months = (today.year() - birth.year()) * 12 + today.month() as i32
        - birth.month() as i32;
    if today.day() < birth.day() {
        months -= 1;
    }
    let months = months.max(0) as u32;
    Some(Age {
        years: months / 12,
        months: months % 12,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BilingualValue;

    fn make_patient() -> Patient {
        Patient {
            id: "p-1".into(),
            full_name: "Lina Haddad".into(),
            national_id: "000000018".into(),
            birth_date: NaiveDate::from_ymd_opt(2019, 5, 20).unwrap(),
            gender: Gender::Female,
            diagnosis: Some(BilingualValue::new("ASD", "طيف التوحد").into()),
            insurance: None,
            therapy_name: "Speech".into(),
            total_sessions_planned: 12,
            session_count: 0,
            created_at: "2024-01-01T00:00:00.000000Z".into(),
            updated_at: "2024-01-01T00:00:00.000000Z".into(),
        }
    }

    #[test]
    fn test_age_on() {
        let patient = make_patient();
        let age = patient
            .age_on(NaiveDate::from_ymd_opt(2024, 5, 19).unwrap())
            .unwrap();
        assert_eq!(age, Age { years: 4, months: 11 });

        let age = patient
            .age_on(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap())
            .unwrap();
        assert_eq!(age, Age { years: 5, months: 0 });

        assert!(patient
            .age_on(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap())
            .is_none());
    }

    #[test]
    fn test_update_reports_snapshot_change() {
        let mut patient = make_patient();

        let update = PatientUpdate {
            therapy_name: Some("Occupational".into()),
            ..Default::default()
        };
        assert!(!update.apply_to(&mut patient));
        assert_eq!(patient.therapy_name, "Occupational");

        // Same name is not a change
        let update = PatientUpdate {
            full_name: Some("Lina Haddad".into()),
            ..Default::default()
        };
        assert!(!update.apply_to(&mut patient));

        let update = PatientUpdate {
            national_id: Some("000000026".into()),
            ..Default::default()
        };
        assert!(update.apply_to(&mut patient));
        assert_eq!(patient.national_id, "000000026");
    }

    #[test]
    fn test_update_clears_optional_fields() {
        let mut patient = make_patient();
        let update = PatientUpdate {
            diagnosis: Some(None),
            ..Default::default()
        };
        update.apply_to(&mut patient);
        assert!(patient.diagnosis.is_none());
    }

    #[test]
    fn test_matches_search() {
        let patient = make_patient();
        assert!(patient.matches_search("lina"));
        assert!(patient.matches_search("0018"));
        assert!(!patient.matches_search("omar"));
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!("female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("".parse::<Gender>().is_err());
    }
}
