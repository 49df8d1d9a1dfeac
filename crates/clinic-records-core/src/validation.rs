//! National ID checks and patient/session form validation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::bilingual::{Domain, Normalizer, Translator, OTHER_KEY};
use crate::models::{
    CategoricalValue, Gender, NewPatient, NewSession, Patient, PatientUpdate, Session,
};

const NATIONAL_ID_LEN: usize = 9;

/// Strip non-digits and keep at most nine digits. Used while typing.
pub fn clean_national_id(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_digit)
        .take(NATIONAL_ID_LEN)
        .collect()
}

/// Strip non-digits and left-pad with zeros to nine digits.
///
/// Longer inputs are returned unpadded so length validation can reject them.
pub fn format_national_id(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return digits;
    }
    format!("{:0>width$}", digits, width = NATIONAL_ID_LEN)
}

/// Nine digits whose alternating-weight checksum is divisible by ten.
///
/// Digits at even positions count as-is; digits at odd positions are doubled
/// and, above nine, reduced to their digit sum.
pub fn validate_national_id(raw: &str) -> bool {
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != NATIONAL_ID_LEN {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 0 {
                d
            } else {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled / 10 + doubled % 10
                } else {
                    doubled
                }
            }
        })
        .sum();
    sum % 10 == 0
}

/// A field-level validation failure.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Translation key, e.g. `patient.idRequired`
    pub message_key: &'static str,
    /// English text used when no translation is available
    pub default_message: &'static str,
}

impl ValidationIssue {
    const fn new(message_key: &'static str, default_message: &'static str) -> Self {
        Self {
            message_key,
            default_message,
        }
    }

    /// Message in the translator's language.
    pub fn message(&self, translator: &dyn Translator) -> String {
        translator.translate(self.message_key, self.default_message)
    }
}

const FULL_NAME_REQUIRED: ValidationIssue =
    ValidationIssue::new("patient.fullNameRequired", "Full name is required");
const ID_REQUIRED: ValidationIssue = ValidationIssue::new("patient.idRequired", "ID is required");
const ID_LENGTH: ValidationIssue =
    ValidationIssue::new("patient.idMustBe9Digits", "ID must be 9 digits");
const ID_CHECKSUM: ValidationIssue =
    ValidationIssue::new("patient.invalidIdNumber", "Invalid ID number");
const BIRTH_DATE_REQUIRED: ValidationIssue =
    ValidationIssue::new("patient.birthDateRequired", "Birth date is required");
const INVALID_DATE: ValidationIssue = ValidationIssue::new("patient.invalidDate", "Invalid date");
const GENDER_REQUIRED: ValidationIssue =
    ValidationIssue::new("patient.genderRequired", "Gender is required");
const DIAGNOSIS_OTHER_REQUIRED: ValidationIssue = ValidationIssue::new(
    "patient.diagnosisOtherRequired",
    "Please specify the other diagnosis",
);
const THERAPY_NAME_REQUIRED: ValidationIssue =
    ValidationIssue::new("patient.therapyNameRequired", "Therapy name is required");
const TOTAL_SESSIONS_MIN: ValidationIssue = ValidationIssue::new(
    "patient.totalSessionsMustBeAtLeast1",
    "Total sessions planned must be at least 1",
);
const SESSION_TYPE_REQUIRED: ValidationIssue =
    ValidationIssue::new("patient.sessionTypeRequired", "Session type is required");
const SESSION_DATE_REQUIRED: ValidationIssue =
    ValidationIssue::new("patient.sessionDateRequired", "Session date is required");

/// Field name to issue, in field-name order. Never fatal; shown inline.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationErrors {
    issues: BTreeMap<&'static str, ValidationIssue>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn get(&self, field: &str) -> Option<&ValidationIssue> {
        self.issues.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ValidationIssue)> {
        self.issues.iter().map(|(field, issue)| (*field, issue))
    }

    fn add(&mut self, field: &'static str, issue: ValidationIssue) {
        self.issues.entry(field).or_insert(issue);
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .issues
            .iter()
            .map(|(field, issue)| format!("{}: {}", field, issue.default_message))
            .collect();
        write!(f, "Validation failed ({})", fields.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Patient form input as typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientForm {
    pub full_name: String,
    pub national_id: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
    pub gender: String,
    /// Predefined key, its translation, or free text
    pub diagnosis: String,
    /// Free text when `diagnosis` is the "Other" sentinel
    pub diagnosis_other: String,
    pub insurance: String,
    pub therapy_name: String,
    pub total_sessions_planned: String,
    /// First session, on the create form only
    pub first_session: Option<SessionForm>,
}

impl PatientForm {
    /// Pre-fill an edit form from a stored patient.
    pub fn from_patient(
        patient: &Patient,
        normalizer: &Normalizer,
        translator: &dyn Translator,
    ) -> Self {
        let diagnosis =
            normalizer.decompose(Domain::Diagnosis, patient.diagnosis.as_ref(), translator);
        let insurance =
            normalizer.decompose(Domain::Insurance, patient.insurance.as_ref(), translator);
        Self {
            full_name: patient.full_name.clone(),
            national_id: patient.national_id.clone(),
            birth_date: patient.birth_date.format("%Y-%m-%d").to_string(),
            gender: patient.gender.to_string(),
            diagnosis: diagnosis.key,
            diagnosis_other: diagnosis.custom_text,
            insurance: insurance.key,
            therapy_name: patient.therapy_name.clone(),
            total_sessions_planned: patient.total_sessions_planned.to_string(),
            first_session: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.full_name.trim().is_empty() {
            errors.add("fullName", FULL_NAME_REQUIRED);
        }

        if self.national_id.trim().is_empty() {
            errors.add("nationalId", ID_REQUIRED);
        } else {
            let formatted = format_national_id(&self.national_id);
            if formatted.len() != NATIONAL_ID_LEN {
                errors.add("nationalId", ID_LENGTH);
            } else if !validate_national_id(&formatted) {
                errors.add("nationalId", ID_CHECKSUM);
            }
        }

        if self.birth_date.trim().is_empty() {
            errors.add("birthDate", BIRTH_DATE_REQUIRED);
        } else if parse_date(&self.birth_date).is_none() {
            errors.add("birthDate", INVALID_DATE);
        }

        if self.gender.parse::<Gender>().is_err() {
            errors.add("gender", GENDER_REQUIRED);
        }

        if Domain::Diagnosis.key_for_text(self.diagnosis.trim()) == Some(OTHER_KEY)
            && self.diagnosis_other.trim().is_empty()
        {
            errors.add("diagnosis", DIAGNOSIS_OTHER_REQUIRED);
        }

        if self.therapy_name.trim().is_empty() {
            errors.add("therapyName", THERAPY_NAME_REQUIRED);
        }

        match self.total_sessions_planned.trim().parse::<u32>() {
            Ok(n) if n >= 1 => {}
            _ => errors.add("totalSessionsPlanned", TOTAL_SESSIONS_MIN),
        }

        if let Some(session) = &self.first_session {
            if let Err(session_errors) = session.validate() {
                for (field, issue) in session_errors.issues {
                    errors.add(field, issue);
                }
            }
        }

        errors.into_result()
    }

    /// Validate and produce the canonical patient (and first session).
    pub fn into_new_patient(
        self,
        normalizer: &Normalizer,
    ) -> Result<(NewPatient, Option<NewSession>), ValidationErrors> {
        self.validate()?;
        let fields = self.canonical_fields(normalizer)?;

        let first_session = match self.first_session {
            Some(session) => Some(session.into_new_session(normalizer)?),
            None => None,
        };

        Ok((
            NewPatient {
                full_name: fields.full_name,
                national_id: fields.national_id,
                birth_date: fields.birth_date,
                gender: fields.gender,
                diagnosis: fields.diagnosis,
                insurance: fields.insurance,
                therapy_name: fields.therapy_name,
                total_sessions_planned: fields.total_sessions_planned,
            },
            first_session,
        ))
    }

    /// Validate and produce a full update for an existing patient.
    pub fn into_patient_update(
        self,
        normalizer: &Normalizer,
    ) -> Result<PatientUpdate, ValidationErrors> {
        self.validate()?;
        let fields = self.canonical_fields(normalizer)?;
        Ok(PatientUpdate {
            full_name: Some(fields.full_name),
            national_id: Some(fields.national_id),
            birth_date: Some(fields.birth_date),
            gender: Some(fields.gender),
            diagnosis: Some(fields.diagnosis),
            insurance: Some(fields.insurance),
            therapy_name: Some(fields.therapy_name),
            total_sessions_planned: Some(fields.total_sessions_planned),
        })
    }

    /// Trimmed, formatted and normalized fields of an already validated form.
    fn canonical_fields(&self, normalizer: &Normalizer) -> Result<CanonicalPatient, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let birth_date = parse_date(&self.birth_date);
        let gender = self.gender.parse::<Gender>().ok();
        let total = self.total_sessions_planned.trim().parse::<u32>().ok();

        match (birth_date, gender, total) {
            (Some(birth_date), Some(gender), Some(total_sessions_planned)) => {
                Ok(CanonicalPatient {
                    full_name: self.full_name.trim().to_string(),
                    national_id: format_national_id(&self.national_id),
                    birth_date,
                    gender,
                    diagnosis: normalizer
                        .to_canonical(
                            Domain::Diagnosis,
                            self.diagnosis.trim(),
                            Some(self.diagnosis_other.trim()),
                        )
                        .map(CategoricalValue::from),
                    insurance: normalizer
                        .to_canonical(Domain::Insurance, self.insurance.trim(), None)
                        .map(CategoricalValue::from),
                    therapy_name: self.therapy_name.trim().to_string(),
                    total_sessions_planned,
                })
            }
            _ => {
                errors.add("birthDate", INVALID_DATE);
                Err(errors)
            }
        }
    }
}

struct CanonicalPatient {
    full_name: String,
    national_id: String,
    birth_date: NaiveDate,
    gender: Gender,
    diagnosis: Option<CategoricalValue>,
    insurance: Option<CategoricalValue>,
    therapy_name: String,
    total_sessions_planned: u32,
}

/// Session form input as typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionForm {
    /// Predefined key, its translation, or free text
    pub session_type: String,
    /// `YYYY-MM-DD`
    pub session_date: String,
    pub notes: String,
}

impl SessionForm {
    /// Pre-fill an edit form from a stored session.
    pub fn from_session(
        session: &Session,
        normalizer: &Normalizer,
        translator: &dyn Translator,
    ) -> Self {
        let session_type =
            normalizer.decompose(Domain::SessionType, Some(&session.session_type), translator);
        Self {
            session_type: session_type.key,
            session_date: session.session_date.format("%Y-%m-%d").to_string(),
            notes: session.notes.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.session_type.trim().is_empty() {
            errors.add("sessionType", SESSION_TYPE_REQUIRED);
        }

        if self.session_date.trim().is_empty() {
            errors.add("sessionDate", SESSION_DATE_REQUIRED);
        } else if parse_date(&self.session_date).is_none() {
            errors.add("sessionDate", INVALID_DATE);
        }

        errors.into_result()
    }

    /// Validate and produce the canonical session fields.
    pub fn into_new_session(self, normalizer: &Normalizer) -> Result<NewSession, ValidationErrors> {
        self.validate()?;

        let mut errors = ValidationErrors::default();
        let session_type = normalizer.to_canonical(Domain::SessionType, self.session_type.trim(), None);
        let session_date = parse_date(&self.session_date);

        match (session_type, session_date) {
            (Some(session_type), Some(session_date)) => {
                let notes = self.notes.trim();
                Ok(NewSession {
                    session_type: session_type.into(),
                    session_date,
                    notes: (!notes.is_empty()).then(|| notes.to_string()),
                })
            }
            (None, _) => {
                errors.add("sessionType", SESSION_TYPE_REQUIRED);
                Err(errors)
            }
            (_, None) => {
                errors.add("sessionDate", INVALID_DATE);
                Err(errors)
            }
        }
    }
}
