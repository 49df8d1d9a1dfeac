//! Predefined categorical keys and their fixed translations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::BilingualValue;

/// Sentinel key selecting a free-text diagnosis.
pub const OTHER_KEY: &str = "Other";

/// Categorical domains handled by the normalizer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Diagnosis,
    Insurance,
    SessionType,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Diagnosis, Domain::Insurance, Domain::SessionType];

    /// Translation-table namespace for this domain's labels.
    pub fn namespace(&self) -> &'static str {
        match self {
            Domain::Diagnosis => "diagnosisTypes",
            Domain::Insurance => "insuranceTypes",
            Domain::SessionType => "sessionTypes",
        }
    }

    /// Ordered predefined entries: (key, english, arabic).
    pub fn entries(&self) -> &'static [(&'static str, &'static str, &'static str)] {
        match self {
            Domain::Diagnosis => DIAGNOSIS_TYPES,
            Domain::Insurance => INSURANCE_TYPES,
            Domain::SessionType => SESSION_TYPES,
        }
    }

    /// Whether free text is selected through the "Other" sentinel.
    pub fn has_other_sentinel(&self) -> bool {
        matches!(self, Domain::Diagnosis)
    }

    /// Predefined keys in display order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        self.entries().iter().map(|(key, _, _)| *key)
    }

    /// Fixed translation pair for `key`, if it is predefined.
    pub fn translation(&self, key: &str) -> Option<BilingualValue> {
        self.entries()
            .iter()
            .find(|(k, _, _)| *k == key)
            .map(|(_, en, ar)| BilingualValue::new(*en, *ar))
    }

    /// Predefined key whose literal, English or Arabic form equals `text`.
    pub fn key_for_text(&self, text: &str) -> Option<&'static str> {
        self.entries()
            .iter()
            .find(|(key, en, ar)| *key == text || *en == text || *ar == text)
            .map(|(key, _, _)| *key)
    }

    /// Predefined key whose fixed pair equals `value` exactly.
    pub fn key_for_pair(&self, value: &BilingualValue) -> Option<&'static str> {
        self.entries()
            .iter()
            .find(|(_, en, ar)| value.en == *en && value.ar == *ar)
            .map(|(key, _, _)| *key)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Domain::Diagnosis => "diagnosis",
            Domain::Insurance => "insurance",
            Domain::SessionType => "session_type",
        })
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diagnosis" => Ok(Domain::Diagnosis),
            "insurance" => Ok(Domain::Insurance),
            "session_type" => Ok(Domain::SessionType),
            other => Err(format!("Unknown domain: {}", other)),
        }
    }
}

const DIAGNOSIS_TYPES: &[(&str, &str, &str)] = &[
    ("Cerebral palsy", "Cerebral palsy", "شلل دماغي"),
    (
        "Developmental Delay Milestone",
        "Developmental Delay Milestone",
        "تأخر النمو والتطور",
    ),
    ("ASD", "ASD", "طيف التوحد"),
    ("ADHD", "ADHD", "اضطراب فرط الحركة ونقص الانتباه"),
    ("Syndromes", "Syndromes", "متلازمات"),
    (OTHER_KEY, "Other", "أخرى"),
];

const INSURANCE_TYPES: &[(&str, &str, &str)] = &[
    ("Private", "Private", "خاص"),
    ("Maccabi", "Maccabi", "مكابي"),
    ("Clalit", "Clalit", "كلاليت"),
    ("Meuhedet", "Meuhedet", "مئوحيدت"),
    ("Leumit", "Leumit", "ليؤوميت"),
    (
        "Palestinian Authority",
        "Palestinian Authority",
        "سلطة فلسطينية",
    ),
];

const SESSION_TYPES: &[(&str, &str, &str)] = &[
    ("CBT", "CBT", "العلاج المعرفي السلوكي"),
    ("DBT", "DBT", "العلاج السلوكي الجدلي"),
    (
        "Psychodynamic Therapy",
        "Psychodynamic Therapy",
        "العلاج النفسي الديناميكي",
    ),
    ("Family Therapy", "Family Therapy", "العلاج الأسري"),
    ("Group Therapy", "Group Therapy", "العلاج الجماعي"),
    ("Individual Therapy", "Individual Therapy", "العلاج الفردي"),
    ("Assessment", "Assessment", "التقييم"),
    ("Follow-up", "Follow-up", "المتابعة"),
    ("Consultation", "Consultation", "استشارة"),
];
