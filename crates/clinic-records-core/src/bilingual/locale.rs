//! Translation provider used for reverse lookups and user-facing messages.

use std::collections::HashMap;

use crate::models::Language;

/// Supplies UI translations for the active language.
///
/// The normalizer only consults this for reverse lookups; stored values never
/// depend on it.
pub trait Translator {
    /// Translation for a dotted key such as `sessionTypes.CBT`, or `fallback`.
    fn translate(&self, key: &str, fallback: &str) -> String;

    /// Active language tag.
    fn language(&self) -> Language;
}

/// Built-in English/Arabic string tables with optional runtime overrides.
#[derive(Debug, Clone, Default)]
pub struct Locale {
    language: Language,
    overrides: HashMap<String, String>,
}

impl Locale {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            overrides: HashMap::new(),
        }
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Replace the translation of `key` for the active language.
    pub fn add_override(&mut self, key: &str, text: &str) {
        self.overrides.insert(key.to_string(), text.to_string());
    }

    fn table(&self) -> &'static [(&'static str, &'static str)] {
        match self.language {
            Language::En => EN,
            Language::Ar => AR,
        }
    }
}

impl Translator for Locale {
    fn translate(&self, key: &str, fallback: &str) -> String {
        if let Some(text) = self.overrides.get(key) {
            return text.clone();
        }
        self.table()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, text)| text.to_string())
            .unwrap_or_else(|| fallback.to_string())
    }

    fn language(&self) -> Language {
        self.language
    }
}

const EN: &[(&str, &str)] = &[
    ("sessionTypes.CBT", "CBT"),
    ("sessionTypes.DBT", "DBT"),
    ("sessionTypes.Psychodynamic Therapy", "Psychodynamic Therapy"),
    ("sessionTypes.Family Therapy", "Family Therapy"),
    ("sessionTypes.Group Therapy", "Group Therapy"),
    ("sessionTypes.Individual Therapy", "Individual Therapy"),
    ("sessionTypes.Assessment", "Assessment"),
    ("sessionTypes.Follow-up", "Follow-up"),
    ("sessionTypes.Consultation", "Consultation"),
    ("diagnosisTypes.Cerebral palsy", "Cerebral palsy"),
    (
        "diagnosisTypes.Developmental Delay Milestone",
        "Developmental Delay Milestone",
    ),
    ("diagnosisTypes.ASD", "ASD"),
    ("diagnosisTypes.ADHD", "ADHD"),
    ("diagnosisTypes.Syndromes", "Syndromes"),
    ("diagnosisTypes.Other", "Other"),
    ("insuranceTypes.Private", "Private"),
    ("insuranceTypes.Maccabi", "Maccabi"),
    ("insuranceTypes.Clalit", "Clalit"),
    ("insuranceTypes.Meuhedet", "Meuhedet"),
    ("insuranceTypes.Leumit", "Leumit"),
    ("insuranceTypes.Palestinian Authority", "Palestinian Authority"),
    ("patient.male", "Male"),
    ("patient.female", "Female"),
    ("patient.fullNameRequired", "Full name is required"),
    ("patient.idRequired", "ID is required"),
    ("patient.idMustBe9Digits", "ID must be 9 digits"),
    ("patient.invalidIdNumber", "Invalid ID number"),
    ("patient.birthDateRequired", "Birth date is required"),
    ("patient.invalidDate", "Invalid date"),
    ("patient.genderRequired", "Gender is required"),
    ("patient.diagnosisOtherRequired", "Please specify the other diagnosis"),
    ("patient.therapyNameRequired", "Therapy name is required"),
    (
        "patient.totalSessionsMustBeAtLeast1",
        "Total sessions planned must be at least 1",
    ),
    ("patient.sessionTypeRequired", "Session type is required"),
    ("patient.sessionDateRequired", "Session date is required"),
];

const AR: &[(&str, &str)] = &[
    ("sessionTypes.CBT", "العلاج المعرفي السلوكي"),
    ("sessionTypes.DBT", "العلاج السلوكي الجدلي"),
    ("sessionTypes.Psychodynamic Therapy", "العلاج النفسي الديناميكي"),
    ("sessionTypes.Family Therapy", "العلاج الأسري"),
    ("sessionTypes.Group Therapy", "العلاج الجماعي"),
    ("sessionTypes.Individual Therapy", "العلاج الفردي"),
    ("sessionTypes.Assessment", "التقييم"),
    ("sessionTypes.Follow-up", "المتابعة"),
    ("sessionTypes.Consultation", "استشارة"),
    ("diagnosisTypes.Cerebral palsy", "شلل دماغي"),
    ("diagnosisTypes.Developmental Delay Milestone", "تأخر النمو والتطور"),
    ("diagnosisTypes.ASD", "طيف التوحد"),
    ("diagnosisTypes.ADHD", "اضطراب فرط الحركة ونقص الانتباه"),
    ("diagnosisTypes.Syndromes", "متلازمات"),
    ("diagnosisTypes.Other", "أخرى"),
    ("insuranceTypes.Private", "خاص"),
    ("insuranceTypes.Maccabi", "مكابي"),
    ("insuranceTypes.Clalit", "كلاليت"),
    ("insuranceTypes.Meuhedet", "مئوحيدت"),
    // UI spelling differs from the stored pair; reverse lookup accepts both.
    ("insuranceTypes.Leumit", "ليئوميت"),
    ("insuranceTypes.Palestinian Authority", "سلطة فلسطينية"),
    ("patient.male", "ذكر"),
    ("patient.female", "أنثى"),
    ("patient.fullNameRequired", "الاسم الكامل مطلوب"),
    ("patient.idRequired", "رقم الهوية مطلوب"),
    ("patient.idMustBe9Digits", "رقم الهوية يجب أن يكون 9 أرقام"),
    ("patient.invalidIdNumber", "رقم الهوية غير صحيح"),
    ("patient.birthDateRequired", "تاريخ الميلاد مطلوب"),
    ("patient.invalidDate", "تاريخ غير صالح"),
    ("patient.genderRequired", "الجنس مطلوب"),
    ("patient.diagnosisOtherRequired", "يرجى تحديد التشخيص الآخر"),
    ("patient.therapyNameRequired", "اسم المعالج مطلوب"),
    (
        "patient.totalSessionsMustBeAtLeast1",
        "إجمالي الجلسات المخططة يجب أن يكون 1 على الأقل",
    ),
    ("patient.sessionTypeRequired", "نوع الجلسة مطلوب"),
    ("patient.sessionDateRequired", "تاريخ الجلسة مطلوب"),
];
