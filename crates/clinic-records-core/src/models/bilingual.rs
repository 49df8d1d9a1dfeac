//! Bilingual categorical values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported display languages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    /// Language tag as used in stored objects and translation tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    /// Whether text in this language is laid out right-to-left.
    pub fn is_rtl(&self) -> bool {
        matches!(self, Language::Ar)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Language::En),
            "ar" => Ok(Language::Ar),
            other => Err(format!("Unsupported language: {}", other)),
        }
    }
}

/// A categorical value stored in both supported languages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BilingualValue {
    pub en: String,
    pub ar: String,
}

impl BilingualValue {
    pub fn new(en: impl Into<String>, ar: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            ar: ar.into(),
        }
    }

    /// Free text of unknown origin language, stored identically in both slots.
    pub fn same(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            en: text.clone(),
            ar: text,
        }
    }

    /// Text for `language`, falling back to English when that slot is empty.
    pub fn get(&self, language: Language) -> &str {
        let text = match language {
            Language::En => &self.en,
            Language::Ar => &self.ar,
        };
        if text.is_empty() {
            &self.en
        } else {
            text
        }
    }
}

/// A stored categorical field.
///
/// Records written before bilingual support hold a plain string; newer records
/// hold an `{en, ar}` object. Both shapes decode from the same JSON column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum CategoricalValue {
    Bilingual(BilingualValue),
    Legacy(String),
}

impl CategoricalValue {
    /// Display text in `language`. Legacy strings are returned unchanged.
    pub fn display(&self, language: Language) -> &str {
        match self {
            CategoricalValue::Bilingual(value) => value.get(language),
            CategoricalValue::Legacy(text) => text,
        }
    }

    /// Upgrade to the bilingual shape, copying legacy text into both slots.
    pub fn to_bilingual(&self) -> BilingualValue {
        match self {
            CategoricalValue::Bilingual(value) => value.clone(),
            CategoricalValue::Legacy(text) => BilingualValue::same(text.clone()),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, CategoricalValue::Legacy(_))
    }
}

impl From<BilingualValue> for CategoricalValue {
    fn from(value: BilingualValue) -> Self {
        CategoricalValue::Bilingual(value)
    }
}
