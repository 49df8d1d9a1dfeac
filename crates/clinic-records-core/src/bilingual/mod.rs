//! Bilingual value normalizer.
//!
//! Handles:
//! - Canonicalization of form input (predefined key or free text) into `{en, ar}` pairs
//! - Locale-aware display with English fallback and legacy string passthrough
//! - Reverse lookup from displayed text back to the predefined key
//! - Decomposition of stored values into `(key, custom text)` for edit forms

mod catalog;
mod locale;

pub use catalog::*;
pub use locale::*;

use serde::{Deserialize, Serialize};

use crate::models::{BilingualValue, CategoricalValue, Language};

/// A stored value split back into the form's select key and free-text box.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Decomposed {
    /// Predefined key, `"Other"` for diagnosis free text, or the free text
    /// itself for domains without a sentinel. Empty when nothing is stored.
    pub key: String,
    /// Free text accompanying the `"Other"` sentinel.
    pub custom_text: String,
}

impl Decomposed {
    fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            custom_text: String::new(),
        }
    }

    fn other(custom_text: impl Into<String>) -> Self {
        Self {
            key: OTHER_KEY.to_string(),
            custom_text: custom_text.into(),
        }
    }
}

/// A selectable option with its label in the active language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryOption {
    pub key: String,
    pub label: String,
}

/// Converts between form input, stored bilingual values and display text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Canonical stored value for a form input.
    ///
    /// Predefined keys (or their fixed English/Arabic text) map to the fixed
    /// pair. For diagnosis, the `"Other"` sentinel with non-empty
    /// `custom_text` stores the custom text in both slots. Anything else is
    /// free text stored identically in both slots.
    pub fn to_canonical(
        &self,
        domain: Domain,
        input: &str,
        custom_text: Option<&str>,
    ) -> Option<BilingualValue> {
        if input.trim().is_empty() {
            return None;
        }

        match domain.key_for_text(input) {
            Some(OTHER_KEY) if domain.has_other_sentinel() => {
                match custom_text.filter(|text| !text.trim().is_empty()) {
                    Some(text) => Some(BilingualValue::same(text)),
                    None => domain.translation(OTHER_KEY),
                }
            }
            Some(key) => domain.translation(key),
            None => Some(BilingualValue::same(input)),
        }
    }

    /// Display text for a stored value in `language`.
    pub fn to_display(&self, value: Option<&CategoricalValue>, language: Language) -> String {
        value
            .map(|v| v.display(language).to_string())
            .unwrap_or_default()
    }

    /// Predefined key for displayed text.
    ///
    /// Accepts the literal key, its fixed English or Arabic translation, or the
    /// label the active UI translation renders for it. `None` means free text.
    pub fn key_from_value(
        &self,
        domain: Domain,
        raw: &str,
        translator: &dyn Translator,
    ) -> Option<&'static str> {
        if raw.is_empty() {
            return None;
        }
        domain.entries().iter().find_map(|(key, en, ar)| {
            let current = translator.translate(&format!("{}.{}", domain.namespace(), key), key);
            if raw == *key || raw == *en || raw == *ar || raw == current {
                Some(*key)
            } else {
                None
            }
        })
    }

    /// Split a stored value into select key and custom text.
    ///
    /// Left inverse of [`Normalizer::to_canonical`]: feeding the result back
    /// through `to_canonical` reproduces the stored pair.
    pub fn decompose(
        &self,
        domain: Domain,
        stored: Option<&CategoricalValue>,
        translator: &dyn Translator,
    ) -> Decomposed {
        match stored {
            None => Decomposed::default(),
            Some(CategoricalValue::Bilingual(value)) => {
                if let Some(key) = domain.key_for_pair(value) {
                    return Decomposed::key(key);
                }
                let text = if value.en.is_empty() { &value.ar } else { &value.en };
                if domain.has_other_sentinel() {
                    Decomposed::other(text.clone())
                } else {
                    Decomposed::key(text.clone())
                }
            }
            Some(CategoricalValue::Legacy(text)) => {
                if text.is_empty() {
                    return Decomposed::default();
                }
                match self.key_from_value(domain, text, translator) {
                    // A bare legacy "Other" has no custom text to pair with the
                    // sentinel, so the stored wording becomes the custom text
                    Some(OTHER_KEY) if domain.has_other_sentinel() => {
                        Decomposed::other(text.clone())
                    }
                    Some(key) => Decomposed::key(key),
                    None if domain.has_other_sentinel() => Decomposed::other(text.clone()),
                    None => Decomposed::key(text.clone()),
                }
            }
        }
    }

    /// Predefined options for `domain`, labelled in the translator's language.
    pub fn options(&self, domain: Domain, translator: &dyn Translator) -> Vec<CategoryOption> {
        domain
            .keys()
            .map(|key| CategoryOption {
                key: key.to_string(),
                label: translator.translate(&format!("{}.{}", domain.namespace(), key), key),
            })
            .collect()
    }
}
