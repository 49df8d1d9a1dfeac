//! Golden tests for the bilingual value normalizer.
//!
//! Stored values must decode back to the exact form input that produced them,
//! whichever language the record was entered in.

use clinic_records_core::bilingual::{Domain, Locale, Normalizer, OTHER_KEY};
use clinic_records_core::models::{BilingualValue, CategoricalValue, Language};
use clinic_records_core::validation::{format_national_id, validate_national_id};
use proptest::prelude::*;

struct GoldenCase {
    id: &'static str,
    domain: Domain,
    input: &'static str,
    custom_text: Option<&'static str>,
    expected_en: &'static str,
    expected_ar: &'static str,
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "session-key",
            domain: Domain::SessionType,
            input: "CBT",
            custom_text: None,
            expected_en: "CBT",
            expected_ar: "العلاج المعرفي السلوكي",
        },
        GoldenCase {
            id: "session-arabic-input",
            domain: Domain::SessionType,
            input: "المتابعة",
            custom_text: None,
            expected_en: "Follow-up",
            expected_ar: "المتابعة",
        },
        GoldenCase {
            id: "session-free-text",
            domain: Domain::SessionType,
            input: "Hydrotherapy",
            custom_text: None,
            expected_en: "Hydrotherapy",
            expected_ar: "Hydrotherapy",
        },
        GoldenCase {
            id: "diagnosis-key",
            domain: Domain::Diagnosis,
            input: "ASD",
            custom_text: None,
            expected_en: "ASD",
            expected_ar: "طيف التوحد",
        },
        GoldenCase {
            id: "diagnosis-other-custom",
            domain: Domain::Diagnosis,
            input: OTHER_KEY,
            custom_text: Some("Dyspraxia"),
            expected_en: "Dyspraxia",
            expected_ar: "Dyspraxia",
        },
        GoldenCase {
            id: "diagnosis-other-empty",
            domain: Domain::Diagnosis,
            input: OTHER_KEY,
            custom_text: Some("   "),
            expected_en: "Other",
            expected_ar: "أخرى",
        },
        GoldenCase {
            id: "insurance-arabic",
            domain: Domain::Insurance,
            input: "كلاليت",
            custom_text: None,
            expected_en: "Clalit",
            expected_ar: "كلاليت",
        },
    ]
}

#[test]
fn test_golden_canonical_values() {
    let normalizer = Normalizer::new();

    for case in get_golden_cases() {
        let value = normalizer
            .to_canonical(case.domain, case.input, case.custom_text)
            .unwrap_or_else(|| panic!("{}: no canonical value", case.id));
        assert_eq!(value.en, case.expected_en, "{}: en", case.id);
        assert_eq!(value.ar, case.expected_ar, "{}: ar", case.id);
    }
}

#[test]
fn test_blank_input_stores_nothing() {
    let normalizer = Normalizer::new();
    for domain in Domain::ALL {
        assert!(normalizer.to_canonical(domain, "", None).is_none());
        assert!(normalizer.to_canonical(domain, "  ", Some("x")).is_none());
    }
}

#[test]
fn test_every_key_decomposes_to_itself() {
    let normalizer = Normalizer::new();

    for language in [Language::En, Language::Ar] {
        let locale = Locale::new(language);
        for domain in Domain::ALL {
            for key in domain.keys() {
                let stored: CategoricalValue =
                    normalizer.to_canonical(domain, key, None).unwrap().into();
                let decomposed = normalizer.decompose(domain, Some(&stored), &locale);
                assert_eq!(decomposed.key, key, "{} {}", domain, key);
                assert!(decomposed.custom_text.is_empty());
            }
        }
    }
}

#[test]
fn test_display_follows_language() {
    let normalizer = Normalizer::new();
    let stored: CategoricalValue = normalizer
        .to_canonical(Domain::SessionType, "Assessment", None)
        .unwrap()
        .into();

    assert_eq!(normalizer.to_display(Some(&stored), Language::En), "Assessment");
    assert_eq!(normalizer.to_display(Some(&stored), Language::Ar), "التقييم");
    assert_eq!(normalizer.to_display(None, Language::Ar), "");
}

#[test]
fn test_legacy_values() {
    let normalizer = Normalizer::new();
    let arabic = Locale::new(Language::Ar);

    // Legacy strings display unchanged in either language
    let legacy = CategoricalValue::Legacy("Speech delay".into());
    assert_eq!(normalizer.to_display(Some(&legacy), Language::Ar), "Speech delay");

    // ...and a legacy translation still resolves to its key
    let legacy = CategoricalValue::Legacy("العلاج الأسري".into());
    let decomposed = normalizer.decompose(Domain::SessionType, Some(&legacy), &arabic);
    assert_eq!(decomposed.key, "Family Therapy");

    let legacy = CategoricalValue::Legacy("Speech delay".into());
    let decomposed = normalizer.decompose(Domain::Diagnosis, Some(&legacy), &arabic);
    assert_eq!(decomposed.key, OTHER_KEY);
    assert_eq!(decomposed.custom_text, "Speech delay");
}

#[test]
fn test_json_shapes() {
    let bilingual: CategoricalValue =
        serde_json::from_str(r#"{"en":"CBT","ar":"العلاج المعرفي السلوكي"}"#).unwrap();
    assert_eq!(
        bilingual,
        CategoricalValue::Bilingual(BilingualValue::new("CBT", "العلاج المعرفي السلوكي"))
    );

    let legacy: CategoricalValue = serde_json::from_str(r#""CBT""#).unwrap();
    assert!(legacy.is_legacy());
}

fn check_digit(body: &[u32]) -> u32 {
    let sum: u32 = body
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let weighted = if i % 2 == 0 { d } else { d * 2 };
            if weighted > 9 {
                weighted - 9
            } else {
                weighted
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

fn any_domain() -> impl Strategy<Value = Domain> {
    prop_oneof![
        Just(Domain::Diagnosis),
        Just(Domain::Insurance),
        Just(Domain::SessionType),
    ]
}

proptest! {
    #[test]
    fn prop_canonical_survives_decompose(
        domain in any_domain(),
        input in "[A-Za-z][A-Za-z \\-]{0,24}",
        custom in proptest::option::of("[A-Za-z ]{0,12}"),
    ) {
        let normalizer = Normalizer::new();
        let locale = Locale::new(Language::En);

        let stored = normalizer.to_canonical(domain, &input, custom.as_deref()).unwrap();
        let stored_value: CategoricalValue = stored.clone().into();
        let decomposed = normalizer.decompose(domain, Some(&stored_value), &locale);
        let again = normalizer
            .to_canonical(domain, &decomposed.key, Some(&decomposed.custom_text))
            .unwrap();

        prop_assert_eq!(again, stored);
    }

    #[test]
    fn prop_display_never_mixes_languages(domain in any_domain(), index in 0usize..16) {
        let keys: Vec<&str> = domain.keys().collect();
        let key = keys[index % keys.len()];
        let pair = domain.translation(key).unwrap();
        let stored: CategoricalValue = pair.clone().into();
        let normalizer = Normalizer::new();

        prop_assert_eq!(normalizer.to_display(Some(&stored), Language::En), pair.en);
        prop_assert_eq!(normalizer.to_display(Some(&stored), Language::Ar), pair.ar);
    }

    #[test]
    fn prop_checksum_digit_is_accepted(body in proptest::collection::vec(0u32..10, 8)) {
        let check = check_digit(&body);
        let id: String = body
            .iter()
            .chain(std::iter::once(&check))
            .map(|d| char::from_digit(*d, 10).unwrap())
            .collect();

        prop_assert!(validate_national_id(&id));

        let wrong = (check + 1) % 10;
        let tampered = format!("{}{}", &id[..8], wrong);
        prop_assert!(!validate_national_id(&tampered));
    }

    #[test]
    fn prop_format_pads_to_nine(digits in "[0-9]{1,9}") {
        let formatted = format_national_id(&digits);
        prop_assert_eq!(formatted.len(), 9);
        prop_assert!(formatted.ends_with(&digits));
    }
}
