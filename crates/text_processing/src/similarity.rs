//! Concept-weighted Jaccard similarity over normalized word sets.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::Deserialize;

/// Dictionary tables backing normalization and concept matching.
#[derive(Debug, Deserialize)]
struct Dictionaries {
    stopwords: HashSet<String>,
    number_map: HashMap<String, String>,
    stem_map: HashMap<String, String>,
    key_concepts: HashSet<String>,
}

static DICTIONARIES: Lazy<Dictionaries> = Lazy::new(|| {
    serde_yaml::from_str(include_str!("../data/similarity_pl.yaml"))
        .expect("embedded similarity dictionaries are well-formed")
});

/// Short tokens that survive the length filter.
const SHORT_ALLOWLIST: [&str; 3] = ["ui", "ux", "ai"];

/// Normalize text for similarity comparison.
///
/// Lowercases, strips punctuation (digits survive), removes stopwords, maps
/// Polish number words to digits, applies the stem map, and drops tokens
/// shorter than 3 characters except digits and `ui`/`ux`/`ai`.
pub fn normalize_for_similarity(text: &str) -> HashSet<String> {
    let dict = &*DICTIONARIES;
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut result = HashSet::new();
    for word in cleaned.split_whitespace() {
        // Number words normalize first so the digits survive the length filter.
        if let Some(digit) = dict.number_map.get(word) {
            result.insert(digit.clone());
            continue;
        }

        let is_digit = !word.is_empty() && word.chars().all(|c| c.is_ascii_digit());
        if word.chars().count() <= 2 && !is_digit && !SHORT_ALLOWLIST.contains(&word) {
            continue;
        }
        if dict.stopwords.contains(word) {
            continue;
        }

        match dict.stem_map.get(word) {
            Some(stem) => result.insert(stem.clone()),
            None => result.insert(word.to_string()),
        };
    }

    result
}

/// Concept-based similarity between two texts, in [0, 1].
///
/// Texts sharing two or more key concepts score
/// `0.6 * concept_overlap + 0.4 * jaccard`; everything else falls back to
/// plain Jaccard over the normalized word sets.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let words_a = normalize_for_similarity(a);
    let words_b = normalize_for_similarity(b);

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let dict = &*DICTIONARIES;
    let concepts_a: HashSet<&String> = words_a.iter().filter(|w| dict.key_concepts.contains(*w)).collect();
    let concepts_b: HashSet<&String> = words_b.iter().filter(|w| dict.key_concepts.contains(*w)).collect();
    let shared = concepts_a.intersection(&concepts_b).count();

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    };

    if shared >= 2 {
        let denom = concepts_a.len().max(concepts_b.len()).max(1);
        let concept_score = shared as f64 / denom as f64;
        return 0.6 * concept_score + 0.4 * jaccard;
    }

    jaccard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_stopwords_and_short_words() {
        let words = normalize_for_similarity("to jest the button w oknie");
        assert!(words.contains("button"));
        assert!(words.contains("oknie"));
        assert!(!words.contains("to"));
        assert!(!words.contains("the"));
        assert!(!words.contains("w"));
    }

    #[test]
    fn test_normalize_keeps_ui_and_digits() {
        let words = normalize_for_similarity("UI ma 2 bugi");
        assert!(words.contains("ui"));
        assert!(words.contains("2"));
    }

    #[test]
    fn test_normalize_maps_polish_numbers() {
        let words = normalize_for_similarity("dwie pozycje na liście");
        assert!(words.contains("2"));
        assert!(words.contains("pozycja"));
        assert!(words.contains("lista"));
    }

    #[test]
    fn test_normalize_stems_polish_forms() {
        let a = normalize_for_similarity("skrócić listę pacjentów");
        let b = normalize_for_similarity("krótsza lista pacjenta");
        assert!(a.contains("krotki") && b.contains("krotki"));
        assert!(a.contains("lista") && b.contains("lista"));
        assert!(a.contains("pacjent") && b.contains("pacjent"));
    }

    #[test]
    fn test_similarity_bounds() {
        let pairs = [
            ("lista pacjentów jest za długa", "skrócić listę pacjentów"),
            ("przycisk nie działa", "layout jest brzydki"),
            ("", "cokolwiek"),
        ];
        for (a, b) in pairs {
            let s = text_similarity(a, b);
            assert!((0.0..=1.0).contains(&s), "similarity {s} out of bounds");
        }
    }

    #[test]
    fn test_similarity_identity_and_symmetry() {
        let text = "przycisk w formularzu nie reaguje";
        assert!((text_similarity(text, text) - 1.0).abs() < 1e-9);

        let other = "formularz ma zepsuty przycisk";
        let ab = text_similarity(text, other);
        let ba = text_similarity(other, text);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_concept_boost_for_same_topic() {
        // Same topic phrased differently: list of patients, shortened.
        let a = "lista pacjentów powinna być krótsza";
        let b = "skrócić listę pacjentów do pięciu pozycji";
        let sim = text_similarity(a, b);
        assert!(sim >= 0.4, "expected concept boost, got {sim}");
    }

    #[test]
    fn test_unrelated_texts_score_low() {
        let a = "przycisk zapisu nie działa";
        let b = "wykres wydajności ładuje się wolno";
        assert!(text_similarity(a, b) < 0.2);
    }

    #[test]
    fn test_empty_input_scores_zero() {
        assert_eq!(text_similarity("", ""), 0.0);
        assert_eq!(text_similarity("oraz ale", "przycisk"), 0.0);
    }
}
