//! Language filtering of the question sequence.
//!
//! Bilingual templates carry both renditions of each question in one item
//! list, with the alternate-language rendition marked in the question text.
//! The active sequence is derived from the full list and the selected
//! language; sections and the language selector itself survive either
//! selection. Filtering is pure and deterministic — it is re-run from the
//! full template on every language change.

use crate::template::{FormTemplate, QuestionVariant};

/// Language selection driving the filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Language {
    /// The template's base language
    #[default]
    Primary,
    /// The marked alternate-language rendition
    Alternate,
}

/// Phrase identifying the language-choice question.
const LANGUAGE_SELECTOR_PHRASE: &str = "language preference";

/// Markers flagging an item as the alternate-language rendition.
const ALTERNATE_MARKERS: [&str; 2] = ["español", "(spanish)"];

/// Returns `true` if the question text signals the language selector.
pub fn is_language_selector(question_text: &str) -> bool {
    question_text.to_lowercase().contains(LANGUAGE_SELECTOR_PHRASE)
}

/// Returns `true` if the question text carries an alternate-language marker.
pub fn has_alternate_marker(question_text: &str) -> bool {
    let lowered = question_text.to_lowercase();
    ALTERNATE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Derives the active question sequence for a language selection.
///
/// Returns indices into `template.items`. Sections and the language
/// selector are always kept; every other item is kept when its marker
/// state matches the selection. A final stable pass moves demographics
/// items to the front, preserving relative order on both sides of the
/// split.
pub fn filter_items(template: &FormTemplate, language: Language) -> Vec<usize> {
    let kept = template.items.iter().enumerate().filter(|(_, item)| {
        if item.variant() == QuestionVariant::Section || is_language_selector(&item.question_text) {
            return true;
        }
        match language {
            Language::Primary => !has_alternate_marker(&item.question_text),
            Language::Alternate => has_alternate_marker(&item.question_text),
        }
    });

    // Single stable pass: demographics first, everything else after.
    let (mut demographics, rest): (Vec<usize>, Vec<usize>) = kept
        .map(|(index, _)| index)
        .partition(|&index| template.items[index].variant() == QuestionVariant::Demographics);
    demographics.extend(rest);
    demographics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_template;
    use crate::template::RawTemplate;
    use serde_json::json;

    fn template() -> FormTemplate {
        let raw = RawTemplate {
            id: Some("tmpl-1".to_string()),
            items: Some(json!([
                {"id": "s1", "questionText": "Welcome (section)"},
                {"id": "lang", "questionText": "What is your language preference?"},
                {"id": "q-en", "variant": "openAnswer", "questionText": "Describe your symptoms"},
                {"id": "q-es", "variant": "openAnswer", "questionText": "Describa sus síntomas (Español)"},
                {"id": "demo", "variant": "demographics", "questionText": "About you"},
                {"id": "s2", "questionText": "Consent (section)"},
            ])),
            ..RawTemplate::default()
        };
        normalize_template(raw).unwrap()
    }

    fn ids(template: &FormTemplate, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&index| template.items[index].id.clone())
            .collect()
    }

    #[test]
    fn test_primary_keeps_unmarked_items_and_structure() {
        let template = template();
        let filtered = filter_items(&template, Language::Primary);
        assert_eq!(
            ids(&template, &filtered),
            vec!["demo", "s1", "lang", "q-en", "s2"]
        );
    }

    #[test]
    fn test_alternate_keeps_marked_items_and_structure() {
        let template = template();
        let filtered = filter_items(&template, Language::Alternate);
        assert_eq!(
            ids(&template, &filtered),
            vec!["demo", "s1", "lang", "q-es", "s2"]
        );
    }

    #[test]
    fn test_every_section_survives_in_original_relative_order() {
        let template = template();
        for language in [Language::Primary, Language::Alternate] {
            let filtered = filter_items(&template, language);
            let sections: Vec<String> = ids(&template, &filtered)
                .into_iter()
                .filter(|id| id.starts_with('s'))
                .collect();
            assert_eq!(sections, vec!["s1", "s2"]);
        }
    }

    #[test]
    fn test_demographics_precede_all_other_items() {
        let template = template();
        let filtered = filter_items(&template, Language::Primary);
        let first = &template.items[filtered[0]];
        assert_eq!(first.variant(), QuestionVariant::Demographics);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let template = template();
        let first = filter_items(&template, Language::Alternate);
        let second = filter_items(&template, Language::Alternate);
        assert_eq!(first, second);
    }

    #[test]
    fn test_marker_detection_is_case_insensitive() {
        assert!(has_alternate_marker("Describa sus síntomas (ESPAÑOL)"));
        assert!(has_alternate_marker("Symptoms (Spanish)"));
        assert!(!has_alternate_marker("Describe your symptoms"));
    }
}
