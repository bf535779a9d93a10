//! Step cursor over the language-filtered question sequence.
//!
//! The sequencer owns "where the patient is" and nothing else. Whether a
//! forward step is *permitted* is the session's business (it consults the
//! validation engine first); the cursor itself only knows how to move.

use crate::language::{filter_items, Language};
use crate::template::FormTemplate;

/// Finite-state cursor over the filtered sequence.
///
/// Positions are `0 ≤ current < len` whenever the sequence is non-empty.
/// The cursor stores indices into the *template's* item list, so the item
/// under the cursor is always a view into the immutable template.
#[derive(Debug)]
pub struct Sequencer {
    filtered: Vec<usize>,
    current: usize,
    language: Language,
}

impl Sequencer {
    /// Builds the cursor for a template and language, starting at step 0.
    pub fn new(template: &FormTemplate, language: Language) -> Self {
        Self {
            filtered: filter_items(template, language),
            current: 0,
            language,
        }
    }

    /// Number of steps in the active sequence.
    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    /// `true` when the filtered sequence has no steps.
    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    /// Zero-based position of the cursor, if the sequence is non-empty.
    pub fn position(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }

    /// Template index of the current item, if any.
    pub fn current_template_index(&self) -> Option<usize> {
        self.position().map(|position| self.filtered[position])
    }

    /// Active language selection.
    pub fn language(&self) -> Language {
        self.language
    }

    /// `true` when the cursor sits on the last step.
    ///
    /// On the terminal step the affirmative action is submit, not next.
    pub fn is_terminal(&self) -> bool {
        !self.is_empty() && self.current == self.filtered.len() - 1
    }

    /// `true` when a backward step is possible.
    pub fn can_go_back(&self) -> bool {
        self.current > 0
    }

    /// Moves one step forward. No-op on the terminal step (and on an empty
    /// sequence); returns whether the cursor moved.
    pub fn advance(&mut self) -> bool {
        if self.is_empty() || self.is_terminal() {
            return false;
        }
        self.current += 1;
        true
    }

    /// Moves one step back; returns whether the cursor moved. Never
    /// blocked — the patient may always revisit earlier answers.
    pub fn retreat(&mut self) -> bool {
        if !self.can_go_back() {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Switches language: recomputes the filtered sequence and resets the
    /// cursor to step 0.
    pub fn set_language(&mut self, template: &FormTemplate, language: Language) {
        self.language = language;
        self.filtered = filter_items(template, language);
        self.current = 0;
    }
}
