//! Captured-answer storage.
//!
//! All answers captured during a session live in one [`ResponseStore`],
//! addressed by a question id plus a typed [`ResponseKey`]. The key is a
//! proper sum type rather than a concatenated string (`"q1:0:2"`), so two
//! variants that happen to share an id prefix can never collide.
//!
//! For a given question id the set of present keys must match exactly one
//! variant's shape: a question answered as a bare value cannot also hold
//! sub-field entries, a single-answer grid cannot also hold multi-answer
//! cells, and so on. The store enforces this on every insertion — mixing
//! key shapes for one id is an error, never a silent overwrite.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{IntakeError, IntakeResult};

/// Typed address of one captured value within a question.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResponseKey {
    /// Bare answer for simple variants
    Whole,
    /// Named sub-field (demographics, insurance, body-map parts)
    Field(String),
    /// Single-answer matrix selection for one row
    Row(usize),
    /// Multi-answer matrix cell
    Cell { row: usize, col: usize },
    /// Mixed-control sub-control by position
    Control(usize),
}

impl ResponseKey {
    /// Shape family the key belongs to; one family per question id.
    fn family(&self) -> KeyFamily {
        match self {
            ResponseKey::Whole => KeyFamily::Whole,
            ResponseKey::Field(_) => KeyFamily::Field,
            ResponseKey::Row(_) => KeyFamily::Row,
            ResponseKey::Cell { .. } => KeyFamily::Cell,
            ResponseKey::Control(_) => KeyFamily::Control,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyFamily {
    Whole,
    Field,
    Row,
    Cell,
    Control,
}

/// One marking stroke on a body-map diagram.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyMarking {
    /// Diagram view the stroke was placed on (for example "front")
    pub view: String,
    pub x: f64,
    pub y: f64,
}

/// A captured raw value.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseValue {
    /// Free text, a date string, or a sub-field entry
    Text(String),
    /// A single chosen option
    Selection(String),
    /// Any number of chosen options
    Selections(Vec<String>),
    /// Body-map marking strokes
    Markings(Vec<BodyMarking>),
}

impl ResponseValue {
    /// Returns `true` if the value carries no meaningful content.
    pub fn is_blank(&self) -> bool {
        match self {
            ResponseValue::Text(text) | ResponseValue::Selection(text) => text.trim().is_empty(),
            ResponseValue::Selections(options) => options.is_empty(),
            ResponseValue::Markings(markings) => markings.is_empty(),
        }
    }

    /// Text content of the value, if it has a single textual form.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseValue::Text(text) | ResponseValue::Selection(text) => Some(text),
            _ => None,
        }
    }
}

/// Flat store of every answer captured during a session.
///
/// Created empty at session start, mutated by user input, and discarded on
/// submission or abandonment. Reading a key back returns exactly the value
/// written — the store never coerces.
#[derive(Debug, Default)]
pub struct ResponseStore {
    answers: BTreeMap<String, BTreeMap<ResponseKey, ResponseValue>>,
}

impl ResponseStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value under `question_id` + `key`, replacing any value
    /// already present at that exact address.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::MixedResponseShape` if the question already
    /// holds keys of a different shape family.
    pub fn set(
        &mut self,
        question_id: &str,
        key: ResponseKey,
        value: ResponseValue,
    ) -> IntakeResult<()> {
        let entry = self.answers.entry(question_id.to_string()).or_default();

        if let Some(existing) = entry.keys().next() {
            if existing.family() != key.family() {
                return Err(IntakeError::MixedResponseShape {
                    question_id: question_id.to_string(),
                });
            }
        }

        entry.insert(key, value);
        Ok(())
    }

    /// Reads the value at `question_id` + `key`, if any.
    pub fn get(&self, question_id: &str, key: &ResponseKey) -> Option<&ResponseValue> {
        self.answers.get(question_id)?.get(key)
    }

    /// Reads the bare answer of a question (`ResponseKey::Whole`).
    pub fn answer(&self, question_id: &str) -> Option<&ResponseValue> {
        self.get(question_id, &ResponseKey::Whole)
    }

    /// Iterates the captured entries of one question in key order.
    pub fn entries(
        &self,
        question_id: &str,
    ) -> impl Iterator<Item = (&ResponseKey, &ResponseValue)> {
        self.answers
            .get(question_id)
            .into_iter()
            .flat_map(|entry| entry.iter())
    }

    /// Returns `true` if the question holds at least one non-blank value.
    pub fn has_content(&self, question_id: &str) -> bool {
        self.entries(question_id).any(|(_, value)| !value.is_blank())
    }

    /// Removes one captured value.
    pub fn clear_key(&mut self, question_id: &str, key: &ResponseKey) {
        if let Some(entry) = self.answers.get_mut(question_id) {
            entry.remove(key);
            if entry.is_empty() {
                self.answers.remove(question_id);
            }
        }
    }

    /// Removes every captured value of a question.
    pub fn clear_question(&mut self, question_id: &str) {
        self.answers.remove(question_id);
    }

    /// Number of questions holding at least one entry.
    pub fn answered_questions(&self) -> usize {
        self.answers.len()
    }
}
