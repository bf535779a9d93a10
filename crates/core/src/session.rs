//! Fill-out session façade.
//!
//! One [`IntakeSession`] owns everything a single patient's wizard run
//! needs: the immutable template, the response store, the attachment
//! store, and the step cursor. All transitions run to completion before
//! the next action is accepted; the session is discarded on submission or
//! abandonment and nothing in it is persisted.

use intake_attachments::AttachmentStore;
use intake_types::IsoDate;

use crate::language::Language;
use crate::normalize::normalize_template;
use crate::responses::{ResponseKey, ResponseStore, ResponseValue};
use crate::sequencer::Sequencer;
use crate::submission::{assemble, SubmissionDraft};
use crate::template::{FormTemplate, QuestionItem, RawTemplate};
use crate::validation::{validate_item, Violation};
use crate::{IntakeError, IntakeResult};

/// State of one interactive fill-out session.
#[derive(Debug)]
pub struct IntakeSession {
    template: FormTemplate,
    responses: ResponseStore,
    attachments: AttachmentStore,
    sequencer: Sequencer,
}

impl IntakeSession {
    /// Starts a session over a normalized template, in the primary
    /// language, at step 0.
    pub fn new(template: FormTemplate) -> Self {
        let sequencer = Sequencer::new(&template, Language::Primary);
        tracing::info!(
            template_id = %template.id,
            steps = sequencer.len(),
            "intake session started"
        );
        Self {
            template,
            responses: ResponseStore::new(),
            attachments: AttachmentStore::new(),
            sequencer,
        }
    }

    /// Normalizes a raw template document and starts a session over it.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::MalformedTemplate` if normalization fails;
    /// the session cannot start.
    pub fn from_raw(raw: RawTemplate) -> IntakeResult<Self> {
        Ok(Self::new(normalize_template(raw)?))
    }

    pub fn template(&self) -> &FormTemplate {
        &self.template
    }

    pub fn language(&self) -> Language {
        self.sequencer.language()
    }

    /// The item under the cursor, if the filtered sequence is non-empty.
    pub fn current_item(&self) -> Option<&QuestionItem> {
        self.sequencer
            .current_template_index()
            .map(|index| &self.template.items[index])
    }

    /// Zero-based position and total step count.
    pub fn step(&self) -> Option<(usize, usize)> {
        self.sequencer
            .position()
            .map(|position| (position, self.sequencer.len()))
    }

    /// `true` when the cursor sits on the last step, where the forward
    /// action is submit rather than next.
    pub fn is_terminal(&self) -> bool {
        self.sequencer.is_terminal()
    }

    pub fn can_go_back(&self) -> bool {
        self.sequencer.can_go_back()
    }

    pub fn responses(&self) -> &ResponseStore {
        &self.responses
    }

    pub fn responses_mut(&mut self) -> &mut ResponseStore {
        &mut self.responses
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut AttachmentStore {
        &mut self.attachments
    }

    /// Validates the item under the cursor.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::Validation` carrying the first violation.
    pub fn validate_current(&self) -> IntakeResult<()> {
        if let Some(item) = self.current_item() {
            validate_item(item, &self.responses, &self.attachments)?;
        }
        Ok(())
    }

    /// Attempts to move one step forward.
    ///
    /// Validation gates the move; on the terminal step a passing `next` is
    /// a no-op that leaves the cursor in place (the affirmative action
    /// there is submit). Returns whether the cursor moved.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::Validation` when the current item blocks the
    /// transition; the cursor and stores are unchanged.
    pub fn next(&mut self) -> IntakeResult<bool> {
        self.validate_current()?;
        Ok(self.sequencer.advance())
    }

    /// Moves one step back. Never gated by validation; returns whether
    /// the cursor moved.
    pub fn previous(&mut self) -> bool {
        self.sequencer.retreat()
    }

    /// Switches the active language: recomputes the filtered sequence and
    /// resets the cursor to step 0. Captured answers are kept.
    pub fn set_language(&mut self, language: Language) {
        self.sequencer.set_language(&self.template, language);
        tracing::info!(?language, steps = self.sequencer.len(), "language changed");
    }

    /// Captures a date answer, enforcing `YYYY-MM-DD` before it is stored.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::Validation` when the input is not a valid
    /// calendar date; the store is unchanged.
    pub fn capture_date(&mut self, question_id: &str, input: &str) -> IntakeResult<()> {
        let date = IsoDate::parse(input).map_err(|e| {
            IntakeError::Validation(Violation {
                question_id: question_id.to_string(),
                field: "date".to_string(),
                message: e.to_string(),
            })
        })?;
        self.responses.set(
            question_id,
            ResponseKey::Whole,
            ResponseValue::Text(date.as_str().to_string()),
        )
    }

    /// Runs the terminal-step validation pass and assembles the
    /// submission draft. The session itself is untouched, so a failed
    /// network submission can be retried without re-entering anything.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::Validation` if the current item fails its
    /// final check, or `IntakeError::NothingToSubmit` if no record
    /// carries content.
    pub fn assemble_submission(&self) -> IntakeResult<SubmissionDraft> {
        self.validate_current()?;
        assemble(&self.template, &self.responses, &self.attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(items: serde_json::Value) -> IntakeSession {
        IntakeSession::from_raw(RawTemplate {
            id: Some("tmpl-1".to_string()),
            items: Some(items),
            ..RawTemplate::default()
        })
        .unwrap()
    }

    fn two_required_items() -> IntakeSession {
        session(json!([
            {"id": "demo", "variant": "demographics", "questionText": "About you", "isRequired": true},
            {"id": "q1", "variant": "openAnswer", "questionText": "Symptoms", "isRequired": true},
        ]))
    }

    fn fill_demographics(session: &mut IntakeSession) {
        for (name, value) in [
            ("firstName", "Ada"),
            ("lastName", "Lovelace"),
            ("dateOfBirth", "1990-01-31"),
            ("assignedDoctor", "doc-9"),
        ] {
            session
                .responses_mut()
                .set(
                    "demo",
                    ResponseKey::Field(name.to_string()),
                    ResponseValue::Text(value.to_string()),
                )
                .unwrap();
        }
    }

    #[test]
    fn test_next_blocked_by_validation_leaves_state_unchanged() {
        let mut session = two_required_items();
        assert_eq!(session.step(), Some((0, 2)));

        let err = session.next().expect_err("demographics empty");
        assert!(matches!(err, IntakeError::Validation(_)));
        assert_eq!(session.step(), Some((0, 2)));
    }

    #[test]
    fn test_next_advances_after_validation_passes() {
        let mut session = two_required_items();
        fill_demographics(&mut session);

        assert!(session.next().unwrap());
        assert_eq!(session.step(), Some((1, 2)));
        assert!(session.is_terminal());
    }

    #[test]
    fn test_terminal_next_is_noop_even_when_valid() {
        let mut session = two_required_items();
        fill_demographics(&mut session);
        session.next().unwrap();
        session
            .responses_mut()
            .set("q1", ResponseKey::Whole, ResponseValue::Text("headache".into()))
            .unwrap();

        let moved = session.next().unwrap();
        assert!(!moved);
        assert_eq!(session.step(), Some((1, 2)));
    }

    #[test]
    fn test_previous_never_blocked_by_validation() {
        let mut session = two_required_items();
        fill_demographics(&mut session);
        session.next().unwrap();

        // q1 is required and empty, but going back is always allowed.
        assert!(session.previous());
        assert_eq!(session.step(), Some((0, 2)));
    }

    #[test]
    fn test_submit_with_empty_required_answer_blocks_before_assembly() {
        // Demographics fully filled, open answer empty: the terminal check
        // reports exactly the open-answer item and no records are built.
        let mut session = two_required_items();
        fill_demographics(&mut session);
        session.next().unwrap();

        let err = session.assemble_submission().expect_err("open answer empty");
        match err {
            IntakeError::Validation(violation) => {
                assert_eq!(violation.question_id, "q1");
                assert!(violation.message.contains("Symptoms"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_submit_with_all_answers_assembles_draft() {
        let mut session = two_required_items();
        fill_demographics(&mut session);
        session.next().unwrap();
        session
            .responses_mut()
            .set("q1", ResponseKey::Whole, ResponseValue::Text("headache".into()))
            .unwrap();

        let draft = session.assemble_submission().unwrap();
        assert_eq!(draft.records.len(), 2);
        assert!(draft.patient_draft.is_some());
    }

    #[test]
    fn test_language_switch_resets_cursor_from_deep_step() {
        let mut session = session(json!([
            {"id": "lang", "questionText": "What is your language preference?"},
            {"id": "q1", "variant": "openAnswer", "questionText": "One"},
            {"id": "q2", "variant": "openAnswer", "questionText": "Two"},
            {"id": "q3", "variant": "openAnswer", "questionText": "Three"},
            {"id": "q4", "variant": "openAnswer", "questionText": "Four"},
            {"id": "q5", "variant": "openAnswer", "questionText": "Five"},
            {"id": "q1-es", "variant": "openAnswer", "questionText": "Uno (Español)"},
        ]));

        for _ in 0..5 {
            session.next().unwrap();
        }
        assert_eq!(session.step().unwrap().0, 5);

        session.set_language(Language::Alternate);

        assert_eq!(session.step(), Some((0, 2)));
        assert_eq!(session.language(), Language::Alternate);
    }

    #[test]
    fn test_answers_survive_language_switch() {
        let mut session = session(json!([
            {"id": "lang", "questionText": "What is your language preference?"},
            {"id": "q1", "variant": "openAnswer", "questionText": "One"},
        ]));
        session
            .responses_mut()
            .set("q1", ResponseKey::Whole, ResponseValue::Text("kept".into()))
            .unwrap();

        session.set_language(Language::Alternate);
        session.set_language(Language::Primary);

        assert_eq!(
            session.responses().answer("q1"),
            Some(&ResponseValue::Text("kept".to_string()))
        );
    }

    #[test]
    fn test_capture_date_enforces_calendar() {
        let mut session = session(json!([
            {"id": "dob", "variant": "date", "questionText": "Date of birth"},
        ]));

        let err = session.capture_date("dob", "2023-02-29").expect_err("bad date");
        assert!(matches!(err, IntakeError::Validation(_)));
        assert!(session.responses().answer("dob").is_none());

        session.capture_date("dob", "1990-01-31").unwrap();
        assert_eq!(
            session.responses().answer("dob"),
            Some(&ResponseValue::Text("1990-01-31".to_string()))
        );
    }

    #[test]
    fn test_malformed_template_cannot_start_session() {
        let err = IntakeSession::from_raw(RawTemplate::default())
            .expect_err("missing items");
        assert!(matches!(err, IntakeError::MalformedTemplate(_)));
    }
}
