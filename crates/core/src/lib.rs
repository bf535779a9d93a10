//! # Intake Core
//!
//! The adaptive intake-form engine: a schema-driven state machine that
//! walks a patient through an ordered, heterogeneous list of question
//! definitions one step at a time.
//!
//! This crate contains pure session logic:
//! - Template normalization (id assignment, variant inference, defaults)
//! - Language filtering and the step cursor
//! - Typed-key response storage
//! - Per-variant validation, first-failure-wins
//! - Terminal-step submission assembly
//!
//! **No transport concerns**: fetching templates, creating the dependent
//! patient record, and posting the multipart submission belong in
//! `intake-client`. **No rendering concerns**: how a question is shown is
//! the caller's business; this crate only decides what is current, what is
//! valid, and what gets submitted.

pub mod language;
pub mod normalize;
pub mod responses;
pub mod sequencer;
pub mod session;
pub mod submission;
pub mod template;
pub mod validation;

pub use language::Language;
pub use session::IntakeSession;
pub use validation::Violation;

/// Errors raised by the intake engine.
///
/// Everything here is handled inside the wizard: a malformed template ends
/// the session before it starts, and the recoverable variants block a
/// single transition while leaving all captured state intact.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The template document cannot be used at all; the session never starts
    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    /// The current item blocks the transition; state is unchanged
    #[error("{0}")]
    Validation(#[from] validation::Violation),

    /// Every assembled record was empty; no network call is attempted
    #[error("Nothing to submit: every answer record was empty")]
    NothingToSubmit,

    /// A question's captured keys span more than one answer shape
    #[error("Responses for question {question_id} mix incompatible key shapes")]
    MixedResponseShape { question_id: String },
}

pub type IntakeResult<T> = std::result::Result<T, IntakeError>;
