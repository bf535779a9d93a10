//! # Intake Client
//!
//! Typed clients for the collaborator endpoints the intake wizard
//! consumes:
//!
//! - `GET /templates/{id}` — the form template document
//! - `GET /doctors` — the assigned-doctor directory
//! - `POST /patients` — dependent patient-record creation
//! - `POST /form-responses` — the final multipart submission
//!
//! The engine in `intake-core` never talks to the network; everything
//! outbound funnels through this crate. The two-phase submit (patient
//! first, form response second) lives here as well, so the hard
//! dependency between the two writes is enforced in exactly one place.

mod client;
mod config;

pub use client::{Doctor, IntakeClient, SubmissionOutcome};
pub use config::ClientConfig;

/// Errors raised by collaborator calls.
///
/// All of these are handled by the wizard: fetch failures end the session
/// before it starts, and submission failures leave the session state
/// intact so the patient can retry without re-entering anything.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration rejected at startup
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Template fetch failed or the body was undecodable; fatal for the session
    #[error("Failed to fetch template: {0}")]
    TemplateFetch(String),

    /// Doctor-directory fetch failed or the body was undecodable
    #[error("Failed to fetch doctor directory: {0}")]
    DirectoryFetch(String),

    /// Patient creation failed or returned no usable id; the whole
    /// submission is aborted
    #[error("Dependent patient record could not be created: {0}")]
    DependentRecordFailure(String),

    /// The form-response call failed at the transport level
    #[error("Form-response submission failed: {0}")]
    SubmissionTransport(String),

    /// The form-response endpoint answered with a non-success status
    #[error("Form-response endpoint returned status {0}")]
    SubmissionRejected(u16),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
