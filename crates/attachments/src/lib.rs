//! Captured-file storage for intake sessions.
//!
//! A fill-out session accumulates two kinds of state: answer data (held in
//! the engine's response store) and binary files the patient attaches along
//! the way. This crate owns the second kind.
//!
//! ## Design Principles
//!
//! - Binary bytes and answer data are deliberately separated; files never
//!   travel inside the JSON answer document
//! - Files are keyed by the question that captured them
//! - A file is validated against the question's policy *before* the store
//!   is touched; a rejected file leaves the store exactly as it was
//! - Within one question, identical content is stored once (duplicate
//!   content is rejected by hash)
//!
//! At submission time the engine ships the JSON payload and the captured
//! files as separate multipart parts; the server is responsible for
//! back-filling file URLs into the stored response.

mod store;

pub use store::{AttachmentPolicy, AttachmentStore, CapturedFile};

/// Errors that can occur while capturing files
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    /// File exceeds the size cap declared by the question
    #[error("File is {size_bytes} bytes but the limit is {limit_bytes} bytes")]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },

    /// File's media type is not on the question's allow-list
    #[error("Media type '{0}' is not permitted for this question")]
    UnsupportedMediaType(String),

    /// Identical content was already captured for this question
    #[error("File with hash {0} is already attached to this question")]
    DuplicateContent(String),

    /// Data URI could not be parsed or decoded
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// Filename was empty
    #[error("Filename cannot be empty")]
    EmptyFilename,

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
