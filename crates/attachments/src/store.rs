//! Per-question captured-file store and capture policy.
//!
//! Files arrive from three directions: a picker dialog handing over raw
//! bytes, a path on disk (the terminal driver), and base64 data URIs
//! (signature pads and body-map overlays export their canvases this way).
//! All three funnel through the same policy checks so the enforcement
//! order is identical regardless of source: size cap first, then the
//! media-type allow-list, then the duplicate-content check.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use intake_types::NonEmptyText;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::AttachmentError;

/// Capture policy a question declares for its attachments.
///
/// The default mirrors what clinics actually collect: photographed
/// documents and scanned PDFs, capped at 5 MB per file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPolicy {
    /// Permitted media types (MIME), matched case-insensitively
    pub allowed_media_types: Vec<String>,

    /// Per-file size cap in megabytes
    pub max_file_size_mb: u64,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            allowed_media_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "application/pdf".to_string(),
            ],
            max_file_size_mb: 5,
        }
    }
}

impl AttachmentPolicy {
    /// Size cap in bytes.
    pub fn limit_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    fn permits(&self, media_type: &str) -> bool {
        self.allowed_media_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }
}

/// A single captured file.
///
/// The raw bytes are held in memory for the lifetime of the session and are
/// excluded from serialisation; only the descriptive metadata is
/// JSON-visible.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedFile {
    /// Original filename as presented by the patient
    pub filename: NonEmptyText,

    /// Detected media type, falling back to the declared one
    ///
    /// Detection is best-effort and should not be considered authoritative.
    pub media_type: NonEmptyText,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Hexadecimal SHA-256 digest of the content
    pub content_hash: String,

    /// UTC timestamp of capture
    pub captured_at: DateTime<Utc>,

    /// Raw content, shipped out-of-band at submission time
    #[serde(skip_serializing)]
    pub bytes: Vec<u8>,
}

/// In-memory store of captured files, keyed by question id.
///
/// The store is variant-agnostic: it does not know what kind of question
/// captured a file, only which question did. Policy enforcement happens on
/// every insertion, and a failed insertion never leaves partial state.
#[derive(Debug, Default)]
pub struct AttachmentStore {
    files: BTreeMap<String, Vec<CapturedFile>>,
}

impl AttachmentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures a file for a question from raw bytes.
    ///
    /// # Arguments
    ///
    /// * `question_id` - The question the file is attached to
    /// * `filename` - Original filename
    /// * `declared_type` - Media type claimed by the source, used when
    ///   content sniffing is inconclusive
    /// * `bytes` - Raw file content
    /// * `policy` - The question's capture policy
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError` if the file exceeds the size cap, its
    /// media type is not permitted, identical content is already attached
    /// to this question, or the filename is empty. The store is unchanged
    /// on error.
    pub fn add(
        &mut self,
        question_id: &str,
        filename: &str,
        declared_type: Option<&str>,
        bytes: Vec<u8>,
        policy: &AttachmentPolicy,
    ) -> Result<&CapturedFile, AttachmentError> {
        let filename = NonEmptyText::new(filename).map_err(|_| AttachmentError::EmptyFilename)?;

        let size_bytes = bytes.len() as u64;
        if size_bytes > policy.limit_bytes() {
            return Err(AttachmentError::FileTooLarge {
                size_bytes,
                limit_bytes: policy.limit_bytes(),
            });
        }

        // Sniff the content; trust the declared type only when sniffing
        // comes up empty.
        let media_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .or_else(|| declared_type.map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !policy.permits(&media_type) {
            return Err(AttachmentError::UnsupportedMediaType(media_type));
        }

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let content_hash = hex::encode(hasher.finalize());

        let entry = self.files.entry(question_id.to_string()).or_default();
        if entry.iter().any(|f| f.content_hash == content_hash) {
            return Err(AttachmentError::DuplicateContent(content_hash));
        }

        let media_type =
            NonEmptyText::new(&media_type).expect("media type string is non-empty");

        tracing::debug!(
            question_id,
            size_bytes,
            media_type = media_type.as_str(),
            "captured attachment"
        );

        entry.push(CapturedFile {
            filename,
            media_type,
            size_bytes,
            content_hash,
            captured_at: Utc::now(),
            bytes,
        });
        Ok(entry.last().expect("entry was just pushed"))
    }

    /// Captures a file for a question by reading it from disk.
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError::Io` if the file cannot be read, or any
    /// policy error from [`Self::add`].
    pub fn add_from_path(
        &mut self,
        question_id: &str,
        path: &Path,
        policy: &AttachmentPolicy,
    ) -> Result<&CapturedFile, AttachmentError> {
        let bytes = fs::read(path).map_err(|e| {
            AttachmentError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            ))
        })?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment");

        self.add(question_id, filename, None, bytes, policy)
    }

    /// Captures a file delivered as a base64 data URI.
    ///
    /// Accepts the `data:<media-type>;base64,<payload>` form that canvas
    /// exports produce.
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError::InvalidDataUri` if the URI does not match
    /// the expected shape or the payload fails to decode, or any policy
    /// error from [`Self::add`].
    pub fn add_from_data_uri(
        &mut self,
        question_id: &str,
        filename: &str,
        uri: &str,
        policy: &AttachmentPolicy,
    ) -> Result<&CapturedFile, AttachmentError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| AttachmentError::InvalidDataUri("missing 'data:' scheme".into()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AttachmentError::InvalidDataUri("missing ',' separator".into()))?;

        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| AttachmentError::InvalidDataUri("payload is not base64".into()))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| AttachmentError::InvalidDataUri(e.to_string()))?;

        let declared = if media_type.is_empty() {
            None
        } else {
            Some(media_type)
        };

        self.add(question_id, filename, declared, bytes, policy)
    }

    /// Returns the files captured for a question (empty slice if none).
    pub fn files_for(&self, question_id: &str) -> &[CapturedFile] {
        self.files
            .get(question_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns `true` if the question has at least one captured file.
    pub fn has_files(&self, question_id: &str) -> bool {
        !self.files_for(question_id).is_empty()
    }

    /// Removes all files captured for a question.
    pub fn remove(&mut self, question_id: &str) {
        self.files.remove(question_id);
    }

    /// Question ids that currently hold at least one file, in stable order.
    pub fn question_ids(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .filter(|(_, files)| !files.is_empty())
            .map(|(id, _)| id.as_str())
    }

    /// Total number of captured files across all questions.
    pub fn total_files(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn png_bytes(extra: usize) -> Vec<u8> {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.extend(std::iter::repeat(0u8).take(extra));
        bytes
    }

    #[test]
    fn test_add_accepts_file_within_policy() {
        let mut store = AttachmentStore::new();
        let policy = AttachmentPolicy::default();

        let file = store
            .add("q1", "scan.png", None, png_bytes(100), &policy)
            .unwrap();

        assert_eq!(file.media_type.as_str(), "image/png");
        assert_eq!(file.size_bytes, 108);
        assert_eq!(file.content_hash.len(), 64);
        assert!(store.has_files("q1"));
        assert_eq!(store.total_files(), 1);
    }

    #[test]
    fn test_add_rejects_oversized_file_without_updating_store() {
        let mut store = AttachmentStore::new();
        let policy = AttachmentPolicy {
            max_file_size_mb: 5,
            ..AttachmentPolicy::default()
        };

        // 6 MB against a 5 MB cap.
        let oversized = png_bytes(6 * 1024 * 1024);
        let err = store
            .add("q1", "big.png", None, oversized, &policy)
            .expect_err("should reject oversized file");

        assert!(matches!(err, AttachmentError::FileTooLarge { .. }));
        assert!(!store.has_files("q1"));
        assert_eq!(store.total_files(), 0);
    }

    #[test]
    fn test_add_rejects_media_type_off_allow_list() {
        let mut store = AttachmentStore::new();
        let policy = AttachmentPolicy {
            allowed_media_types: vec!["application/pdf".to_string()],
            ..AttachmentPolicy::default()
        };

        let err = store
            .add("q1", "photo.png", None, png_bytes(10), &policy)
            .expect_err("should reject png");

        assert!(matches!(err, AttachmentError::UnsupportedMediaType(t) if t == "image/png"));
        assert!(!store.has_files("q1"));
    }

    #[test]
    fn test_add_falls_back_to_declared_type_when_sniffing_fails() {
        let mut store = AttachmentStore::new();
        let policy = AttachmentPolicy {
            allowed_media_types: vec!["text/plain".to_string()],
            ..AttachmentPolicy::default()
        };

        let file = store
            .add(
                "q1",
                "notes.txt",
                Some("text/plain"),
                b"plain text".to_vec(),
                &policy,
            )
            .unwrap();

        assert_eq!(file.media_type.as_str(), "text/plain");
    }

    #[test]
    fn test_add_rejects_duplicate_content_for_same_question() {
        let mut store = AttachmentStore::new();
        let policy = AttachmentPolicy::default();

        store
            .add("q1", "scan.png", None, png_bytes(50), &policy)
            .unwrap();
        let err = store
            .add("q1", "scan-copy.png", None, png_bytes(50), &policy)
            .expect_err("should reject duplicate content");

        assert!(matches!(err, AttachmentError::DuplicateContent(_)));
        assert_eq!(store.files_for("q1").len(), 1);
    }

    #[test]
    fn test_same_content_allowed_on_different_questions() {
        let mut store = AttachmentStore::new();
        let policy = AttachmentPolicy::default();

        store
            .add("q1", "scan.png", None, png_bytes(50), &policy)
            .unwrap();
        store
            .add("q2", "scan.png", None, png_bytes(50), &policy)
            .unwrap();

        assert_eq!(store.total_files(), 2);
    }

    #[test]
    fn test_add_rejects_empty_filename() {
        let mut store = AttachmentStore::new();
        let policy = AttachmentPolicy::default();

        let err = store
            .add("q1", "  ", None, png_bytes(10), &policy)
            .expect_err("should reject empty filename");

        assert!(matches!(err, AttachmentError::EmptyFilename));
    }

    #[test]
    fn test_add_from_path_reads_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scan.png");
        std::fs::write(&path, png_bytes(30)).unwrap();

        let mut store = AttachmentStore::new();
        let file = store
            .add_from_path("q1", &path, &AttachmentPolicy::default())
            .unwrap();

        assert_eq!(file.filename.as_str(), "scan.png");
        assert_eq!(file.size_bytes, 38);
    }

    #[test]
    fn test_add_from_path_missing_file_is_io_error() {
        let mut store = AttachmentStore::new();
        let err = store
            .add_from_path(
                "q1",
                Path::new("/non-existent/scan.png"),
                &AttachmentPolicy::default(),
            )
            .expect_err("should fail on missing file");

        assert!(matches!(err, AttachmentError::Io(_)));
    }

    #[test]
    fn test_add_from_data_uri_decodes_payload() {
        let payload = base64::engine::general_purpose::STANDARD.encode(png_bytes(20));
        let uri = format!("data:image/png;base64,{}", payload);

        let mut store = AttachmentStore::new();
        let file = store
            .add_from_data_uri("sig", "signature.png", &uri, &AttachmentPolicy::default())
            .unwrap();

        assert_eq!(file.media_type.as_str(), "image/png");
        assert_eq!(file.size_bytes, 28);
    }

    #[test]
    fn test_add_from_data_uri_rejects_malformed_input() {
        let mut store = AttachmentStore::new();
        let policy = AttachmentPolicy::default();

        for uri in ["image/png;base64,AAAA", "data:image/png;base64", "data:image/png,AAAA"] {
            let err = store
                .add_from_data_uri("sig", "signature.png", uri, &policy)
                .expect_err("should reject malformed uri");
            assert!(matches!(err, AttachmentError::InvalidDataUri(_)));
        }
    }

    #[test]
    fn test_remove_clears_question_files() {
        let mut store = AttachmentStore::new();
        let policy = AttachmentPolicy::default();
        store
            .add("q1", "scan.png", None, png_bytes(10), &policy)
            .unwrap();

        store.remove("q1");

        assert!(!store.has_files("q1"));
        assert_eq!(store.total_files(), 0);
    }

    #[test]
    fn test_captured_file_serialises_metadata_without_bytes() {
        let mut store = AttachmentStore::new();
        let file = store
            .add("q1", "scan.png", None, png_bytes(10), &AttachmentPolicy::default())
            .unwrap();

        let json = serde_json::to_value(file).unwrap();
        assert_eq!(json["filename"], "scan.png");
        assert_eq!(json["mediaType"], "image/png");
        assert!(json.get("bytes").is_none());
    }
}
