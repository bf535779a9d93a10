//! Collaborator HTTP clients and the two-phase submit.

use chrono::{DateTime, Utc};
use intake_attachments::AttachmentStore;
use intake_core::submission::{PatientDraft, SubmissionDraft, SubmissionPayload};
use intake_core::template::RawTemplate;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{ClientConfig, ClientError, ClientResult};

/// Header carrying the optional collaborator API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Header making patient creation retry-safe across submission attempts.
const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// One entry of the assigned-doctor directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

/// Result of a completed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Id of the dependent patient record, when one was created
    pub patient_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePatientEnvelope {
    patient: Option<CreatedPatient>,
}

#[derive(Debug, Deserialize)]
struct CreatedPatient {
    id: Option<String>,
}

/// HTTP client over the collaborator endpoints.
#[derive(Debug, Clone)]
pub struct IntakeClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl IntakeClient {
    /// Creates a client over the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key() {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// Fetches the raw template document for a session.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::TemplateFetch` on any transport failure,
    /// non-success status, or undecodable body. All are fatal for the
    /// session; there is no partial template.
    pub async fn fetch_template(&self, template_id: &str) -> ClientResult<RawTemplate> {
        let url = self.url(&format!("/templates/{}", template_id));
        let response = self
            .apply_auth(self.http.get(&url))
            .send()
            .await
            .map_err(|e| ClientError::TemplateFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::TemplateFetch(format!(
                "collaborator returned status {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<RawTemplate>()
            .await
            .map_err(|e| ClientError::TemplateFetch(e.to_string()))
    }

    /// Fetches the doctor directory used by the assigned-doctor selector.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::DirectoryFetch` on transport failure,
    /// non-success status, or undecodable body.
    pub async fn fetch_doctor_directory(&self) -> ClientResult<Vec<Doctor>> {
        let url = self.url("/doctors");
        let response = self
            .apply_auth(self.http.get(&url))
            .send()
            .await
            .map_err(|e| ClientError::DirectoryFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::DirectoryFetch(format!(
                "collaborator returned status {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<Vec<Doctor>>()
            .await
            .map_err(|e| ClientError::DirectoryFetch(e.to_string()))
    }

    /// Creates the dependent patient record from demographics answers.
    ///
    /// The request carries an `Idempotency-Key` derived from the draft's
    /// content, so a retried submission re-sends the same key and the
    /// collaborator can de-duplicate instead of minting a second patient.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::DependentRecordFailure` on any transport
    /// failure, non-success status, or a response without a usable id.
    pub async fn create_patient(&self, draft: &PatientDraft) -> ClientResult<String> {
        let url = self.url("/patients");
        let response = self
            .apply_auth(self.http.post(&url))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key(draft))
            .json(draft)
            .send()
            .await
            .map_err(|e| ClientError::DependentRecordFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::DependentRecordFailure(format!(
                "collaborator returned status {}",
                response.status().as_u16()
            )));
        }

        let envelope = response
            .json::<CreatePatientEnvelope>()
            .await
            .map_err(|e| ClientError::DependentRecordFailure(e.to_string()))?;

        let id = envelope
            .patient
            .and_then(|patient| patient.id)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ClientError::DependentRecordFailure("collaborator returned no patient id".into())
            })?;

        tracing::info!(patient_id = %id, "dependent patient record created");
        Ok(id)
    }

    /// Posts the final multipart submission: a `payload` part carrying the
    /// JSON document and one `attachments[<questionId>]` part per captured
    /// file.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::SubmissionTransport` on transport failure or
    /// `ClientError::SubmissionRejected` on a non-success status. Captured
    /// state is the caller's and remains untouched either way.
    pub async fn submit_form_response(
        &self,
        payload: &SubmissionPayload,
        attachments: &AttachmentStore,
        attachment_question_ids: &[String],
    ) -> ClientResult<()> {
        let payload_json = serde_json::to_string(payload)
            .map_err(|e| ClientError::SubmissionTransport(e.to_string()))?;

        let mut form = Form::new().text("payload", payload_json);
        for question_id in attachment_question_ids {
            for file in attachments.files_for(question_id) {
                let part = Part::bytes(file.bytes.clone())
                    .file_name(file.filename.to_string())
                    .mime_str(file.media_type.as_str())
                    .map_err(|e| ClientError::SubmissionTransport(e.to_string()))?;
                form = form.part(format!("attachments[{}]", question_id), part);
            }
        }

        let url = self.url("/form-responses");
        let response = self
            .apply_auth(self.http.post(&url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::SubmissionTransport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::SubmissionRejected(response.status().as_u16()));
        }

        // The response body is advisory; nothing beyond the status is read.
        Ok(())
    }

    /// Runs the two-phase submission for an assembled draft.
    ///
    /// Patient creation is sequenced strictly before the form-response
    /// post and is a hard dependency: when the template carries a
    /// demographics item, any patient failure aborts the whole submission
    /// and the form response is never sent.
    ///
    /// # Errors
    ///
    /// Propagates `DependentRecordFailure` from the patient call and
    /// `SubmissionTransport`/`SubmissionRejected` from the form-response
    /// call.
    pub async fn submit(
        &self,
        draft: SubmissionDraft,
        attachments: &AttachmentStore,
        completed_at: DateTime<Utc>,
    ) -> ClientResult<SubmissionOutcome> {
        let patient_id = match &draft.patient_draft {
            Some(patient_draft) => Some(self.create_patient(patient_draft).await?),
            None => None,
        };

        let attachment_question_ids = draft.attachment_question_ids.clone();
        let payload = draft.into_payload(patient_id.clone(), completed_at);

        self.submit_form_response(&payload, attachments, &attachment_question_ids)
            .await?;

        tracing::info!(
            records = payload.responses.len(),
            patient = patient_id.as_deref().unwrap_or("-"),
            "form response submitted"
        );

        Ok(SubmissionOutcome { patient_id })
    }
}

/// Content-hash idempotency key for a patient draft.
fn idempotency_key(draft: &PatientDraft) -> String {
    let canonical = serde_json::to_vec(draft).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_is_stable_for_equal_content() {
        let draft = PatientDraft {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            ..PatientDraft::default()
        };
        let again = draft.clone();
        assert_eq!(idempotency_key(&draft), idempotency_key(&again));
    }

    #[test]
    fn test_idempotency_key_differs_for_different_content() {
        let ada = PatientDraft {
            first_name: Some("Ada".into()),
            ..PatientDraft::default()
        };
        let grace = PatientDraft {
            first_name: Some("Grace".into()),
            ..PatientDraft::default()
        };
        assert_ne!(idempotency_key(&ada), idempotency_key(&grace));
    }

    #[test]
    fn test_doctor_decodes_camel_case() {
        let doctor: Doctor = serde_json::from_value(serde_json::json!({
            "id": "doc-9",
            "firstName": "Joan",
            "lastName": "Clarke"
        }))
        .unwrap();
        assert_eq!(doctor.first_name, "Joan");
    }
}
