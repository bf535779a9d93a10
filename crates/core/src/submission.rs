//! Terminal-step submission assembly.
//!
//! On the last step the engine stops being a wizard and becomes a
//! projection: every item of the *unfiltered* template is mapped to one
//! normalized record, records with nothing in them are dropped, and the
//! demographics answers (when the template carries a demographics item)
//! are re-shaped into the patient-creation request that must be resolved
//! before the form response itself may be persisted.
//!
//! Binary attachments never enter the JSON document. A file-bearing record
//! keeps an empty `fileAttachments` list; the raw bytes travel as separate
//! multipart parts and the server back-fills the URLs.

use chrono::{DateTime, Utc};
use intake_attachments::AttachmentStore;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::language::is_language_selector;
use crate::responses::{BodyMarking, ResponseKey, ResponseStore, ResponseValue};
use crate::template::{
    FormTemplate, MatrixConfig, MixedControlsConfig, QuestionConfig, QuestionItem,
    QuestionVariant, ASSIGNED_DOCTOR_FIELD,
};
use crate::{IntakeError, IntakeResult};

/// Answer content of a record, shaped by the variant that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Free text, a date, or a single selection
    Text(String),
    /// Multiple selections
    List(Vec<String>),
    /// Sub-field name to value (demographics, insurance)
    Fields(BTreeMap<String, String>),
}

/// One matrix row's captured selections.
///
/// A single-answer grid produces exactly one selection per answered row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixResponse {
    pub row: String,
    pub selections: Vec<String>,
}

/// One mixed control's captured value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedControlResponse {
    pub label: String,
    pub value: String,
}

/// Per-question normalized output record.
///
/// Exactly the fields relevant to the record's variant are populated; the
/// rest stay absent from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub question_id: String,
    pub variant: QuestionVariant,
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_responses: Option<Vec<MatrixResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_attachments: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_map_markings: Option<Vec<BodyMarking>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixed_controls_responses: Option<Vec<MixedControlResponse>>,
}

impl SubmissionRecord {
    fn empty(item: &QuestionItem) -> Self {
        Self {
            question_id: item.id.clone(),
            variant: item.variant(),
            question_text: item.question_text.clone(),
            answer: None,
            matrix_responses: None,
            file_attachments: None,
            signature: None,
            body_map_markings: None,
            mixed_controls_responses: None,
        }
    }

    /// `true` when the record carries something worth submitting.
    pub fn has_content(&self) -> bool {
        let answered = match &self.answer {
            Some(AnswerValue::Text(text)) => !text.trim().is_empty(),
            Some(AnswerValue::List(options)) => !options.is_empty(),
            Some(AnswerValue::Fields(fields)) => !fields.is_empty(),
            None => false,
        };
        answered
            || self
                .matrix_responses
                .as_ref()
                .is_some_and(|rows| !rows.is_empty())
            || self.file_attachments.is_some()
            || self
                .signature
                .as_ref()
                .is_some_and(|name| !name.trim().is_empty())
            || self
                .body_map_markings
                .as_ref()
                .is_some_and(|markings| !markings.is_empty())
            || self
                .mixed_controls_responses
                .as_ref()
                .is_some_and(|controls| !controls.is_empty())
    }
}

/// Patient-creation request synthesized from demographics answers.
///
/// Every field is optional at this layer; the collaborator decides what a
/// usable patient looks like and answers with an id (or refuses).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_doctor_id: Option<String>,
}

/// Assembled submission, ready for the client layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionDraft {
    pub template_id: String,
    pub records: Vec<SubmissionRecord>,
    /// Present exactly when the template carries a demographics item
    pub patient_draft: Option<PatientDraft>,
    /// File questions that actually captured files, in template order
    pub attachment_question_ids: Vec<String>,
}

/// The structured JSON part of the multipart submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub form_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
    pub responses: Vec<SubmissionRecord>,
    pub status: String,
    pub completed_at: DateTime<Utc>,
}

impl SubmissionDraft {
    /// Finalises the JSON payload once the dependent patient record (if
    /// any) has been resolved to an id.
    pub fn into_payload(
        self,
        patient: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> SubmissionPayload {
        SubmissionPayload {
            form_template: self.template_id,
            patient,
            responses: self.records,
            status: "completed".to_string(),
            completed_at,
        }
    }
}

/// Projects the captured state into a [`SubmissionDraft`].
///
/// Walks every item of the unfiltered template except sections and the
/// language selector, drops records with no meaningful content, and
/// synthesizes the patient draft when a demographics item exists.
///
/// # Errors
///
/// Returns `IntakeError::NothingToSubmit` when no record survives the
/// empty-record drop; callers must not make any network call in that case.
pub fn assemble(
    template: &FormTemplate,
    responses: &ResponseStore,
    attachments: &AttachmentStore,
) -> IntakeResult<SubmissionDraft> {
    let mut records = Vec::new();
    let mut patient_draft = None;
    let mut attachment_question_ids = Vec::new();

    for item in &template.items {
        if item.variant() == QuestionVariant::Section || is_language_selector(&item.question_text)
        {
            continue;
        }

        if item.variant() == QuestionVariant::Demographics && patient_draft.is_none() {
            patient_draft = Some(patient_draft_from(item, responses));
        }

        if item.variant() == QuestionVariant::FileAttachment && attachments.has_files(&item.id) {
            attachment_question_ids.push(item.id.clone());
        }

        let record = project(item, responses, attachments);
        if record.has_content() {
            records.push(record);
        } else {
            tracing::debug!(question_id = %item.id, "dropping empty record");
        }
    }

    if records.is_empty() {
        return Err(IntakeError::NothingToSubmit);
    }

    Ok(SubmissionDraft {
        template_id: template.id.clone(),
        records,
        patient_draft,
        attachment_question_ids,
    })
}

/// Projects one item into its record. Dispatches on the variant tag,
/// independently of validation's dispatch.
fn project(
    item: &QuestionItem,
    responses: &ResponseStore,
    attachments: &AttachmentStore,
) -> SubmissionRecord {
    let mut record = SubmissionRecord::empty(item);

    match &item.config {
        QuestionConfig::Section => {}

        QuestionConfig::OpenAnswer | QuestionConfig::SmartEditor | QuestionConfig::Date => {
            record.answer = whole_text(item, responses).map(AnswerValue::Text);
        }

        QuestionConfig::ESignature => {
            record.signature = whole_text(item, responses);
        }

        QuestionConfig::Demographics(_)
        | QuestionConfig::PrimaryInsurance(_)
        | QuestionConfig::SecondaryInsurance(_) => {
            let fields = field_map(item, responses);
            if !fields.is_empty() {
                record.answer = Some(AnswerValue::Fields(fields));
            }
        }

        QuestionConfig::MultipleChoiceSingle(_) => {
            record.answer = whole_text(item, responses).map(AnswerValue::Text);
        }

        QuestionConfig::MultipleChoiceMultiple(_) => {
            if let Some(ResponseValue::Selections(options)) = responses.answer(&item.id) {
                if !options.is_empty() {
                    record.answer = Some(AnswerValue::List(options.clone()));
                }
            }
        }

        QuestionConfig::Matrix(config) => {
            let rows = multi_matrix_rows(item, config, responses);
            if !rows.is_empty() {
                record.matrix_responses = Some(rows);
            }
        }

        QuestionConfig::MatrixSingleAnswer(config) => {
            let rows = single_matrix_rows(item, config, responses);
            if !rows.is_empty() {
                record.matrix_responses = Some(rows);
            }
        }

        QuestionConfig::FileAttachment(_) => {
            if attachments.has_files(&item.id) {
                // URLs are back-filled server-side; bytes travel out-of-band.
                record.file_attachments = Some(Vec::new());
            }
        }

        QuestionConfig::BodyMap(_) => {
            if let Some(ResponseValue::Markings(markings)) =
                responses.get(&item.id, &ResponseKey::Field("markings".to_string()))
            {
                if !markings.is_empty() {
                    record.body_map_markings = Some(markings.clone());
                }
            }
            if let Some(description) = responses
                .get(&item.id, &ResponseKey::Field("description".to_string()))
                .and_then(ResponseValue::as_text)
                .filter(|text| !text.trim().is_empty())
            {
                record.answer = Some(AnswerValue::Text(description.to_string()));
            }
        }

        QuestionConfig::MixedControls(config) => {
            let controls = mixed_control_values(item, config, responses);
            if !controls.is_empty() {
                record.mixed_controls_responses = Some(controls);
            }
        }
    }

    record
}

fn whole_text(item: &QuestionItem, responses: &ResponseStore) -> Option<String> {
    responses
        .answer(&item.id)
        .and_then(ResponseValue::as_text)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn field_map(item: &QuestionItem, responses: &ResponseStore) -> BTreeMap<String, String> {
    responses
        .entries(&item.id)
        .filter_map(|(key, value)| match key {
            ResponseKey::Field(name) => value
                .as_text()
                .filter(|text| !text.trim().is_empty())
                .map(|text| (name.clone(), text.to_string())),
            _ => None,
        })
        .collect()
}

fn single_matrix_rows(
    item: &QuestionItem,
    config: &MatrixConfig,
    responses: &ResponseStore,
) -> Vec<MatrixResponse> {
    responses
        .entries(&item.id)
        .filter_map(|(key, value)| match (key, value.as_text()) {
            (ResponseKey::Row(row), Some(selection)) if !selection.trim().is_empty() => {
                Some(MatrixResponse {
                    row: row_label(config, *row),
                    selections: vec![selection.to_string()],
                })
            }
            _ => None,
        })
        .collect()
}

fn multi_matrix_rows(
    item: &QuestionItem,
    config: &MatrixConfig,
    responses: &ResponseStore,
) -> Vec<MatrixResponse> {
    let mut by_row: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (key, value) in responses.entries(&item.id) {
        if let (ResponseKey::Cell { row, .. }, Some(selection)) = (key, value.as_text()) {
            if !selection.trim().is_empty() {
                by_row.entry(*row).or_default().push(selection.to_string());
            }
        }
    }
    by_row
        .into_iter()
        .map(|(row, selections)| MatrixResponse {
            row: row_label(config, row),
            selections,
        })
        .collect()
}

fn row_label(config: &MatrixConfig, row: usize) -> String {
    config
        .rows
        .get(row)
        .cloned()
        .unwrap_or_else(|| format!("Row {}", row + 1))
}

fn mixed_control_values(
    item: &QuestionItem,
    config: &MixedControlsConfig,
    responses: &ResponseStore,
) -> Vec<MixedControlResponse> {
    responses
        .entries(&item.id)
        .filter_map(|(key, value)| match (key, value.as_text()) {
            (ResponseKey::Control(index), Some(text)) if !text.trim().is_empty() => {
                let label = config
                    .controls
                    .get(*index)
                    .map(|control| control.label.clone())
                    .unwrap_or_else(|| format!("Control {}", index + 1));
                Some(MixedControlResponse {
                    label,
                    value: text.to_string(),
                })
            }
            _ => None,
        })
        .collect()
}

fn patient_draft_from(item: &QuestionItem, responses: &ResponseStore) -> PatientDraft {
    let field = |name: &str| -> Option<String> {
        responses
            .get(&item.id, &ResponseKey::Field(name.to_string()))
            .and_then(ResponseValue::as_text)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };

    PatientDraft {
        first_name: field("firstName"),
        last_name: field("lastName"),
        date_of_birth: field("dateOfBirth"),
        gender: field("gender"),
        phone: field("phone"),
        email: field("email"),
        address_line1: field("addressLine1"),
        city: field("city"),
        state: field("state"),
        postal_code: field("postalCode"),
        assigned_doctor_id: field(ASSIGNED_DOCTOR_FIELD),
    }
}
