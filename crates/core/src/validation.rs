//! Per-variant answer validation.
//!
//! A pure predicate over the current item and the captured state, invoked
//! by the session before `next` and before submission. Validation stops at
//! the first failing rule and surfaces a single violation naming the
//! missing field; it never aggregates. Aggregating all violations per step
//! would be a behaviour change, not a fix.

use intake_attachments::AttachmentStore;

use crate::responses::{ResponseKey, ResponseStore, ResponseValue};
use crate::template::{
    DemographicsConfig, InsuranceConfig, MixedControlsConfig, QuestionConfig, QuestionItem,
    ASSIGNED_DOCTOR_FIELD,
};

/// A single blocking violation.
///
/// `field` names what is missing in the patient's terms; `message` is the
/// complete human-readable sentence the wizard surfaces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Violation {
    pub question_id: String,
    pub field: String,
    pub message: String,
}

impl Violation {
    fn new(question_id: &str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            question_id: question_id.to_string(),
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validates the item against the captured state.
///
/// Only enforced when the item is required and is not a section; optional
/// items always pass. Returns the first violation found, or `Ok(())`.
pub fn validate_item(
    item: &QuestionItem,
    responses: &ResponseStore,
    attachments: &AttachmentStore,
) -> Result<(), Violation> {
    if !item.is_required {
        return Ok(());
    }

    match &item.config {
        QuestionConfig::Section => Ok(()),

        QuestionConfig::OpenAnswer | QuestionConfig::SmartEditor => {
            require_whole(item, responses, "An answer is required")
        }

        QuestionConfig::Date => require_whole(item, responses, "A date is required"),

        // A typed name stands in for a signature.
        QuestionConfig::ESignature => require_whole(item, responses, "A signature is required"),

        QuestionConfig::Demographics(config) => validate_demographics(item, config, responses),

        QuestionConfig::PrimaryInsurance(config)
        | QuestionConfig::SecondaryInsurance(config) => validate_insurance(item, config, responses),

        QuestionConfig::MultipleChoiceSingle(_) => {
            if present(responses, &item.id, &ResponseKey::Whole) {
                Ok(())
            } else {
                Err(Violation::new(
                    &item.id,
                    &item.question_text,
                    format!("A selection is required for '{}'", item.question_text),
                ))
            }
        }

        QuestionConfig::MultipleChoiceMultiple(_) => match responses.answer(&item.id) {
            Some(ResponseValue::Selections(options)) if !options.is_empty() => Ok(()),
            _ => Err(Violation::new(
                &item.id,
                &item.question_text,
                format!("Select at least one option for '{}'", item.question_text),
            )),
        },

        QuestionConfig::FileAttachment(_) => {
            if attachments.has_files(&item.id) {
                Ok(())
            } else {
                Err(Violation::new(
                    &item.id,
                    &item.question_text,
                    format!(
                        "At least one file must be attached for '{}'",
                        item.question_text
                    ),
                ))
            }
        }

        QuestionConfig::BodyMap(_) => validate_body_map(item, responses),

        QuestionConfig::MixedControls(config) => validate_mixed_controls(item, config, responses),

        // Matrix grids accept partial completion.
        QuestionConfig::Matrix(_) | QuestionConfig::MatrixSingleAnswer(_) => Ok(()),
    }
}

fn require_whole(
    item: &QuestionItem,
    responses: &ResponseStore,
    stem: &str,
) -> Result<(), Violation> {
    if present(responses, &item.id, &ResponseKey::Whole) {
        Ok(())
    } else {
        Err(Violation::new(
            &item.id,
            &item.question_text,
            format!("{} for '{}'", stem, item.question_text),
        ))
    }
}

fn validate_demographics(
    item: &QuestionItem,
    config: &DemographicsConfig,
    responses: &ResponseStore,
) -> Result<(), Violation> {
    for field in &config.fields {
        // The assigned doctor is mandatory no matter how its descriptor is
        // flagged; without it no patient record can be created.
        let mandatory = field.is_required || field.name == ASSIGNED_DOCTOR_FIELD;
        if mandatory && !present(responses, &item.id, &ResponseKey::Field(field.name.clone())) {
            return Err(missing_field(item, &field.label));
        }
    }

    let listed = config
        .fields
        .iter()
        .any(|field| field.name == ASSIGNED_DOCTOR_FIELD);
    if !listed
        && !present(
            responses,
            &item.id,
            &ResponseKey::Field(ASSIGNED_DOCTOR_FIELD.to_string()),
        )
    {
        return Err(missing_field(item, "Assigned doctor"));
    }

    Ok(())
}

fn validate_insurance(
    item: &QuestionItem,
    config: &InsuranceConfig,
    responses: &ResponseStore,
) -> Result<(), Violation> {
    for field in &config.fields {
        if field.is_required
            && !present(responses, &item.id, &ResponseKey::Field(field.name.clone()))
        {
            return Err(missing_field(item, &field.label));
        }
    }
    Ok(())
}

fn validate_body_map(item: &QuestionItem, responses: &ResponseStore) -> Result<(), Violation> {
    let has_markings = matches!(
        responses.get(&item.id, &ResponseKey::Field("markings".to_string())),
        Some(ResponseValue::Markings(markings)) if !markings.is_empty()
    );
    let has_description = present(
        responses,
        &item.id,
        &ResponseKey::Field("description".to_string()),
    );

    if has_markings || has_description {
        Ok(())
    } else {
        Err(Violation::new(
            &item.id,
            &item.question_text,
            "Mark the diagram or describe the area of concern",
        ))
    }
}

fn validate_mixed_controls(
    item: &QuestionItem,
    config: &MixedControlsConfig,
    responses: &ResponseStore,
) -> Result<(), Violation> {
    for (index, control) in config.controls.iter().enumerate() {
        if control.is_required && !present(responses, &item.id, &ResponseKey::Control(index)) {
            return Err(missing_field(item, &control.label));
        }
    }
    Ok(())
}

fn missing_field(item: &QuestionItem, label: &str) -> Violation {
    Violation::new(&item.id, label, format!("The field '{}' is required", label))
}

fn present(responses: &ResponseStore, question_id: &str, key: &ResponseKey) -> bool {
    responses
        .get(question_id, key)
        .map(|value| !value.is_blank())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_template;
    use crate::responses::BodyMarking;
    use crate::template::{FormTemplate, RawTemplate};
    use serde_json::json;

    fn one_item_template(item: serde_json::Value) -> FormTemplate {
        let raw = RawTemplate {
            id: Some("tmpl-1".to_string()),
            items: Some(json!([item])),
            ..RawTemplate::default()
        };
        normalize_template(raw).unwrap()
    }

    fn set_text(store: &mut ResponseStore, id: &str, key: ResponseKey, text: &str) {
        store
            .set(id, key, ResponseValue::Text(text.to_string()))
            .unwrap();
    }

    #[test]
    fn test_optional_item_always_passes() {
        let template = one_item_template(json!(
            {"id": "q1", "variant": "openAnswer", "questionText": "Anything else?"}
        ));
        let result = validate_item(
            &template.items[0],
            &ResponseStore::new(),
            &AttachmentStore::new(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_required_open_answer_needs_non_empty_text() {
        let template = one_item_template(json!(
            {"id": "q1", "variant": "openAnswer", "questionText": "Symptoms", "isRequired": true}
        ));
        let item = &template.items[0];
        let mut store = ResponseStore::new();
        let attachments = AttachmentStore::new();

        let violation = validate_item(item, &store, &attachments).unwrap_err();
        assert_eq!(violation.question_id, "q1");
        assert!(violation.message.contains("Symptoms"));

        set_text(&mut store, "q1", ResponseKey::Whole, "   ");
        assert!(validate_item(item, &store, &attachments).is_err());

        set_text(&mut store, "q1", ResponseKey::Whole, "headache");
        assert!(validate_item(item, &store, &attachments).is_ok());
    }

    #[test]
    fn test_required_without_answer_yields_first_field_only() {
        let template = one_item_template(json!(
            {"id": "demo", "variant": "demographics", "questionText": "About you", "isRequired": true}
        ));
        // Several fields are missing; only the first is reported.
        let violation = validate_item(
            &template.items[0],
            &ResponseStore::new(),
            &AttachmentStore::new(),
        )
        .unwrap_err();
        assert_eq!(violation.field, "First name");
    }

    #[test]
    fn test_demographics_assigned_doctor_mandatory_despite_flag() {
        let template = one_item_template(json!({
            "id": "demo",
            "variant": "demographics",
            "questionText": "About you",
            "isRequired": true,
            "fields": [
                {"name": "firstName", "label": "First name", "isRequired": true},
                {"name": "assignedDoctor", "label": "Assigned doctor", "isRequired": false}
            ]
        }));
        let item = &template.items[0];
        let mut store = ResponseStore::new();
        let attachments = AttachmentStore::new();
        set_text(&mut store, "demo", ResponseKey::Field("firstName".into()), "Ada");

        let violation = validate_item(item, &store, &attachments).unwrap_err();
        assert_eq!(violation.field, "Assigned doctor");

        set_text(
            &mut store,
            "demo",
            ResponseKey::Field("assignedDoctor".into()),
            "doc-9",
        );
        assert!(validate_item(item, &store, &attachments).is_ok());
    }

    #[test]
    fn test_demographics_assigned_doctor_checked_even_when_unlisted() {
        let template = one_item_template(json!({
            "id": "demo",
            "variant": "demographics",
            "questionText": "About you",
            "isRequired": true,
            "fields": [
                {"name": "firstName", "label": "First name", "isRequired": true}
            ]
        }));
        let item = &template.items[0];
        let mut store = ResponseStore::new();
        set_text(&mut store, "demo", ResponseKey::Field("firstName".into()), "Ada");

        let violation = validate_item(item, &store, &AttachmentStore::new()).unwrap_err();
        assert_eq!(violation.field, "Assigned doctor");
    }

    #[test]
    fn test_insurance_requires_flagged_fields_in_order() {
        let template = one_item_template(json!(
            {"id": "ins", "variant": "primaryInsurance", "questionText": "Primary insurance", "isRequired": true}
        ));
        let item = &template.items[0];
        let mut store = ResponseStore::new();
        let attachments = AttachmentStore::new();

        let violation = validate_item(item, &store, &attachments).unwrap_err();
        assert_eq!(violation.field, "Insurance carrier");

        set_text(
            &mut store,
            "ins",
            ResponseKey::Field("carrierName".into()),
            "Acme Health",
        );
        let violation = validate_item(item, &store, &attachments).unwrap_err();
        assert_eq!(violation.field, "Member ID");

        set_text(&mut store, "ins", ResponseKey::Field("memberId".into()), "M-1234");
        assert!(validate_item(item, &store, &attachments).is_ok());
    }

    #[test]
    fn test_multiple_choice_multiple_needs_non_empty_selection_list() {
        let template = one_item_template(json!(
            {"id": "q1", "variant": "multipleChoiceMultiple", "questionText": "Symptoms", "isRequired": true}
        ));
        let item = &template.items[0];
        let mut store = ResponseStore::new();
        let attachments = AttachmentStore::new();

        store
            .set("q1", ResponseKey::Whole, ResponseValue::Selections(vec![]))
            .unwrap();
        assert!(validate_item(item, &store, &attachments).is_err());

        store
            .set(
                "q1",
                ResponseKey::Whole,
                ResponseValue::Selections(vec!["Cough".into()]),
            )
            .unwrap();
        assert!(validate_item(item, &store, &attachments).is_ok());
    }

    #[test]
    fn test_file_attachment_requires_captured_file() {
        let template = one_item_template(json!(
            {"id": "q1", "variant": "fileAttachment", "questionText": "Insurance card", "isRequired": true}
        ));
        let item = &template.items[0];
        let store = ResponseStore::new();
        let mut attachments = AttachmentStore::new();

        assert!(validate_item(item, &store, &attachments).is_err());

        attachments
            .add(
                "q1",
                "card.png",
                None,
                vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
                &intake_attachments::AttachmentPolicy::default(),
            )
            .unwrap();
        assert!(validate_item(item, &store, &attachments).is_ok());
    }

    #[test]
    fn test_body_map_passes_on_markings_or_description() {
        let template = one_item_template(json!(
            {"id": "bm", "variant": "bodyMap", "questionText": "Where is the pain?", "isRequired": true}
        ));
        let item = &template.items[0];
        let attachments = AttachmentStore::new();

        let empty = ResponseStore::new();
        assert!(validate_item(item, &empty, &attachments).is_err());

        let mut with_markings = ResponseStore::new();
        with_markings
            .set(
                "bm",
                ResponseKey::Field("markings".into()),
                ResponseValue::Markings(vec![BodyMarking {
                    view: "front".into(),
                    x: 0.5,
                    y: 0.3,
                }]),
            )
            .unwrap();
        assert!(validate_item(item, &with_markings, &attachments).is_ok());

        let mut with_description = ResponseStore::new();
        set_text(
            &mut with_description,
            "bm",
            ResponseKey::Field("description".into()),
            "lower back, left side",
        );
        assert!(validate_item(item, &with_description, &attachments).is_ok());
    }

    #[test]
    fn test_mixed_controls_require_flagged_controls_only() {
        let template = one_item_template(json!({
            "id": "mc",
            "variant": "mixedControls",
            "questionText": "Pharmacy details",
            "isRequired": true,
            "controls": [
                {"label": "Pharmacy name", "kind": "text", "isRequired": true},
                {"label": "Notes", "kind": "text"}
            ]
        }));
        let item = &template.items[0];
        let mut store = ResponseStore::new();
        let attachments = AttachmentStore::new();

        let violation = validate_item(item, &store, &attachments).unwrap_err();
        assert_eq!(violation.field, "Pharmacy name");

        set_text(&mut store, "mc", ResponseKey::Control(0), "Main St Pharmacy");
        assert!(validate_item(item, &store, &attachments).is_ok());
    }

    #[test]
    fn test_required_matrix_accepts_partial_completion() {
        let template = one_item_template(json!({
            "id": "grid",
            "variant": "matrixSingleAnswer",
            "questionText": "How often?",
            "isRequired": true,
            "rows": ["Headache", "Nausea", "Fatigue"],
            "columns": ["Never", "Sometimes", "Often"]
        }));
        assert!(validate_item(
            &template.items[0],
            &ResponseStore::new(),
            &AttachmentStore::new()
        )
        .is_ok());
    }
}
