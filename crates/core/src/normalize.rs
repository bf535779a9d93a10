//! Template normalization.
//!
//! Raw template documents are written by hand in an admin screen and come
//! back with whatever the author bothered to fill in: items without ids,
//! questions without a variant tag, file questions without constraints.
//! This module coerces every item into the canonical shape exactly once,
//! at session start; nothing downstream ever sees a raw item.
//!
//! Variant inference is a best-effort keyword classifier over the question
//! text, not authoritative input. Precedence (first match wins): explicit
//! recognised variant tag, `(section)` marker, upload/image keyword,
//! signature keyword, multi-select phrase, language-preference phrase,
//! open answer.

use intake_attachments::AttachmentPolicy;
use std::collections::HashSet;
use uuid::Uuid;

use crate::language::is_language_selector;
use crate::template::{
    BodyMapConfig, ChoiceConfig, ControlKind, DemographicsConfig, FormTemplate, InsuranceConfig,
    MatrixConfig, MixedControl, MixedControlsConfig, QuestionConfig, QuestionItem, QuestionVariant,
    RawControl, RawQuestionItem, RawSubField, RawTemplate, SubField,
};
use crate::{IntakeError, IntakeResult};

/// Placeholder prompt for items that arrive without text.
const UNTITLED_QUESTION: &str = "Untitled question";

/// Options offered by the language-preference selector when the template
/// author supplied none.
const LANGUAGE_OPTIONS: [&str; 2] = ["English", "Español"];

/// Normalizes a raw template document into a canonical [`FormTemplate`].
///
/// Every item receives a stable id (generated when absent), a non-empty
/// prompt, a variant tag, and fully-populated variant configuration.
/// Defaults are filled only where the raw item is silent.
///
/// # Errors
///
/// Returns `IntakeError::MalformedTemplate` if the item list is missing or
/// not an array, an element is not an object, or two items carry the same
/// explicit id. No partial template is produced.
pub fn normalize_template(raw: RawTemplate) -> IntakeResult<FormTemplate> {
    let items_value = raw
        .items
        .ok_or_else(|| IntakeError::MalformedTemplate("template has no items list".into()))?;

    let raw_items = items_value
        .as_array()
        .ok_or_else(|| IntakeError::MalformedTemplate("items is not a sequence".into()))?;

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut items = Vec::with_capacity(raw_items.len());

    for (position, value) in raw_items.iter().enumerate() {
        let raw_item: RawQuestionItem = serde_json::from_value(value.clone()).map_err(|e| {
            IntakeError::MalformedTemplate(format!("item {} is not a question object: {}", position, e))
        })?;

        let item = normalize_item(raw_item)?;

        if !seen_ids.insert(item.id.clone()) {
            return Err(IntakeError::MalformedTemplate(format!(
                "duplicate question id '{}'",
                item.id
            )));
        }

        items.push(item);
    }

    Ok(FormTemplate {
        id: raw.id.unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
        title: raw.title.unwrap_or_else(|| "Intake form".to_string()),
        is_active: raw.is_active.unwrap_or(true),
        is_public: raw.is_public.unwrap_or(false),
        locale: raw.locale,
        items,
    })
}

fn normalize_item(raw: RawQuestionItem) -> IntakeResult<QuestionItem> {
    let id = raw
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let question_text = raw
        .question_text
        .clone()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| UNTITLED_QUESTION.to_string());

    let variant = infer_variant(raw.variant.as_deref(), &question_text);

    let config = build_config(variant, &question_text, &raw);

    Ok(QuestionItem {
        id,
        question_text,
        instructions: raw.instructions.filter(|text| !text.trim().is_empty()),
        is_required: raw.is_required.unwrap_or(false),
        config,
    })
}

/// Infers a variant tag, first from the explicit tag, then from keyword
/// heuristics over the question text. First match wins.
fn infer_variant(explicit: Option<&str>, question_text: &str) -> QuestionVariant {
    if let Some(tag) = explicit {
        if let Some(variant) = QuestionVariant::from_wire(tag) {
            return variant;
        }
        tracing::warn!(tag, "unrecognised variant tag, falling back to heuristics");
    }

    let lowered = question_text.to_lowercase();

    if lowered.contains("(section)") {
        QuestionVariant::Section
    } else if lowered.contains("upload") || lowered.contains("image") {
        QuestionVariant::FileAttachment
    } else if lowered.contains("signature") {
        QuestionVariant::ESignature
    } else if lowered.contains("select all that apply") || lowered.contains("check all") {
        QuestionVariant::MultipleChoiceMultiple
    } else if is_language_selector(question_text) {
        QuestionVariant::MultipleChoiceSingle
    } else {
        QuestionVariant::OpenAnswer
    }
}

/// Builds the variant configuration, taking raw values where present and
/// filling variant defaults where not.
fn build_config(variant: QuestionVariant, question_text: &str, raw: &RawQuestionItem) -> QuestionConfig {
    match variant {
        QuestionVariant::Section => QuestionConfig::Section,
        QuestionVariant::OpenAnswer => QuestionConfig::OpenAnswer,
        QuestionVariant::SmartEditor => QuestionConfig::SmartEditor,
        QuestionVariant::Date => QuestionConfig::Date,
        QuestionVariant::ESignature => QuestionConfig::ESignature,
        QuestionVariant::Demographics => QuestionConfig::Demographics(
            match sub_fields(&raw.fields) {
                Some(fields) => DemographicsConfig { fields },
                None => DemographicsConfig::default(),
            },
        ),
        QuestionVariant::PrimaryInsurance => QuestionConfig::PrimaryInsurance(
            match sub_fields(&raw.fields) {
                Some(fields) => InsuranceConfig { fields },
                None => InsuranceConfig::default(),
            },
        ),
        QuestionVariant::SecondaryInsurance => QuestionConfig::SecondaryInsurance(
            match sub_fields(&raw.fields) {
                Some(fields) => InsuranceConfig { fields },
                None => InsuranceConfig::default(),
            },
        ),
        QuestionVariant::Matrix => QuestionConfig::Matrix(matrix_config(raw)),
        QuestionVariant::MatrixSingleAnswer => {
            QuestionConfig::MatrixSingleAnswer(matrix_config(raw))
        }
        QuestionVariant::MultipleChoiceSingle => {
            QuestionConfig::MultipleChoiceSingle(choice_config(question_text, raw))
        }
        QuestionVariant::MultipleChoiceMultiple => {
            QuestionConfig::MultipleChoiceMultiple(choice_config(question_text, raw))
        }
        QuestionVariant::FileAttachment => {
            let defaults = AttachmentPolicy::default();
            QuestionConfig::FileAttachment(AttachmentPolicy {
                allowed_media_types: raw
                    .allowed_media_types
                    .clone()
                    .filter(|types| !types.is_empty())
                    .unwrap_or(defaults.allowed_media_types),
                max_file_size_mb: raw.max_file_size_mb.unwrap_or(defaults.max_file_size_mb),
            })
        }
        QuestionVariant::BodyMap => {
            let defaults = BodyMapConfig::default();
            QuestionConfig::BodyMap(BodyMapConfig {
                diagram: raw.diagram.clone().unwrap_or(defaults.diagram),
                markings_enabled: raw.markings_enabled.unwrap_or(defaults.markings_enabled),
            })
        }
        QuestionVariant::MixedControls => QuestionConfig::MixedControls(MixedControlsConfig {
            controls: raw
                .controls
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .map(control)
                .collect(),
        }),
    }
}

fn sub_fields(raw: &Option<Vec<RawSubField>>) -> Option<Vec<SubField>> {
    let raw = raw.as_ref().filter(|fields| !fields.is_empty())?;
    Some(
        raw.iter()
            .enumerate()
            .map(|(index, field)| {
                let name = field
                    .name
                    .clone()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| format!("field{}", index));
                let label = field.label.clone().unwrap_or_else(|| name.clone());
                SubField {
                    name,
                    label,
                    is_required: field.is_required.unwrap_or(false),
                }
            })
            .collect(),
    )
}

fn matrix_config(raw: &RawQuestionItem) -> MatrixConfig {
    MatrixConfig {
        rows: raw.rows.clone().unwrap_or_default(),
        columns: raw.columns.clone().unwrap_or_default(),
    }
}

fn choice_config(question_text: &str, raw: &RawQuestionItem) -> ChoiceConfig {
    if let Some(options) = raw.options.clone().filter(|options| !options.is_empty()) {
        return ChoiceConfig { options };
    }
    if is_language_selector(question_text) {
        return ChoiceConfig {
            options: LANGUAGE_OPTIONS.iter().map(|s| s.to_string()).collect(),
        };
    }
    ChoiceConfig::default()
}

fn control(raw: &RawControl) -> MixedControl {
    let kind = match raw.kind.as_deref() {
        Some("dropdown") => ControlKind::Dropdown(raw.options.clone().unwrap_or_default()),
        Some("checkbox") => ControlKind::Checkbox,
        Some("date") => ControlKind::Date,
        _ => ControlKind::Text,
    };
    MixedControl {
        label: raw.label.clone().unwrap_or_else(|| "Untitled".to_string()),
        kind,
        is_required: raw.is_required.unwrap_or(false),
    }
}
