//! Question and template models.
//!
//! A template arrives from the collaborator as loosely-typed JSON
//! ([`RawTemplate`]) and is coerced exactly once, by the normalizer, into
//! the canonical [`FormTemplate`] consumed by the rest of the engine.
//!
//! Key types:
//! - [`QuestionVariant`]: the closed set of question kinds, used as a
//!   dispatch tag by validation and assembly.
//! - [`QuestionConfig`]: tagged union carrying variant-specific
//!   configuration, one case per variant.
//! - [`QuestionItem`]: one step of the wizard.

use intake_attachments::AttachmentPolicy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Tag identifying the kind of a question item.
///
/// Serialises to the camelCase names used on the wire (`openAnswer`,
/// `matrixSingleAnswer`, ...). The tag is derived once at normalization
/// time and never changes afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuestionVariant {
    /// Heading with no answer of its own
    Section,
    /// Free-text answer
    OpenAnswer,
    /// Patient demographic sub-fields
    Demographics,
    /// Primary insurance sub-fields
    PrimaryInsurance,
    /// Secondary insurance sub-fields
    SecondaryInsurance,
    /// Grid allowing several selections per row
    Matrix,
    /// Grid allowing one selection per row
    MatrixSingleAnswer,
    /// Pick exactly one option
    MultipleChoiceSingle,
    /// Pick any number of options
    MultipleChoiceMultiple,
    /// Binary file upload
    FileAttachment,
    /// Typed-name signature
    ESignature,
    /// Anatomical diagram with markings
    BodyMap,
    /// Rich-text editor answer
    SmartEditor,
    /// Calendar date answer
    Date,
    /// Heterogeneous group of small controls
    MixedControls,
}

impl QuestionVariant {
    /// Wire name of this variant.
    pub fn as_wire(self) -> &'static str {
        match self {
            QuestionVariant::Section => "section",
            QuestionVariant::OpenAnswer => "openAnswer",
            QuestionVariant::Demographics => "demographics",
            QuestionVariant::PrimaryInsurance => "primaryInsurance",
            QuestionVariant::SecondaryInsurance => "secondaryInsurance",
            QuestionVariant::Matrix => "matrix",
            QuestionVariant::MatrixSingleAnswer => "matrixSingleAnswer",
            QuestionVariant::MultipleChoiceSingle => "multipleChoiceSingle",
            QuestionVariant::MultipleChoiceMultiple => "multipleChoiceMultiple",
            QuestionVariant::FileAttachment => "fileAttachment",
            QuestionVariant::ESignature => "eSignature",
            QuestionVariant::BodyMap => "bodyMap",
            QuestionVariant::SmartEditor => "smartEditor",
            QuestionVariant::Date => "date",
            QuestionVariant::MixedControls => "mixedControls",
        }
    }

    /// Parse a wire name into a variant tag.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "section" => Some(QuestionVariant::Section),
            "openAnswer" => Some(QuestionVariant::OpenAnswer),
            "demographics" => Some(QuestionVariant::Demographics),
            "primaryInsurance" => Some(QuestionVariant::PrimaryInsurance),
            "secondaryInsurance" => Some(QuestionVariant::SecondaryInsurance),
            "matrix" => Some(QuestionVariant::Matrix),
            "matrixSingleAnswer" => Some(QuestionVariant::MatrixSingleAnswer),
            "multipleChoiceSingle" => Some(QuestionVariant::MultipleChoiceSingle),
            "multipleChoiceMultiple" => Some(QuestionVariant::MultipleChoiceMultiple),
            "fileAttachment" => Some(QuestionVariant::FileAttachment),
            "eSignature" => Some(QuestionVariant::ESignature),
            "bodyMap" => Some(QuestionVariant::BodyMap),
            "smartEditor" => Some(QuestionVariant::SmartEditor),
            "date" => Some(QuestionVariant::Date),
            "mixedControls" => Some(QuestionVariant::MixedControls),
            _ => None,
        }
    }
}

impl fmt::Display for QuestionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

impl Serialize for QuestionVariant {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for QuestionVariant {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        QuestionVariant::from_wire(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown variant '{}'", s)))
    }
}

/// Options for single- and multiple-choice questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceConfig {
    pub options: Vec<String>,
}

impl Default for ChoiceConfig {
    fn default() -> Self {
        Self {
            options: vec!["Yes".to_string(), "No".to_string()],
        }
    }
}

/// Row/column geometry for matrix questions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
}

/// One sub-field of a demographics or insurance question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubField {
    /// Stable key the sub-field's answer is stored under
    pub name: String,
    /// Label shown to the patient
    pub label: String,
    #[serde(default)]
    pub is_required: bool,
}

impl SubField {
    pub fn new(name: &str, label: &str, is_required: bool) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            is_required,
        }
    }
}

/// Sub-field name the assigned-doctor selection is stored under.
///
/// A demographics answer without this field cannot produce a patient
/// record, so validation treats it as mandatory no matter how the
/// sub-field itself is flagged.
pub const ASSIGNED_DOCTOR_FIELD: &str = "assignedDoctor";

/// Demographic sub-field descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicsConfig {
    pub fields: Vec<SubField>,
}

impl Default for DemographicsConfig {
    fn default() -> Self {
        Self {
            fields: vec![
                SubField::new("firstName", "First name", true),
                SubField::new("lastName", "Last name", true),
                SubField::new("dateOfBirth", "Date of birth", true),
                SubField::new("gender", "Gender", false),
                SubField::new("phone", "Phone number", false),
                SubField::new("email", "Email", false),
                SubField::new("addressLine1", "Street address", false),
                SubField::new("city", "City", false),
                SubField::new("state", "State", false),
                SubField::new("postalCode", "Postal code", false),
                SubField::new(ASSIGNED_DOCTOR_FIELD, "Assigned doctor", true),
            ],
        }
    }
}

/// Insurance sub-field descriptors, shared by primary and secondary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceConfig {
    pub fields: Vec<SubField>,
}

impl Default for InsuranceConfig {
    fn default() -> Self {
        Self {
            fields: vec![
                SubField::new("carrierName", "Insurance carrier", true),
                SubField::new("memberId", "Member ID", true),
                SubField::new("groupNumber", "Group number", false),
                SubField::new("planHolderName", "Plan holder name", false),
                SubField::new("planHolderDateOfBirth", "Plan holder date of birth", false),
            ],
        }
    }
}

/// Body-map diagram configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyMapConfig {
    /// Diagram identifier shown behind the markings layer
    pub diagram: String,
    /// Whether the patient may place markings (as opposed to text only)
    pub markings_enabled: bool,
}

impl Default for BodyMapConfig {
    fn default() -> Self {
        Self {
            diagram: "full-body".to_string(),
            markings_enabled: true,
        }
    }
}

/// Input kind of one mixed control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    Text,
    Dropdown(Vec<String>),
    Checkbox,
    Date,
}

/// One sub-control of a mixed-controls question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedControl {
    pub label: String,
    pub kind: ControlKind,
    #[serde(default)]
    pub is_required: bool,
}

/// Mixed-control descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixedControlsConfig {
    pub controls: Vec<MixedControl>,
}

/// Variant-specific configuration, one case per variant.
///
/// Validation and assembly dispatch on this union independently; no single
/// conditional chain is shared between them.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionConfig {
    Section,
    OpenAnswer,
    SmartEditor,
    Date,
    ESignature,
    Demographics(DemographicsConfig),
    PrimaryInsurance(InsuranceConfig),
    SecondaryInsurance(InsuranceConfig),
    Matrix(MatrixConfig),
    MatrixSingleAnswer(MatrixConfig),
    MultipleChoiceSingle(ChoiceConfig),
    MultipleChoiceMultiple(ChoiceConfig),
    FileAttachment(AttachmentPolicy),
    BodyMap(BodyMapConfig),
    MixedControls(MixedControlsConfig),
}

impl QuestionConfig {
    /// The dispatch tag for this configuration.
    pub fn variant(&self) -> QuestionVariant {
        match self {
            QuestionConfig::Section => QuestionVariant::Section,
            QuestionConfig::OpenAnswer => QuestionVariant::OpenAnswer,
            QuestionConfig::SmartEditor => QuestionVariant::SmartEditor,
            QuestionConfig::Date => QuestionVariant::Date,
            QuestionConfig::ESignature => QuestionVariant::ESignature,
            QuestionConfig::Demographics(_) => QuestionVariant::Demographics,
            QuestionConfig::PrimaryInsurance(_) => QuestionVariant::PrimaryInsurance,
            QuestionConfig::SecondaryInsurance(_) => QuestionVariant::SecondaryInsurance,
            QuestionConfig::Matrix(_) => QuestionVariant::Matrix,
            QuestionConfig::MatrixSingleAnswer(_) => QuestionVariant::MatrixSingleAnswer,
            QuestionConfig::MultipleChoiceSingle(_) => QuestionVariant::MultipleChoiceSingle,
            QuestionConfig::MultipleChoiceMultiple(_) => QuestionVariant::MultipleChoiceMultiple,
            QuestionConfig::FileAttachment(_) => QuestionVariant::FileAttachment,
            QuestionConfig::BodyMap(_) => QuestionVariant::BodyMap,
            QuestionConfig::MixedControls(_) => QuestionVariant::MixedControls,
        }
    }
}

/// One step of the form.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionItem {
    /// Stable identifier, unique within a template
    pub id: String,
    /// Prompt shown to the patient
    pub question_text: String,
    /// Optional helper text under the prompt
    pub instructions: Option<String>,
    /// Whether an answer is required before advancing
    pub is_required: bool,
    /// Variant-specific configuration
    pub config: QuestionConfig,
}

impl QuestionItem {
    /// The item's variant tag.
    pub fn variant(&self) -> QuestionVariant {
        self.config.variant()
    }
}

/// Normalized, canonical template: ordered items plus metadata.
///
/// Fetched once per session and treated as immutable for the session's
/// duration.
#[derive(Debug, Clone, PartialEq)]
pub struct FormTemplate {
    pub id: String,
    pub title: String,
    pub is_active: bool,
    pub is_public: bool,
    pub locale: Option<String>,
    pub items: Vec<QuestionItem>,
}

/// Loosely-typed wire mirror of a template document.
///
/// Every field is optional; the normalizer decides what each absence
/// means. `items` stays an untyped JSON value so a missing or non-array
/// list is reported as a malformed template rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTemplate {
    pub id: Option<String>,
    pub title: Option<String>,
    pub is_active: Option<bool>,
    pub is_public: Option<bool>,
    pub locale: Option<String>,
    pub items: Option<serde_json::Value>,
}

/// Loosely-typed wire mirror of one question item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawQuestionItem {
    pub id: Option<String>,
    pub variant: Option<String>,
    pub question_text: Option<String>,
    pub instructions: Option<String>,
    pub is_required: Option<bool>,
    pub options: Option<Vec<String>>,
    pub fields: Option<Vec<RawSubField>>,
    pub rows: Option<Vec<String>>,
    pub columns: Option<Vec<String>>,
    pub allowed_media_types: Option<Vec<String>>,
    pub max_file_size_mb: Option<u64>,
    pub diagram: Option<String>,
    pub markings_enabled: Option<bool>,
    pub controls: Option<Vec<RawControl>>,
}

/// Loosely-typed sub-field descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSubField {
    pub name: Option<String>,
    pub label: Option<String>,
    pub is_required: Option<bool>,
}

/// Loosely-typed mixed-control descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawControl {
    pub label: Option<String>,
    pub kind: Option<String>,
    pub options: Option<Vec<String>>,
    pub is_required: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_wire_names_round_trip() {
        let variants = [
            QuestionVariant::Section,
            QuestionVariant::OpenAnswer,
            QuestionVariant::Demographics,
            QuestionVariant::PrimaryInsurance,
            QuestionVariant::SecondaryInsurance,
            QuestionVariant::Matrix,
            QuestionVariant::MatrixSingleAnswer,
            QuestionVariant::MultipleChoiceSingle,
            QuestionVariant::MultipleChoiceMultiple,
            QuestionVariant::FileAttachment,
            QuestionVariant::ESignature,
            QuestionVariant::BodyMap,
            QuestionVariant::SmartEditor,
            QuestionVariant::Date,
            QuestionVariant::MixedControls,
        ];
        for variant in variants {
            assert_eq!(QuestionVariant::from_wire(variant.as_wire()), Some(variant));
        }
    }

    #[test]
    fn test_variant_rejects_unknown_wire_name() {
        assert_eq!(QuestionVariant::from_wire("carousel"), None);
    }

    #[test]
    fn test_variant_serialises_as_wire_string() {
        let json = serde_json::to_string(&QuestionVariant::MatrixSingleAnswer).unwrap();
        assert_eq!(json, "\"matrixSingleAnswer\"");
    }

    #[test]
    fn test_choice_config_defaults_to_yes_no() {
        assert_eq!(ChoiceConfig::default().options, vec!["Yes", "No"]);
    }

    #[test]
    fn test_demographics_default_includes_assigned_doctor() {
        let config = DemographicsConfig::default();
        assert!(config
            .fields
            .iter()
            .any(|f| f.name == ASSIGNED_DOCTOR_FIELD && f.is_required));
    }

    #[test]
    fn test_raw_item_tolerates_unknown_and_missing_fields() {
        let raw: RawQuestionItem = serde_json::from_value(serde_json::json!({
            "questionText": "Anything else?",
            "somethingServerSide": 42
        }))
        .unwrap();
        assert_eq!(raw.question_text.as_deref(), Some("Anything else?"));
        assert!(raw.id.is_none());
    }
}
