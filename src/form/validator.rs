//! Per-field validation.

use super::schema::{FieldDefinition, FieldKind, ValidationRule};
use serde::{Deserialize, Serialize};

pub const REQUIRED_FALLBACK: &str = "This field is required";
pub const FORMAT_FALLBACK: &str = "Invalid format";

/// A value entered into a field: text inputs hold strings, checkboxes hold flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl FieldValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Flag(_) => None,
        }
    }

    #[must_use]
    pub const fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Non-empty text for a text field. A value of the wrong kind counts as absent.
fn filled_text<'a>(field: &FieldDefinition, value: Option<&'a FieldValue>) -> Option<&'a str> {
    match (field.kind, value) {
        (FieldKind::Text, Some(FieldValue::Text(text))) if !text.is_empty() => Some(text.as_str()),
        _ => None,
    }
}

/// Whether the field holds a usable value: non-empty text, or a checked box.
#[must_use]
pub fn is_present(field: &FieldDefinition, value: Option<&FieldValue>) -> bool {
    match field.kind {
        FieldKind::Text => filled_text(field, value).is_some(),
        FieldKind::Checkbox => matches!(value, Some(FieldValue::Flag(true))),
    }
}

fn message_or(rule: &ValidationRule, fallback: &str) -> String {
    if rule.message.is_empty() {
        fallback.to_string()
    } else {
        rule.message.clone()
    }
}

/// Validate one value against its field definition.
///
/// Returns the error message to show, or `None` when the value is acceptable.
/// Patterns only apply to text fields that hold a value, so an optional field
/// left empty never fails.
#[must_use]
pub fn validate(field: &FieldDefinition, value: Option<&FieldValue>) -> Option<String> {
    let rule = &field.validation;

    if rule.required && !is_present(field, value) {
        return Some(message_or(rule, REQUIRED_FALLBACK));
    }

    if let (Some(pattern), Some(text)) = (&rule.pattern, filled_text(field, value)) {
        if !pattern.is_match(text) {
            return Some(message_or(rule, FORMAT_FALLBACK));
        }
    }

    None
}
