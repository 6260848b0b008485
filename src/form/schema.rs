//! Declarative description of the registration form.
//!
//! A schema is an ordered list of steps, each holding an ordered list of field
//! definitions. Schemas are plain JSON documents so the engine is not tied to a
//! particular form; the bundled Udyam form is loaded with [`FormSchema::udyam`].
//!
//! Steps are addressed 1-based, matching how the form is presented ("Step 1 of 2").

use super::error::SchemaError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::collections::HashSet;

const UDYAM_SCHEMA_JSON: &str = include_str!("udyam.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Checkbox,
}

/// A compiled validation pattern.
///
/// The expression is used as written: anchors (`^`, `$`) are part of the pattern
/// text, nothing is added implicitly.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile a pattern.
    ///
    /// # Errors
    /// Returns an error if `source` is not a valid regular expression.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::new(&source).map_err(|err| de::Error::custom(format!("invalid pattern {source:?}: {err}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: String,
    /// Key under which the value is stored in the form state.
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub validation: ValidationRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub help_text: Vec<String>,
    /// Hidden and skipped by step validation until an OTP has been sent.
    #[serde(default)]
    pub conditional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSchema {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Short name shown in the progress indicator, defaults to the title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_label: Option<String>,
    pub fields: Vec<FieldDefinition>,
}

impl StepSchema {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    #[must_use]
    pub fn progress_label(&self) -> &str {
        self.progress_label.as_deref().unwrap_or(&self.title)
    }

    /// Fields that must hold a value before an OTP can be requested: every
    /// field that is not itself gated on the OTP.
    pub fn otp_prerequisites(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|field| !field.conditional)
    }

    pub fn conditional_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|field| field.conditional)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    steps: Vec<StepSchema>,
}

impl FormSchema {
    /// Build a schema from steps, checking structural invariants.
    ///
    /// # Errors
    /// Returns an error if there are no steps, a step has no fields, or a field
    /// `name`/`id` repeats within a step.
    pub fn new(steps: Vec<StepSchema>) -> Result<Self, SchemaError> {
        if steps.is_empty() {
            return Err(SchemaError::NoSteps);
        }

        for (index, step) in steps.iter().enumerate() {
            let number = index + 1;
            if step.fields.is_empty() {
                return Err(SchemaError::EmptyStep(number));
            }

            let mut names = HashSet::new();
            let mut ids = HashSet::new();
            for field in &step.fields {
                if !names.insert(field.name.as_str()) {
                    return Err(SchemaError::DuplicateName {
                        step: number,
                        name: field.name.clone(),
                    });
                }
                if !ids.insert(field.id.as_str()) {
                    return Err(SchemaError::DuplicateId {
                        step: number,
                        id: field.id.clone(),
                    });
                }
            }
        }

        Ok(Self { steps })
    }

    /// Parse and check a JSON schema document.
    ///
    /// # Errors
    /// Returns an error if the document is malformed, contains an invalid
    /// pattern, or violates the invariants checked by [`FormSchema::new`].
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let raw: Self = serde_json::from_str(json)?;
        Self::new(raw.steps)
    }

    /// The bundled two-step Udyam registration form.
    ///
    /// # Errors
    /// Returns an error if the bundled document fails to load.
    pub fn udyam() -> Result<Self, SchemaError> {
        Self::from_json(UDYAM_SCHEMA_JSON)
    }

    /// Look up a step by its 1-based number.
    #[must_use]
    pub fn step(&self, number: usize) -> Option<&StepSchema> {
        number.checked_sub(1).and_then(|index| self.steps.get(index))
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepSchema> {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn udyam_schema_loads() -> Result<()> {
        let schema = FormSchema::udyam()?;
        assert_eq!(schema.step_count(), 2);

        let step1 = schema.step(1).ok_or_else(|| anyhow::anyhow!("missing step 1"))?;
        let names: Vec<&str> = step1.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["aadhaar", "entrepreneurName", "consent", "otp"]);
        assert_eq!(step1.progress_label(), "Aadhaar");

        let aadhaar = step1.field("aadhaar").ok_or_else(|| anyhow::anyhow!("no aadhaar"))?;
        assert_eq!(aadhaar.help_text.len(), 3);
        assert_eq!(
            aadhaar.validation.pattern.as_ref().map(Pattern::as_str),
            Some("^[0-9]{12}$")
        );

        let consent = step1.field("consent").ok_or_else(|| anyhow::anyhow!("no consent"))?;
        assert_eq!(consent.kind, FieldKind::Checkbox);

        let otp = step1.field("otp").ok_or_else(|| anyhow::anyhow!("no otp"))?;
        assert!(otp.conditional);

        let step2 = schema.step(2).ok_or_else(|| anyhow::anyhow!("missing step 2"))?;
        assert!(step2.subtitle.is_none());
        assert_eq!(step2.progress_label(), "PAN Details");
        Ok(())
    }

    #[test]
    fn otp_prerequisites_skip_conditional_fields() -> Result<()> {
        let schema = FormSchema::udyam()?;
        let step1 = schema.step(1).ok_or_else(|| anyhow::anyhow!("missing step 1"))?;
        let names: Vec<&str> = step1.otp_prerequisites().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["aadhaar", "entrepreneurName", "consent"]);
        Ok(())
    }

    #[test]
    fn step_numbers_are_one_based() -> Result<()> {
        let schema = FormSchema::udyam()?;
        assert!(schema.step(0).is_none());
        assert!(schema.step(3).is_none());
        assert_eq!(schema.step(2).map(|s| s.title.as_str()), Some("Enterprise Details"));
        Ok(())
    }

    #[test]
    fn rejects_duplicate_names() {
        let json = r#"{"steps":[{"title":"t","fields":[
            {"id":"a","name":"same","label":"A","type":"text"},
            {"id":"b","name":"same","label":"B","type":"text"}
        ]}]}"#;
        let result = FormSchema::from_json(json);
        assert!(matches!(
            result,
            Err(SchemaError::DuplicateName { step: 1, ref name }) if name == "same"
        ));
    }

    #[test]
    fn rejects_invalid_pattern() {
        let json = r#"{"steps":[{"title":"t","fields":[
            {"id":"a","name":"a","label":"A","type":"text","validation":{"pattern":"[0-9"}}
        ]}]}"#;
        assert!(matches!(FormSchema::from_json(json), Err(SchemaError::Json(_))));
    }

    #[test]
    fn rejects_empty_documents() {
        assert!(matches!(
            FormSchema::from_json(r#"{"steps":[]}"#),
            Err(SchemaError::NoSteps)
        ));
        assert!(matches!(
            FormSchema::from_json(r#"{"steps":[{"title":"t","fields":[]}]}"#),
            Err(SchemaError::EmptyStep(1))
        ));
    }

    #[test]
    fn validation_defaults_when_omitted() -> Result<()> {
        let json = r#"{"steps":[{"title":"t","fields":[
            {"id":"nick","name":"nick","label":"Nickname","type":"text"}
        ]}]}"#;
        let schema = FormSchema::from_json(json)?;
        let field = schema
            .step(1)
            .and_then(|s| s.field("nick"))
            .ok_or_else(|| anyhow::anyhow!("missing field"))?;
        assert_eq!(field.validation, ValidationRule::default());
        assert!(!field.conditional);
        Ok(())
    }
}
