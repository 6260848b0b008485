use super::state::Phase;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema has no steps")]
    NoSteps,
    #[error("step {0} has no fields")]
    EmptyStep(usize),
    #[error("step {step} declares field name `{name}` more than once")]
    DuplicateName { step: usize, name: String },
    #[error("step {step} declares field id `{id}` more than once")]
    DuplicateId { step: usize, id: String },
}

/// Misuse of the form state machine.
///
/// Field validation failures are not errors; they are recorded in the form
/// state and reported through [`super::Gate::Blocked`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("another operation is still in flight")]
    Busy,
    #[error("{action} is not available while {phase}")]
    NotAllowed { action: &'static str, phase: Phase },
    #[error("no {0} operation is pending")]
    NotPending(&'static str),
    #[error("field `{name}` is not part of step {step}")]
    UnknownField { name: String, step: usize },
}
