//! Pure mapping from form state to a serializable view.
//!
//! Nothing here validates or mutates; views only reflect what the state
//! machine recorded. Front ends (HTML templates, a TUI, the `form` binary)
//! consume the JSON form of [`StepView`].

use super::{
    schema::{FieldDefinition, FieldKind, FormSchema, StepSchema},
    state::{FormState, Notice, Phase},
    validator::{FieldValue, is_present},
};
use serde::Serialize;

const DEFAULT_HEADING: &str = "UDYAM REGISTRATION FORM";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldView {
    #[serde(rename_all = "camelCase")]
    Text {
        id: String,
        name: String,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        value: String,
        required: bool,
        filled: bool,
        disabled: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        help_text: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Checkbox {
        id: String,
        name: String,
        label: String,
        checked: bool,
        disabled: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl FieldView {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::Checkbox { name, .. } => name,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Text { error, .. } | Self::Checkbox { error, .. } => error.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    SendOtp,
    VerifyOtp,
    /// Submit an intermediate step.
    Continue,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionView {
    pub kind: ActionKind,
    pub label: &'static str,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub step: usize,
    pub label: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeView {
    pub message: &'static str,
    pub failure: bool,
}

impl From<Notice> for NoticeView {
    fn from(notice: Notice) -> Self {
        Self {
            message: notice.message(),
            failure: notice.is_failure(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub step: usize,
    pub step_count: usize,
    pub phase: Phase,
    pub title: String,
    pub heading: String,
    pub badge: String,
    pub fields: Vec<FieldView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionView>,
    pub progress: Vec<ProgressView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<NoticeView>,
}

/// Render one field. Returns `None` for a conditional field whose gate is closed.
#[must_use]
pub fn render_field(
    field: &FieldDefinition,
    value: Option<&FieldValue>,
    error: Option<&str>,
    loading: bool,
    otp_sent: bool,
) -> Option<FieldView> {
    if field.conditional && !otp_sent {
        return None;
    }

    let error = error.map(str::to_string);
    let view = match field.kind {
        FieldKind::Text => FieldView::Text {
            id: field.id.clone(),
            name: field.name.clone(),
            label: field.label.clone(),
            placeholder: field.placeholder.clone(),
            value: value
                .and_then(FieldValue::as_text)
                .unwrap_or_default()
                .to_string(),
            required: field.validation.required,
            filled: is_present(field, value),
            disabled: loading,
            help_text: field.help_text.clone(),
            error,
        },
        FieldKind::Checkbox => FieldView::Checkbox {
            id: field.id.clone(),
            name: field.name.clone(),
            label: field.label.clone(),
            checked: value.and_then(FieldValue::as_flag).unwrap_or(false),
            disabled: loading,
            error,
        },
    };
    Some(view)
}

fn action(schema: &FormSchema, step: &StepSchema, state: &FormState) -> Option<ActionView> {
    let loading = state.loading();
    let filled = |field: &FieldDefinition| is_present(field, state.value(&field.name));

    let (kind, label, disabled) = match state.phase() {
        Phase::Completed => return None,
        Phase::Step1Collecting => (
            ActionKind::SendOtp,
            if loading { "Validating..." } else { "Validate & Generate OTP" },
            !step.otp_prerequisites().all(filled),
        ),
        Phase::Step1OtpSent => (
            ActionKind::VerifyOtp,
            if loading { "Verifying..." } else { "Verify OTP" },
            !step.conditional_fields().all(filled),
        ),
        Phase::StepCollecting(current) if current < schema.step_count() => (
            ActionKind::Continue,
            if loading { "Submitting..." } else { "Continue" },
            false,
        ),
        Phase::StepCollecting(_) => (
            ActionKind::Complete,
            if loading { "Submitting..." } else { "Complete Registration" },
            false,
        ),
    };

    Some(ActionView {
        kind,
        label,
        disabled: loading || disabled,
    })
}

/// Render the active step of `state`.
///
/// Returns `None` only if the state points past the end of `schema`, which
/// cannot happen for a state driven through this crate's transitions.
#[must_use]
pub fn render_step(schema: &FormSchema, state: &FormState) -> Option<StepView> {
    let current = state.current_step();
    let step = schema.step(current)?;

    let fields = step
        .fields
        .iter()
        .filter_map(|field| {
            render_field(
                field,
                state.value(&field.name),
                state.error(&field.name),
                state.loading(),
                state.otp_sent(),
            )
        })
        .collect();

    let progress = schema
        .steps()
        .enumerate()
        .map(|(index, s)| ProgressView {
            step: index + 1,
            label: s.progress_label().to_string(),
            completed: current > index,
        })
        .collect();

    Some(StepView {
        step: current,
        step_count: schema.step_count(),
        phase: state.phase(),
        title: step.title.clone(),
        heading: step
            .subtitle
            .clone()
            .unwrap_or_else(|| DEFAULT_HEADING.to_string()),
        badge: format!("Step {current} of {}", schema.step_count()),
        fields,
        action: action(schema, step, state),
        progress,
        notice: state.notice().map(NoticeView::from),
    })
}
