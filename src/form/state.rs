//! Form state and the transitions that move it between steps.
//!
//! [`FormState`] is a plain value; every mutation goes through one of the free
//! functions in this module, which take the schema and the state by reference.
//! Asynchronous work (sending an OTP, submitting a step) is split in two: a
//! `begin` half that validates and marks the state as loading, and a `finish`
//! half that applies the outcome of the call. The caller owns the call itself.
//!
//! ```text
//! Step1Collecting --request_otp--> (loading) --finish_otp(ok)--> Step1OtpSent
//! Step1OtpSent   --submit_step--> (loading) --finish_step(ok)--> StepCollecting(2)
//! StepCollecting(n) ------------> (loading) --finish_step(ok)--> StepCollecting(n+1) | Completed
//! ```

use super::{
    error::FormError,
    schema::{FieldDefinition, FormSchema, StepSchema},
    validator::{FieldValue, validate},
};
use serde::Serialize;
use std::{collections::BTreeMap, fmt};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "step", rename_all = "camelCase")]
pub enum Phase {
    Step1Collecting,
    Step1OtpSent,
    /// A step after the first, still collecting input.
    StepCollecting(usize),
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step1Collecting => write!(f, "collecting step 1"),
            Self::Step1OtpSent => write!(f, "waiting for the OTP"),
            Self::StepCollecting(step) => write!(f, "collecting step {step}"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// User-visible notices raised when an asynchronous call finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Notice {
    OtpSent,
    OtpFailed,
    SubmitFailed,
    Completed,
}

impl Notice {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::OtpSent => "OTP sent successfully to your registered mobile number",
            Self::OtpFailed => "Failed to send OTP. Please try again.",
            Self::SubmitFailed => "Validation failed. Please try again.",
            Self::Completed => "Registration completed successfully!",
        }
    }

    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::OtpFailed | Self::SubmitFailed)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a validated transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate<T> {
    /// Validation failed; `invalid` lists the offending field names and the
    /// state's errors now hold exactly their messages.
    Blocked { invalid: Vec<String> },
    Proceed(T),
}

/// Snapshot of the fields an OTP is issued against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtpRequest {
    pub values: BTreeMap<String, FieldValue>,
}

impl OtpRequest {
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(FieldValue::as_text)
    }
}

/// Snapshot of a step's visible fields, sent when the step is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSubmission {
    pub step: usize,
    pub values: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Otp,
    Step,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    current_step: usize,
    values: BTreeMap<String, FieldValue>,
    errors: BTreeMap<String, String>,
    pending: Option<Pending>,
    otp_sent: bool,
    completed: bool,
    notice: Option<Notice>,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new()
    }
}

impl FormState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current_step: 1,
            values: BTreeMap::new(),
            errors: BTreeMap::new(),
            pending: None,
            otp_sent: false,
            completed: false,
            notice: None,
        }
    }

    #[must_use]
    pub const fn current_step(&self) -> usize {
        self.current_step
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    #[must_use]
    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(String::as_str)
    }

    #[must_use]
    pub const fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// True while an OTP send or step submission is in flight.
    #[must_use]
    pub const fn loading(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub const fn otp_sent(&self) -> bool {
        self.otp_sent
    }

    #[must_use]
    pub const fn notice(&self) -> Option<Notice> {
        self.notice
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        if self.completed {
            Phase::Completed
        } else if self.current_step > 1 {
            Phase::StepCollecting(self.current_step)
        } else if self.otp_sent {
            Phase::Step1OtpSent
        } else {
            Phase::Step1Collecting
        }
    }

    /// Whether a field takes part in rendering and step validation right now.
    #[must_use]
    pub const fn is_visible(&self, field: &FieldDefinition) -> bool {
        !field.conditional || self.otp_sent
    }

    fn snapshot<'a>(&self, fields: impl Iterator<Item = &'a FieldDefinition>) -> BTreeMap<String, FieldValue> {
        fields
            .filter_map(|field| {
                self.values
                    .get(&field.name)
                    .map(|value| (field.name.clone(), value.clone()))
            })
            .collect()
    }

    /// Validate `fields`, replace the error map with the result and return the
    /// names that failed.
    fn revalidate<'a>(&mut self, fields: impl Iterator<Item = &'a FieldDefinition>) -> Vec<String> {
        let errors: BTreeMap<String, String> = fields
            .filter_map(|field| {
                validate(field, self.values.get(&field.name)).map(|message| (field.name.clone(), message))
            })
            .collect();
        let invalid = errors.keys().cloned().collect();
        self.errors = errors;
        invalid
    }
}

fn current_step_schema<'a>(schema: &'a FormSchema, state: &FormState) -> Result<&'a StepSchema, FormError> {
    schema.step(state.current_step).ok_or(FormError::NotAllowed {
        action: "this action",
        phase: state.phase(),
    })
}

fn ensure_idle(state: &FormState) -> Result<(), FormError> {
    if state.loading() {
        Err(FormError::Busy)
    } else {
        Ok(())
    }
}

/// Record a value typed or toggled into a field and re-validate just that field.
///
/// # Errors
/// Fails while a call is in flight (inputs are disabled), once the form is
/// complete, or if `name` is not a field of the current step.
pub fn apply_input(
    schema: &FormSchema,
    state: &mut FormState,
    name: &str,
    value: FieldValue,
) -> Result<(), FormError> {
    ensure_idle(state)?;
    if state.completed {
        return Err(FormError::NotAllowed {
            action: "input",
            phase: state.phase(),
        });
    }

    let step = current_step_schema(schema, state)?;
    let field = step.field(name).ok_or_else(|| FormError::UnknownField {
        name: name.to_string(),
        step: state.current_step,
    })?;

    match validate(field, Some(&value)) {
        Some(message) => state.errors.insert(field.name.clone(), message),
        None => state.errors.remove(&field.name),
    };
    state.values.insert(field.name.clone(), value);

    Ok(())
}

/// Validate the OTP prerequisites of step 1 and, if they pass, start an OTP send.
///
/// # Errors
/// Fails if a call is in flight or the form is not collecting step 1.
pub fn request_otp(schema: &FormSchema, state: &mut FormState) -> Result<Gate<OtpRequest>, FormError> {
    ensure_idle(state)?;
    let phase = state.phase();
    if phase != Phase::Step1Collecting {
        return Err(FormError::NotAllowed {
            action: "requesting an OTP",
            phase,
        });
    }
    // a notice describes the last finished call only
    state.notice = None;

    let step = current_step_schema(schema, state)?;
    let invalid = state.revalidate(step.otp_prerequisites());
    if !invalid.is_empty() {
        debug!(?invalid, "otp request blocked by validation");
        return Ok(Gate::Blocked { invalid });
    }

    state.pending = Some(Pending::Otp);
    let values = state.snapshot(step.otp_prerequisites());
    debug!("otp request started");
    Ok(Gate::Proceed(OtpRequest { values }))
}

/// Apply the outcome of an OTP send started by [`request_otp`].
///
/// On failure only `loading` changes; step, values and errors are left as they were.
///
/// # Errors
/// Fails if no OTP send is pending.
pub fn finish_otp<E: fmt::Display>(state: &mut FormState, outcome: Result<(), E>) -> Result<Notice, FormError> {
    if state.pending != Some(Pending::Otp) {
        return Err(FormError::NotPending("OTP"));
    }
    state.pending = None;

    let notice = match outcome {
        Ok(()) => {
            state.otp_sent = true;
            debug!("otp sent");
            Notice::OtpSent
        }
        Err(err) => {
            debug!(error = %err, "otp send failed");
            Notice::OtpFailed
        }
    };
    state.notice = Some(notice);
    Ok(notice)
}

/// Validate every visible field of the current step and, if they pass, start
/// submitting it. In step 1 this is the OTP verification.
///
/// # Errors
/// Fails if a call is in flight, the OTP has not been requested yet, or the
/// form is complete.
pub fn submit_step(schema: &FormSchema, state: &mut FormState) -> Result<Gate<StepSubmission>, FormError> {
    ensure_idle(state)?;
    let phase = state.phase();
    if matches!(phase, Phase::Step1Collecting | Phase::Completed) {
        return Err(FormError::NotAllowed {
            action: "submitting the step",
            phase,
        });
    }
    state.notice = None;

    let step = current_step_schema(schema, state)?;
    let visible: Vec<&FieldDefinition> = step.fields.iter().filter(|f| state.is_visible(f)).collect();
    let invalid = state.revalidate(visible.iter().copied());
    if !invalid.is_empty() {
        debug!(step = state.current_step, ?invalid, "step submission blocked by validation");
        return Ok(Gate::Blocked { invalid });
    }

    state.pending = Some(Pending::Step);
    let values = state.snapshot(visible.into_iter());
    debug!(step = state.current_step, "step submission started");
    Ok(Gate::Proceed(StepSubmission {
        step: state.current_step,
        values,
    }))
}

/// Apply the outcome of a submission started by [`submit_step`].
///
/// Success moves to the next step (clearing the OTP flag) or completes the
/// form after the last step. Failure only clears `loading`.
///
/// # Errors
/// Fails if no step submission is pending.
pub fn finish_step<E: fmt::Display>(
    schema: &FormSchema,
    state: &mut FormState,
    outcome: Result<(), E>,
) -> Result<Option<Notice>, FormError> {
    if state.pending != Some(Pending::Step) {
        return Err(FormError::NotPending("step submission"));
    }
    state.pending = None;

    let notice = match outcome {
        Ok(()) if state.current_step < schema.step_count() => {
            state.current_step += 1;
            state.otp_sent = false;
            debug!(step = state.current_step, "advanced to next step");
            None
        }
        Ok(()) => {
            state.completed = true;
            debug!("registration completed");
            Some(Notice::Completed)
        }
        Err(err) => {
            debug!(step = state.current_step, error = %err, "step submission failed");
            Some(Notice::SubmitFailed)
        }
    };
    state.notice = notice;
    Ok(notice)
}
