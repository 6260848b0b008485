//! Drives a [`FormState`] against a [`RegistrationGateway`].
//!
//! Each remote call races a cancellation token and a timeout. There are no
//! retries: a timeout or cancellation is treated like any other gateway
//! failure, so `loading` is cleared and the failure notice is raised while the
//! step, values and errors stay as they were.

use super::{
    error::FormError,
    gateway::{GatewayError, RegistrationGateway},
    render::{StepView, render_step},
    schema::FormSchema,
    state::{self, FormState, Gate, Notice},
    validator::FieldValue,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What a user action led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Validation blocked the action; the listed fields now carry errors.
    Invalid(Vec<String>),
    /// The gateway was called and the state updated with the result.
    Settled(Option<Notice>),
}

pub struct RegistrationSession<G> {
    schema: Arc<FormSchema>,
    state: FormState,
    gateway: G,
    timeout: Duration,
}

impl<G: RegistrationGateway> RegistrationSession<G> {
    #[must_use]
    pub fn new(schema: Arc<FormSchema>, gateway: G) -> Self {
        Self {
            schema,
            state: FormState::new(),
            gateway,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn state(&self) -> &FormState {
        &self.state
    }

    #[must_use]
    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    #[must_use]
    pub fn view(&self) -> Option<StepView> {
        render_step(&self.schema, &self.state)
    }

    /// Record a field value.
    ///
    /// # Errors
    /// See [`state::apply_input`].
    pub fn input(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), FormError> {
        state::apply_input(&self.schema, &mut self.state, name, value.into())
    }

    /// Validate step 1 and ask the gateway for an OTP.
    ///
    /// # Errors
    /// Returns an error if the form is not waiting for an OTP request.
    pub async fn send_otp(&mut self, cancel: &CancellationToken) -> Result<Outcome, FormError> {
        let request = match state::request_otp(&self.schema, &mut self.state)? {
            Gate::Blocked { invalid } => return Ok(Outcome::Invalid(invalid)),
            Gate::Proceed(request) => request,
        };

        let result = guarded(cancel, self.timeout, self.gateway.send_otp(&request)).await;
        if let Err(err) = &result {
            warn!(error = %err, "otp request failed");
        }

        let notice = state::finish_otp(&mut self.state, result)?;
        Ok(Outcome::Settled(Some(notice)))
    }

    /// Validate the current step and submit it. In step 1 this verifies the OTP.
    ///
    /// # Errors
    /// Returns an error if the current phase has nothing to submit.
    pub async fn advance(&mut self, cancel: &CancellationToken) -> Result<Outcome, FormError> {
        let submission = match state::submit_step(&self.schema, &mut self.state)? {
            Gate::Blocked { invalid } => return Ok(Outcome::Invalid(invalid)),
            Gate::Proceed(submission) => submission,
        };

        let step = submission.step;
        let result = guarded(cancel, self.timeout, self.gateway.submit_step(&submission)).await;
        match &result {
            Ok(()) => info!(step, "step submitted"),
            Err(err) => warn!(step, error = %err, "step submission failed"),
        }

        let notice = state::finish_step(&self.schema, &mut self.state, result)?;
        Ok(Outcome::Settled(notice))
    }
}

async fn guarded<F>(cancel: &CancellationToken, timeout: Duration, call: F) -> Result<(), GatewayError>
where
    F: Future<Output = Result<(), GatewayError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(GatewayError::Cancelled),
        result = tokio::time::timeout(timeout, call) => {
            result.unwrap_or(Err(GatewayError::Timeout(timeout)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::gateway::SimulatedGateway;
    use anyhow::Result;

    fn filled_session(timeout: Duration) -> Result<RegistrationSession<SimulatedGateway>> {
        let schema = Arc::new(FormSchema::udyam()?);
        let mut session = RegistrationSession::new(schema, SimulatedGateway::default()).with_timeout(timeout);
        session.input("aadhaar", "123456789012")?;
        session.input("entrepreneurName", "Asha Verma")?;
        session.input("consent", true)?;
        Ok(session)
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_flow_sends_otp() -> Result<()> {
        let mut session = filled_session(DEFAULT_TIMEOUT)?;
        let outcome = session.send_otp(&CancellationToken::new()).await?;
        assert_eq!(outcome, Outcome::Settled(Some(Notice::OtpSent)));
        assert!(session.state().otp_sent());
        assert!(!session.state().loading());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn slow_gateway_times_out() -> Result<()> {
        let mut session = filled_session(Duration::from_millis(500))?;
        let before = session.state().clone();

        let outcome = session.send_otp(&CancellationToken::new()).await?;
        assert_eq!(outcome, Outcome::Settled(Some(Notice::OtpFailed)));
        assert!(!session.state().loading());
        assert!(!session.state().otp_sent());
        assert_eq!(session.state().values(), before.values());
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_call_fails_fast() -> Result<()> {
        let mut session = filled_session(DEFAULT_TIMEOUT)?;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = session.send_otp(&cancel).await?;
        assert_eq!(outcome, Outcome::Settled(Some(Notice::OtpFailed)));
        assert!(!session.state().otp_sent());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_step_never_reaches_gateway() -> Result<()> {
        let schema = Arc::new(FormSchema::udyam()?);
        let mut session = RegistrationSession::new(schema, SimulatedGateway::default());
        let outcome = session.send_otp(&CancellationToken::new()).await?;
        assert!(matches!(outcome, Outcome::Invalid(ref fields) if fields.len() == 3));
        assert!(!session.state().loading());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_passes_through_results() {
        let cancel = CancellationToken::new();
        let rejected = guarded(&cancel, DEFAULT_TIMEOUT, async {
            Err(GatewayError::Rejected("no".to_string()))
        })
        .await;
        assert_eq!(rejected, Err(GatewayError::Rejected("no".to_string())));
    }
}
