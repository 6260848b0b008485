//! The remote side of the registration flow: OTP delivery and step submission.

use super::state::{OtpRequest, StepSubmission};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("request cancelled")]
    Cancelled,
}

#[async_trait]
pub trait RegistrationGateway: Send + Sync {
    /// Ask the provider to send an OTP to the mobile number linked to the
    /// Aadhaar in `request`.
    async fn send_otp(&self, request: &OtpRequest) -> Result<(), GatewayError>;

    /// Submit a validated step.
    async fn submit_step(&self, submission: &StepSubmission) -> Result<(), GatewayError>;
}

/// Stand-in gateway that accepts everything after a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedGateway {
    otp_delay: Duration,
    submit_delay: Duration,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self {
            otp_delay: Duration::from_millis(2000),
            submit_delay: Duration::from_millis(1500),
        }
    }
}

#[async_trait]
impl RegistrationGateway for SimulatedGateway {
    async fn send_otp(&self, _request: &OtpRequest) -> Result<(), GatewayError> {
        tokio::time::sleep(self.otp_delay).await;
        debug!("simulated otp sent");
        Ok(())
    }

    async fn submit_step(&self, submission: &StepSubmission) -> Result<(), GatewayError> {
        tokio::time::sleep(self.submit_delay).await;
        debug!(step = submission.step, "simulated step accepted");
        Ok(())
    }
}
