//! Schema-driven multi-step registration form.
//!
//! The pieces, leaves first:
//! - [`schema`]: the declarative form description, loaded from JSON.
//! - [`validator`]: per-field validation against a [`ValidationRule`].
//! - [`state`]: the form state and its transitions.
//! - [`render`]: a pure mapping from state to a serializable view.
//! - [`gateway`] and [`session`]: the asynchronous side (OTP delivery, step
//!   submission) with cancellation and timeouts.

mod error;
pub mod gateway;
pub mod render;
pub mod schema;
pub mod session;
pub mod state;
pub mod validator;

pub use error::{FormError, SchemaError};
pub use gateway::{GatewayError, RegistrationGateway, SimulatedGateway};
pub use render::{FieldView, StepView, render_field, render_step};
pub use schema::{FieldDefinition, FieldKind, FormSchema, StepSchema, ValidationRule};
pub use session::{Outcome, RegistrationSession};
pub use state::{FormState, Gate, Notice, OtpRequest, Phase, StepSubmission};
pub use validator::{FieldValue, validate};
