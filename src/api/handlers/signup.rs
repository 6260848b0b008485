//! `POST /api/auth/signup`: create a user account.
//!
//! Checks run in a fixed order and stop at the first failure: every field
//! present, email shape, password length. Only then is the store consulted, so
//! a malformed request never touches the database.

use super::{ErrorBody, valid_email};
use crate::api::{
    password::{PasswordError, hash_password_blocking},
    storage::{NewUser, StoreError, UserRecord, UserStore},
};
use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

const MIN_PASSWORD_CHARS: usize = 6;

/// Raw signup body. Fields are kept as JSON values so a present field of the
/// wrong type is reported by the check it fails instead of as a missing field.
#[derive(ToSchema, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[schema(value_type = Option<String>)]
    email: Option<Value>,
    #[schema(value_type = Option<String>)]
    password: Option<Value>,
    #[schema(value_type = Option<String>)]
    first_name: Option<Value>,
    #[schema(value_type = Option<String>)]
    last_name: Option<Value>,
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// A request that passed the input checks.
#[derive(Debug)]
struct Signup {
    email: String,
    password: SecretString,
    first_name: String,
    last_name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignupUser {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    created_at: DateTime<Utc>,
}

impl From<UserRecord> for SignupUser {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            created_at: record.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupResponse {
    message: String,
    user: SignupUser,
}

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("All fields are required: email, password, firstName, lastName")]
    MissingFields,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password must be at least 6 characters long")]
    ShortPassword,
    #[error("User with this email already exists")]
    EmailTaken,
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl From<StoreError> for SignupError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::EmailTaken,
            other => Self::Store(other),
        }
    }
}

impl SignupError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields | Self::InvalidEmail | Self::ShortPassword => StatusCode::BAD_REQUEST,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::Store(_) | Self::Password(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message for the response body. Internal failures get a fixed message
    /// naming the likely setup problem, never the underlying error text.
    fn public_message(&self) -> String {
        match self {
            Self::Store(StoreError::MissingDatabase) => {
                "Database \"openbiz\" does not exist. Please create it first.".to_string()
            }
            Self::Store(StoreError::MissingTable) => {
                "Database table does not exist. Please run the sql/schema.sql script.".to_string()
            }
            Self::Store(StoreError::ConnectionRefused) => {
                "Database connection refused. Please check if PostgreSQL is running.".to_string()
            }
            Self::Store(_) | Self::Password(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for SignupError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Signup failed: {self:?}");
        } else {
            debug!("Signup rejected: {self}");
        }
        ErrorBody::response(status, self.public_message())
    }
}

/// A field counts as provided unless it is absent, `null`, `false`, `0` or `""`.
fn provided(value: Option<Value>) -> Option<Value> {
    value.filter(|value| match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Names are stored as text; scalars are accepted in their JSON spelling.
fn name_text(value: Value) -> Result<String, SignupError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(SignupError::MissingFields),
    }
}

impl SignupRequest {
    fn check(self) -> Result<Signup, SignupError> {
        let (Some(email), Some(password), Some(first_name), Some(last_name)) = (
            provided(self.email),
            provided(self.password),
            provided(self.first_name),
            provided(self.last_name),
        ) else {
            return Err(SignupError::MissingFields);
        };

        let email = match email {
            Value::String(email) if valid_email(&email) => email,
            _ => return Err(SignupError::InvalidEmail),
        };

        // a non-string password has no usable length
        let password = match password {
            Value::String(password) if password.chars().count() >= MIN_PASSWORD_CHARS => password,
            _ => return Err(SignupError::ShortPassword),
        };

        Ok(Signup {
            email,
            password: SecretString::from(password),
            first_name: name_text(first_name)?,
            last_name: name_text(last_name)?,
        })
    }
}

#[utoipa::path(
    post,
    path= "/api/auth/signup",
    request_body = SignupRequest,
    responses (
        (status = 201, description = "User created", body = SignupResponse, content_type = "application/json"),
        (status = 400, description = "Missing field, invalid email or short password", body = ErrorBody),
        (status = 409, description = "User with the specified email already exists", body = ErrorBody),
        (status = 500, description = "Database or hashing failure", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip(store, payload))]
pub async fn signup(
    store: Extension<Arc<dyn UserStore>>,
    payload: Option<Json<SignupRequest>>,
) -> Result<(StatusCode, Json<SignupResponse>), SignupError> {
    let request = payload.map(|Json(payload)| payload).unwrap_or_default();
    debug!("signup: {:?}", request);

    let signup = request.check()?;

    if store.email_exists(&signup.email).await? {
        return Err(SignupError::EmailTaken);
    }

    let password_hash = hash_password_blocking(signup.password).await?;

    let record = store
        .insert_user(NewUser {
            email: &signup.email,
            password_hash: &password_hash,
            first_name: &signup.first_name,
            last_name: &signup.last_name,
        })
        .await?;

    info!(user_id = %record.id, "User created");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully".to_string(),
            user: record.into(),
        }),
    ))
}
