//! API handlers and the helpers they share.

pub mod db_test;
pub mod health;
pub mod not_found;
pub mod root;
pub mod signup;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// JSON body of every error response: `{"error": "..."}`.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn response(status: StatusCode, error: impl Into<String>) -> Response {
        (status, Json(Self { error: error.into() })).into_response()
    }
}

/// Lightweight email sanity check: something@something.something, no whitespace.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
