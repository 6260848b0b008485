//! Fallbacks for unknown routes.

use super::ErrorBody;
use axum::{
    http::{StatusCode, Uri},
    response::Response,
};

/// Anything under `/api` that no route matched.
pub async fn api() -> Response {
    ErrorBody::response(StatusCode::NOT_FOUND, "API endpoint not found")
}

/// Anything else.
pub async fn route() -> Response {
    ErrorBody::response(StatusCode::NOT_FOUND, "Route not found")
}

/// A known path hit with a method it does not serve. Reported like an
/// unmatched route rather than as a 405.
pub async fn method_mismatch(uri: Uri) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        api().await
    } else {
        route().await
    }
}
