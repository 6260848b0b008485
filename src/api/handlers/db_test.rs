use super::ErrorBody;
use crate::api::storage::UserStore;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct DbTest {
    message: String,
    timestamp: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path= "/api/db-test",
    responses (
        (status = 200, description = "Database round-trip succeeded", body = DbTest),
        (status = 500, description = "Database round-trip failed", body = ErrorBody),
    ),
    tag= "health"
)]
pub async fn db_test(store: Extension<Arc<dyn UserStore>>) -> Response {
    match store.database_time().await {
        Ok(timestamp) => Json(DbTest {
            message: "Database connection successful".to_string(),
            timestamp,
        })
        .into_response(),
        Err(err) => {
            error!("Database test failed: {err}");
            ErrorBody::response(StatusCode::INTERNAL_SERVER_ERROR, "Database connection failed")
        }
    }
}
