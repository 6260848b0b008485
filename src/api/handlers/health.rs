use crate::{GIT_COMMIT_HASH, api::ServerInfo};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    status: String,
    timestamp: String,
    environment: String,
    port: u16,
    database: String,
    name: String,
    version: String,
    commit: String,
}

#[utoipa::path(
    get,
    path= "/api/health",
    responses (
        (status = 200, description = "Service is up", body = Health),
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, info: Extension<ServerInfo>) -> impl IntoResponse {
    let health = Health {
        status: "OK".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        environment: info.environment.clone(),
        port: info.port,
        database: "PostgreSQL".to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: GIT_COMMIT_HASH.to_string(),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = health.commit.get(0..7).unwrap_or(&health.commit);

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .unwrap_or_else(|err| {
            error!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        });

    (StatusCode::OK, headers, body)
}
