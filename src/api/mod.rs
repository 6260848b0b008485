use crate::api::{
    handlers::{not_found, root},
    storage::{PgUserStore, UserStore},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    routing::{any, get, options},
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub(crate) mod handlers;
mod openapi;
pub mod password;
pub mod storage;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Runtime facts reported by `/api/health`.
#[derive(Clone, Debug)]
pub struct ServerInfo {
    pub environment: String,
    pub port: u16,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: SecretString,
    pub environment: String,
    pub api_base_url: Option<String>,
    pub frontend_origin: Option<String>,
    pub db_max_connections: u32,
}

/// Assemble the application: documented routes, undocumented extras, the
/// `/api` and global 404 fallbacks, and the middleware stack.
pub fn app(store: Arc<dyn UserStore>, info: ServerInfo, cors: CorsLayer) -> Router {
    // The OpenAPI document is printed by the `openapi` binary; `/`, the health
    // preflight and the 404 fallbacks are served but not documented.
    let (router, _openapi) = router().split_for_parts();
    router
        .route("/", get(root::root))
        .route("/api/health", options(handlers::health::health))
        .route("/api", any(not_found::api))
        .route("/api/*rest", any(not_found::api))
        .method_not_allowed_fallback(not_found::method_mismatch)
        .fallback(not_found::route)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(store))
                .layer(Extension(info)),
        )
}

/// Start the server
/// # Errors
/// Return error if the configuration is invalid or the listener fails
pub async fn new(config: ServerConfig) -> Result<()> {
    // Connect lazily: a missing database or table is reported per request
    // instead of keeping the server from starting.
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect_lazy(config.dsn.expose_secret())
        .context("Invalid database DSN")?;

    let cors = cors_layer(config.frontend_origin.as_deref())?;
    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let info = ServerInfo {
        environment: config.environment.clone(),
        port: config.port,
    };

    let app = app(store, info, cors);

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!(
        "Server is running in {} mode on [::]:{}",
        config.environment, config.port
    );
    info!(
        "API available at {}",
        config
            .api_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", config.port))
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
        () = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// CORS for the browser front end: the exact configured origin, or any origin
/// when none is configured.
fn cors_layer(frontend_origin: Option<&str>) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Ok(match frontend_origin {
        Some(url) => cors.allow_origin(AllowOrigin::exact(frontend_origin_header(url)?)),
        None => cors.allow_origin(Any),
    })
}

fn frontend_origin_header(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend origin: {frontend_base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend origin must include a valid host: {frontend_base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
