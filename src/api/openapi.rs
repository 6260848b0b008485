use super::handlers::{db_test, health, signup};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Endpoints registered here via `.routes(routes!(...))` are both served and
/// documented. Routes added in `api::app` (like `/` or the 404 fallbacks) are not.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and database checks".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Account signup".to_string());

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![health_tag, auth_tag]);

    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(db_test::db_test))
        .routes(routes!(signup::signup))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            optional_str(name),
            optional_str(email.trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    }
}
