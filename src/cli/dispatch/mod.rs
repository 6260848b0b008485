use crate::cli::{
    actions::{Action, server::Args},
    commands::{
        ARG_API_BASE_URL, ARG_DB_MAX_CONNECTIONS, ARG_DSN, ARG_ENVIRONMENT, ARG_FRONTEND_ORIGIN,
        ARG_PORT,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or the API base URL does not parse.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(5001);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let environment = matches
        .get_one::<String>(ARG_ENVIRONMENT)
        .cloned()
        .unwrap_or_else(|| "development".to_string());
    let db_max_connections = matches
        .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);
    let api_base_url = matches
        .get_one::<String>(ARG_API_BASE_URL)
        .map(|url| {
            Url::parse(url)
                .map(|_| url.clone())
                .with_context(|| format!("Invalid API base URL: {url}"))
        })
        .transpose()?;

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        environment,
        api_base_url,
        frontend_origin: matches.get_one::<String>(ARG_FRONTEND_ORIGIN).cloned(),
        db_max_connections,
    }))
}
