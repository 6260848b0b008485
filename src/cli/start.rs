use crate::cli::{
    actions::Action,
    commands::{self, logging::LogFormat},
    dispatch, telemetry,
};
use anyhow::Result;

/// Map verbosity count to tracing level
const fn get_verbosity_level(verbosity: u8) -> Option<tracing::Level> {
    match verbosity {
        0 => None,
        1 => Some(tracing::Level::WARN),
        2 => Some(tracing::Level::INFO),
        3 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

/// Main entry point for the CLI - builds and returns the Action
///
/// # Errors
///
/// Returns an error if argument parsing, telemetry initialization, or action dispatch fails
pub fn start() -> Result<Action> {
    // 1. Parse command-line arguments
    let matches = commands::new().get_matches();

    // 2. Extract verbosity level and output format
    let verbosity_level = get_verbosity_level(
        matches
            .get_one::<u8>(commands::logging::ARG_VERBOSITY)
            .copied()
            .unwrap_or(0),
    );
    let log_format = matches
        .get_one::<LogFormat>(commands::logging::ARG_LOG_FORMAT)
        .copied()
        .unwrap_or_default();

    // 3. Initialize telemetry
    telemetry::init(verbosity_level, log_format)?;

    // 4. Dispatch to appropriate action
    dispatch::handler(&matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(get_verbosity_level(0), None);
        assert_eq!(get_verbosity_level(1), Some(tracing::Level::WARN));
        assert_eq!(get_verbosity_level(2), Some(tracing::Level::INFO));
        assert_eq!(get_verbosity_level(3), Some(tracing::Level::DEBUG));
        assert_eq!(get_verbosity_level(9), Some(tracing::Level::TRACE));
    }
}
