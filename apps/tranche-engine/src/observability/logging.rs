//! `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// Default directive when neither `RUST_LOG` nor config set a level.
const DEFAULT_DIRECTIVE: &str = "tranche_engine=info";

/// Error initialising the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log directive '{directive}': {source}")]
    InvalidDirective {
        /// Offending directive.
        directive: String,
        /// Parser error.
        #[source]
        source: ParseError,
    },
    /// A global subscriber is already installed.
    #[error("tracing subscriber already initialised: {0}")]
    AlreadyInitialised(String),
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `level` (e.g. `debug`) applies to
/// this crate. With `json` set, events are emitted as one JSON object per line.
///
/// # Errors
///
/// Returns an error for an unparseable `level` or if a subscriber is already set.
pub fn init_logging(level: Option<&str>, json: bool) -> Result<(), LoggingError> {
    let filter = build_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))
}

fn build_filter(level: Option<&str>) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = level.map_or_else(
        || DEFAULT_DIRECTIVE.to_string(),
        |level| format!("tranche_engine={level}"),
    );
    EnvFilter::try_new(&directive).map_err(|source| LoggingError::InvalidDirective {
        directive,
        source,
    })
}
