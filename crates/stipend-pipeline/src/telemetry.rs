use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    InvalidFilter {
        directive: String,
        source: ParseError,
    },
    Install(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidFilter { directive, source } => {
                write!(f, "log directive `{directive}` rejected: {source}")
            }
            TelemetryError::Install(err) => {
                write!(f, "another logger already owns this process: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::InvalidFilter { source, .. } => Some(source),
            TelemetryError::Install(err) => Some(&**err),
        }
    }
}

/// Where the active log directives came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOrigin {
    RustLog,
    Config,
}

/// Directives from `RUST_LOG` when it parses, otherwise `APP_LOG_LEVEL`.
pub fn build_filter(config: &TelemetryConfig) -> Result<(EnvFilter, FilterOrigin), TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok((filter, FilterOrigin::RustLog));
    }

    let filter =
        EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::InvalidFilter {
            directive: config.log_level.clone(),
            source,
        })?;
    Ok((filter, FilterOrigin::Config))
}

/// Installs the global subscriber. Logs go to stderr; stdout carries reports.
pub fn init(config: &TelemetryConfig) -> Result<FilterOrigin, TelemetryError> {
    let (filter, origin) = build_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)?;

    tracing::debug!(?origin, "log subscriber ready");
    Ok(origin)
}
