use crate::workflows::extraction::{
    CachePolicy, SchemaSource, DEFAULT_MAX_FILE_BYTES, DEFAULT_RESOLVER_CONCURRENCY,
};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SOURCE_DIR: &str = "uploads";
const DEFAULT_RESOLVER_TIMEOUT_MS: u64 = 10_000;

/// Distinguishes runtime behavior for different stages of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub extraction: ExtractionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = AppEnvironment::from_str(
            &lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
        );
        let log_level = lookup("APP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let schema_path = lookup("STIPEND_SCHEMA_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let source_dir = lookup("STIPEND_SOURCE_DIR")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_DIR.to_string());

        let max_file_bytes =
            parse_number(&lookup, "STIPEND_MAX_FILE_BYTES")?.unwrap_or(DEFAULT_MAX_FILE_BYTES);
        let resolver_concurrency = parse_number(&lookup, "STIPEND_RESOLVER_CONCURRENCY")?
            .unwrap_or(DEFAULT_RESOLVER_CONCURRENCY);
        if resolver_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        let timeout_ms = parse_number(&lookup, "STIPEND_RESOLVER_TIMEOUT_MS")?
            .unwrap_or(DEFAULT_RESOLVER_TIMEOUT_MS);
        let cache_capacity = parse_number(&lookup, "STIPEND_CACHE_CAPACITY")?;

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            extraction: ExtractionConfig {
                schema_path,
                source_dir: PathBuf::from(source_dir),
                max_file_bytes,
                resolver_concurrency,
                resolver_timeout: Duration::from_millis(timeout_ms),
                cache_capacity,
            },
        })
    }
}

fn parse_number<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        _ => Ok(None),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Settings for the extraction pipeline and its collaborators.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Schema file; `None` selects the bundled definition.
    pub schema_path: Option<PathBuf>,
    /// Directory file identifiers are resolved against.
    pub source_dir: PathBuf,
    pub max_file_bytes: u64,
    pub resolver_concurrency: usize,
    pub resolver_timeout: Duration,
    pub cache_capacity: Option<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            schema_path: None,
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            resolver_concurrency: DEFAULT_RESOLVER_CONCURRENCY,
            resolver_timeout: Duration::from_millis(DEFAULT_RESOLVER_TIMEOUT_MS),
            cache_capacity: None,
        }
    }
}

impl ExtractionConfig {
    pub fn schema_source(&self) -> SchemaSource {
        SchemaSource::from_path(self.schema_path.clone())
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_capacity
            .map(CachePolicy::Capacity)
            .unwrap_or_default()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { var: &'static str, value: String },
    InvalidConcurrency,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{} must be a non-negative integer, got '{}'", var, value)
            }
            ConfigError::InvalidConcurrency => {
                write!(f, "STIPEND_RESOLVER_CONCURRENCY must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
