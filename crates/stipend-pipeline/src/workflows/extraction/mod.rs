mod cache;
mod columns;
mod location;
mod record;
mod resolver;
mod rules;
mod scale;
mod schema;
mod scoring;
mod source;
mod standardize;
mod validation;

pub use cache::{CachePolicy, CacheSnapshot, LocationCache};
pub use columns::{bind_columns, normalize_rows, ColumnBinding};
pub use location::{
    LocationNormalizer, LocationStats, DEFAULT_RESOLVER_CONCURRENCY, DEFAULT_RESOLVER_TIMEOUT,
    UNKNOWN_LOCATION,
};
pub use record::{fields, Record, ScoredRecord};
pub use resolver::{
    is_district_of_columbia, GazetteerResolver, LocationResolver, ResolveError,
    DISTRICT_OF_COLUMBIA, INTERNATIONAL,
};
pub use rules::{default_rule, FieldRule};
pub use scale::ScoringScale;
pub use schema::{FieldValidation, SchemaConfig, SchemaError, SchemaSource, ValidValues};
pub use scoring::{score_records, ScoreBreakdown, ScoreFactor};
pub use source::{FileRecordSource, RawTable, RecordSource, SourceError, DEFAULT_MAX_FILE_BYTES};
pub use standardize::{
    month_name, standardize_hours, standardize_values, HOURS_30_PLUS, HOURS_UNDER_30,
    UNKNOWN_VALUE,
};
pub use validation::{validate_fields, ValueWarning, WarningKind};

use crate::config::ExtractionConfig;
use crate::error::ErrorCategory;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("missing required columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },
    #[error("unexpected extraction failure: {0}")]
    Unexpected(String),
}

impl ExtractionError {
    /// How a caller-facing surface should classify the failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExtractionError::MissingColumns { .. } => ErrorCategory::Client,
            ExtractionError::Schema(SchemaError::NotFound { .. })
            | ExtractionError::Source(SourceError::NotFound { .. }) => ErrorCategory::NotFound,
            ExtractionError::Schema(SchemaError::Malformed { .. })
            | ExtractionError::Source(
                SourceError::Unsupported { .. }
                | SourceError::TooLarge { .. }
                | SourceError::Csv { .. }
                | SourceError::Json { .. }
                | SourceError::InvalidShape { .. }
                | SourceError::Empty { .. },
            ) => ErrorCategory::Client,
            ExtractionError::Schema(SchemaError::Io { .. })
            | ExtractionError::Source(SourceError::Io { .. })
            | ExtractionError::Unexpected(_) => ErrorCategory::Internal,
        }
    }
}

/// Result of one extraction: scored rows plus the non-fatal findings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub data: Vec<ScoredRecord>,
    pub warnings: Vec<String>,
    pub total_records: usize,
    pub columns: Vec<String>,
}

/// Column mapping, standardization, validation, location normalization and
/// scoring over one roster file.
///
/// Pipelines built from the same [`LocationCache`] share resolutions, so one
/// cache is normally created per process and handed to every pipeline.
#[derive(Clone)]
pub struct ExtractionPipeline {
    schema: SchemaSource,
    source: Arc<dyn RecordSource>,
    locations: LocationNormalizer,
}

impl ExtractionPipeline {
    pub fn new(
        schema: SchemaSource,
        source: Arc<dyn RecordSource>,
        locations: LocationNormalizer,
    ) -> Self {
        Self {
            schema,
            source,
            locations,
        }
    }

    pub fn from_config(config: &ExtractionConfig, resolver: Arc<dyn LocationResolver>) -> Self {
        let cache = Arc::new(LocationCache::new(config.cache_policy()));
        let locations = LocationNormalizer::new(cache, resolver)
            .with_concurrency(config.resolver_concurrency)
            .with_timeout(config.resolver_timeout);
        let source =
            FileRecordSource::new(config.source_dir.clone()).with_max_bytes(config.max_file_bytes);

        Self::new(config.schema_source(), Arc::new(source), locations)
    }

    /// Loads and returns the schema this pipeline runs against.
    pub fn schema(&self) -> Result<SchemaConfig, ExtractionError> {
        Ok(SchemaConfig::load(&self.schema)?)
    }

    /// Reads `file_id` from the record source and runs the full pipeline.
    /// `scale` replaces the schema's default scale when given.
    pub async fn extract(
        &self,
        file_id: &str,
        scale: Option<ScoringScale>,
    ) -> Result<ExtractionReport, ExtractionError> {
        let source = Arc::clone(&self.source);
        let id = file_id.to_string();
        let table = tokio::task::spawn_blocking(move || source.load(&id))
            .await
            .map_err(|err| ExtractionError::Unexpected(format!("source loader failed: {err}")))??;

        info!(file_id, rows = table.len(), "roster loaded");
        self.extract_table(table, scale).await
    }

    /// Runs the pipeline over an already-parsed table.
    pub async fn extract_table(
        &self,
        table: RawTable,
        scale: Option<ScoringScale>,
    ) -> Result<ExtractionReport, ExtractionError> {
        let schema = self.schema()?;

        let bindings = bind_columns(table.headers(), &schema)
            .map_err(|columns| ExtractionError::MissingColumns { columns })?;
        let mut records = normalize_rows(&table, &bindings);
        debug!(
            columns = bindings.len(),
            dropped = table.headers().len().saturating_sub(bindings.len()),
            "columns normalized"
        );

        standardize_values(&mut records);

        let mut warnings: Vec<String> = validate_fields(&records, &schema.validations)
            .iter()
            .map(ToString::to_string)
            .collect();

        self.locations.normalize(&mut records).await;

        let scale = scale.unwrap_or_else(|| schema.default_scale.clone());
        let (data, unscored) = score_records(records, &scale, &schema);
        warnings.extend(unscored.iter().map(ToString::to_string));

        let mut columns: Vec<String> = bindings
            .into_iter()
            .map(|binding| binding.canonical)
            .collect();
        columns.push(fields::SCORE.to_string());
        columns.push(fields::SCORE_BREAKDOWN.to_string());

        info!(
            records = data.len(),
            warnings = warnings.len(),
            schema_version = %schema.version,
            "extraction complete"
        );

        Ok(ExtractionReport {
            total_records: data.len(),
            data,
            warnings,
            columns,
        })
    }

    pub fn cache(&self) -> &Arc<LocationCache> {
        self.locations.cache()
    }

    pub fn cache_snapshot(&self) -> CacheSnapshot {
        self.cache().snapshot()
    }

    /// Empties the location cache, returning the number of entries removed.
    pub fn clear_cache(&self) -> usize {
        let removed = self.cache().clear();
        info!(removed, "location cache cleared");
        removed
    }
}
