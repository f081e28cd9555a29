use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stipend_pipeline::config::ExtractionConfig;
use stipend_pipeline::error::AppError;
use stipend_pipeline::workflows::extraction::{
    CacheSnapshot, ExtractionPipeline, ExtractionReport, GazetteerResolver, ScoringScale,
};
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ExtractArgs {
    /// Roster file names, resolved against the source directory
    #[arg(required = true, value_name = "FILE_ID")]
    pub(crate) file_ids: Vec<String>,
    /// Directory holding roster files (overrides STIPEND_SOURCE_DIR)
    #[arg(long)]
    pub(crate) source_dir: Option<PathBuf>,
    /// Schema JSON file (overrides STIPEND_SCHEMA_PATH)
    #[arg(long)]
    pub(crate) schema: Option<PathBuf>,
    /// Scoring scale JSON file; the schema's default scale is used otherwise
    #[arg(long)]
    pub(crate) scale: Option<PathBuf>,
    /// Maximum location lookups in flight
    #[arg(long, value_parser = parse_concurrency)]
    pub(crate) concurrency: Option<usize>,
    /// Pretty-print the JSON output
    #[arg(long)]
    pub(crate) pretty: bool,
    /// Append the location cache contents to the output
    #[arg(long)]
    pub(crate) show_cache: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SchemaArgs {
    /// Schema JSON file (overrides STIPEND_SCHEMA_PATH)
    #[arg(long)]
    pub(crate) schema: Option<PathBuf>,
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("concurrency must be at least 1".to_string()),
        Ok(width) => Ok(width),
        Err(err) => Err(format!("invalid concurrency '{value}': {err}")),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FileReport {
    pub(crate) file_id: String,
    pub(crate) report: ExtractionReport,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExtractOutput {
    pub(crate) results: Vec<FileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) cache: Option<CacheSnapshot>,
}

impl ExtractArgs {
    fn apply(&self, config: &mut ExtractionConfig) {
        if let Some(dir) = &self.source_dir {
            config.source_dir = dir.clone();
        }
        if let Some(schema) = &self.schema {
            config.schema_path = Some(schema.clone());
        }
        if let Some(width) = self.concurrency {
            config.resolver_concurrency = width;
        }
    }
}

pub(crate) async fn run_extract(
    args: ExtractArgs,
    config: ExtractionConfig,
) -> Result<(), AppError> {
    let pretty = args.pretty;
    let output = build_extract_output(&args, config).await?;
    print_json(&output, pretty)
}

/// Extracts every requested file in order through one pipeline, so later
/// files reuse locations resolved for earlier ones.
pub(crate) async fn build_extract_output(
    args: &ExtractArgs,
    mut config: ExtractionConfig,
) -> Result<ExtractOutput, AppError> {
    args.apply(&mut config);
    let scale = args.scale.as_deref().map(load_scale).transpose()?;
    let pipeline = ExtractionPipeline::from_config(&config, Arc::new(GazetteerResolver::new()));

    let mut results = Vec::with_capacity(args.file_ids.len());
    for file_id in &args.file_ids {
        let report = pipeline.extract(file_id, scale.clone()).await?;
        info!(
            file_id = %file_id,
            records = report.total_records,
            warnings = report.warnings.len(),
            "roster extracted"
        );
        results.push(FileReport {
            file_id: file_id.clone(),
            report,
        });
    }

    Ok(ExtractOutput {
        results,
        cache: args.show_cache.then(|| pipeline.cache_snapshot()),
    })
}

pub(crate) fn run_schema(args: SchemaArgs, mut config: ExtractionConfig) -> Result<(), AppError> {
    if let Some(schema) = args.schema {
        config.schema_path = Some(schema);
    }
    let schema = ExtractionPipeline::from_config(&config, Arc::new(GazetteerResolver::new()))
        .schema()?;
    print_json(&schema, true)
}

fn load_scale(path: &Path) -> Result<ScoringScale, AppError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), AppError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}
