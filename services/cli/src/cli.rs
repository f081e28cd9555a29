use crate::commands::{run_extract, run_schema, ExtractArgs, SchemaArgs};
use clap::{Parser, Subcommand};
use stipend_pipeline::config::AppConfig;
use stipend_pipeline::error::AppError;
use stipend_pipeline::telemetry;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "stipend-cli",
    about = "Validate, enrich and score internship stipend rosters",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the extraction pipeline over one or more roster files
    Extract(ExtractArgs),
    /// Print the effective roster schema
    Schema(SchemaArgs),
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let log_filter = telemetry::init(&config.telemetry)?;
    debug!(?config.environment, ?log_filter, "configuration loaded");

    match cli.command {
        Command::Extract(args) => run_extract(args, config.extraction).await,
        Command::Schema(args) => run_schema(args, config.extraction),
    }
}
