mod cli;
mod commands;

use stipend_pipeline::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
