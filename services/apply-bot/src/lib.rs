mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use quick_apply::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
