mod cli;
mod consumer;
mod infra;
mod replay;
mod routes;
mod server;

use incentives::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
