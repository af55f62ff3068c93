//! CLI command implementations.

pub mod migrate;
pub mod seed_pages;
pub mod tenant;

use secrecy::SecretString;
use sqlx::PgPool;

/// Errors shared across CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] anchorchat_server::db::RepositoryError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedding error: {0}")]
    Embedding(#[from] anchorchat_server::search::SearchError),
}

/// Connect to the database named by `CHAT_DATABASE_URL` (or `DATABASE_URL`).
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let url = std::env::var("CHAT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("CHAT_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(anchorchat_server::db::create_pool(&SecretString::from(url)).await?)
}
