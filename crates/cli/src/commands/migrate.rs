//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! anchorchat migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CHAT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use super::CommandError;

/// Run database migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    anchorchat_server::db::run_migrations(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
