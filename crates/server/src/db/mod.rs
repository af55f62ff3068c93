//! Database operations for the chat service `PostgreSQL`.
//!
//! ## Tables
//!
//! - `organization` - Tenant organizations
//! - `organization_member` - Organization membership and roles
//! - `customer_config` - Per-domain tenant configuration (commerce, limits)
//! - `conversation` - Visitor chat conversations
//! - `message` - Conversation message history (JSONB content)
//! - `scraped_page` - Scraped tenant site pages
//! - `page_embedding` - pgvector chunk embeddings for semantic search
//!
//! Queries run at runtime rather than through the compile-time macros: the
//! `page_embedding` table uses pgvector's `vector` type, which sqlx's macro
//! layer cannot verify.
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p anchorchat-cli -- migrate
//! ```

pub mod conversations;
pub mod embeddings;
pub mod tenants;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use conversations::{Conversation, ConversationRepository, ConversationStore, StoredMessage};
pub use embeddings::EmbeddingRepository;
pub use tenants::{TenantConfig, TenantRepository, TenantStore};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate domain).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Embedded migrations from `crates/server/migrations/`.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the history is dirty.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
