//! Semantic content search over scraped tenant pages.
//!
//! Scraped page chunks are embedded with `OpenAI` embeddings and stored in
//! pgvector. At chat time the user's question is embedded and compared with
//! cosine similarity; hits above the floor become tool results and source
//! links for the answer.

mod embeddings;
mod index;

pub use embeddings::EmbeddingClient;
pub(crate) use index::format_embedding;
pub use index::{ContentHit, PgSemanticIndex, SemanticIndex};

use thiserror::Error;

/// Errors that can occur during semantic search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP request to the embeddings API failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Embedding generation failed.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The embeddings API returned an unexpected response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
