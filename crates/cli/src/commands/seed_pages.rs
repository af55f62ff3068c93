//! Seed scraped page content into the semantic index.
//!
//! Reads a JSON file of scraped pages, splits each page into chunks, embeds
//! the chunks with the `OpenAI` embeddings API, and stores them in pgvector.
//!
//! # Usage
//!
//! ```bash
//! anchorchat seed-pages --org-id 1 --file pages.json
//! ```
//!
//! # Environment Variables
//!
//! - `CHAT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `OPENAI_API_KEY` - `OpenAI` API key for embeddings
//! - `EMBEDDING_MODEL` - Embedding model (default `text-embedding-3-small`)

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;

use anchorchat_core::OrganizationId;
use anchorchat_server::db::EmbeddingRepository;
use anchorchat_server::search::EmbeddingClient;

use super::CommandError;

/// Target chunk size in characters. Chunks split on paragraph boundaries,
/// so actual sizes vary around this.
const CHUNK_TARGET: usize = 1_200;

/// Batch size for embedding requests.
const EMBED_BATCH: usize = 32;

/// A scraped page in the seed file.
#[derive(Debug, Deserialize)]
struct SeedPage {
    url: String,
    title: Option<String>,
    content: String,
}

/// Embed the pages in `file` for the given organization.
pub async fn run(org_id: i64, file: &Path) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();

    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| CommandError::MissingEnvVar("OPENAI_API_KEY"))?;
    let model = std::env::var("EMBEDDING_MODEL")
        .unwrap_or_else(|_| "text-embedding-3-small".to_string());

    let raw = std::fs::read_to_string(file)?;
    let pages: Vec<SeedPage> = serde_json::from_str(&raw)?;

    let pool = super::connect().await?;
    let repo = EmbeddingRepository::new(pool);
    let embeddings = EmbeddingClient::new(&SecretString::from(api_key), &model);

    let organization_id = OrganizationId::new(org_id);
    let mut total_chunks = 0usize;

    for page in &pages {
        let chunks = chunk_content(&page.content);
        if chunks.is_empty() {
            tracing::warn!(url = %page.url, "skipping page with no content");
            continue;
        }

        let page_id = repo
            .upsert_page(organization_id, &page.url, page.title.as_deref())
            .await?;

        let mut chunk_index = 0i32;
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<&str> = batch.iter().map(String::as_str).collect();
            let vectors = embeddings.embed_batch(&texts).await?;

            for (text, vector) in batch.iter().zip(vectors.iter()) {
                repo.insert_chunk(page_id, chunk_index, text, vector).await?;
                chunk_index += 1;
            }
        }

        total_chunks += chunks.len();
        tracing::info!(url = %page.url, chunks = chunks.len(), "page embedded");
    }

    tracing::info!(
        pages = pages.len(),
        chunks = total_chunks,
        "Seeding complete!"
    );
    Ok(())
}

/// Split page content into chunks on paragraph boundaries.
fn chunk_content(content: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if !current.is_empty() && current.len() + paragraph.len() > CHUNK_TARGET {
            chunks.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_content_empty() {
        assert!(chunk_content("").is_empty());
        assert!(chunk_content("\n\n\n\n").is_empty());
    }

    #[test]
    fn test_chunk_content_single_paragraph() {
        let chunks = chunk_content("Free shipping on orders over 50 euros.");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_chunk_content_splits_on_target() {
        let paragraph = "word ".repeat(200);
        let content = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");
        let chunks = chunk_content(&content);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.trim().is_empty());
        }
    }
}
