//! pgvector-backed semantic index over scraped page chunks.

use anchorchat_core::{OrganizationId, TenantDomain};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use super::{EmbeddingClient, SearchError};

/// Minimum cosine similarity for a chunk to count as a hit (0.0 to 1.0).
const MIN_SIMILARITY_SCORE: f64 = 0.5;

/// A scraped-content chunk matching a search query.
#[derive(Debug, Clone)]
pub struct ContentHit {
    /// Source page URL.
    pub url: String,
    /// Page title.
    pub title: Option<String>,
    /// Matching chunk text.
    pub snippet: String,
    /// Cosine similarity to the query (0.0 to 1.0).
    pub similarity: f64,
}

/// Semantic search over a tenant's scraped content.
#[async_trait::async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Find content chunks similar to the query for the given tenant.
    ///
    /// # Errors
    ///
    /// Returns `SearchError` if embedding or the database query fails.
    async fn search(
        &self,
        organization_id: OrganizationId,
        domain: &TenantDomain,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ContentHit>, SearchError>;
}

/// Default [`SemanticIndex`] over the `page_embedding` table.
pub struct PgSemanticIndex {
    embeddings: EmbeddingClient,
    pool: PgPool,
}

impl PgSemanticIndex {
    #[must_use]
    pub const fn new(embeddings: EmbeddingClient, pool: PgPool) -> Self {
        Self { embeddings, pool }
    }
}

#[async_trait::async_trait]
impl SemanticIndex for PgSemanticIndex {
    /// Uses pgvector's cosine distance operator (`<=>`) for similarity search.
    /// `SQLx` doesn't have built-in pgvector support, so we use runtime queries.
    #[instrument(skip(self, query), fields(query_len = query.len(), %domain))]
    async fn search(
        &self,
        organization_id: OrganizationId,
        domain: &TenantDomain,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ContentHit>, SearchError> {
        let embedding = self.embeddings.embed(query).await?;
        let embedding_str = format_embedding(&embedding);

        let rows = sqlx::query(
            r"
            SELECT p.url, p.title, e.chunk_text,
                   1 - (e.embedding <=> $1::vector) AS similarity
            FROM page_embedding e
            JOIN scraped_page p ON p.id = e.page_id
            WHERE p.organization_id = $2
            AND 1 - (e.embedding <=> $1::vector) > $3
            ORDER BY similarity DESC
            LIMIT $4
            ",
        )
        .bind(&embedding_str)
        .bind(i64::from(organization_id))
        .bind(MIN_SIMILARITY_SCORE)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let hits: Vec<ContentHit> = rows
            .into_iter()
            .filter_map(|r| {
                let similarity: Option<f64> = r.get("similarity");
                similarity.map(|similarity| ContentHit {
                    url: r.get("url"),
                    title: r.get("title"),
                    snippet: r.get("chunk_text"),
                    similarity,
                })
            })
            .collect();

        debug!(hit_count = hits.len(), "semantic search complete");

        Ok(hits)
    }
}

/// Format an embedding vector for pgvector.
pub(crate) fn format_embedding(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(ToString::to_string).collect();
    format!("[{}]", values.join(","))
}
