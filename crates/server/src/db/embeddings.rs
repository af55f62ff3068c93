//! Database operations for scraped pages and their chunk embeddings.
//!
//! Used by the seeding CLI; the chat path only reads these tables through
//! the semantic index.

use anchorchat_core::{OrganizationId, PageId};
use sqlx::PgPool;

use super::RepositoryError;
use crate::search::format_embedding;

/// Repository for scraped page and embedding writes.
pub struct EmbeddingRepository {
    pool: PgPool,
}

impl EmbeddingRepository {
    /// Create a new embedding repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a scraped page, returning its ID.
    ///
    /// Re-scraping a URL clears its old chunks so stale content never
    /// outranks the fresh scrape.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_page(
        &self,
        organization_id: OrganizationId,
        url: &str,
        title: Option<&str>,
    ) -> Result<PageId, RepositoryError> {
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO scraped_page (organization_id, url, title)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, url)
            DO UPDATE SET title = EXCLUDED.title, scraped_at = NOW()
            RETURNING id
            ",
        )
        .bind(organization_id.as_i64())
        .bind(url)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query("DELETE FROM page_embedding WHERE page_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(PageId::new(id))
    }

    /// Insert a chunk embedding for a page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_chunk(
        &self,
        page_id: PageId,
        chunk_index: i32,
        chunk_text: &str,
        embedding: &[f32],
    ) -> Result<(), RepositoryError> {
        let embedding_str = format_embedding(embedding);

        sqlx::query(
            r"
            INSERT INTO page_embedding (page_id, chunk_index, chunk_text, embedding)
            VALUES ($1, $2, $3, $4::vector)
            ",
        )
        .bind(page_id.as_i64())
        .bind(chunk_index)
        .bind(chunk_text)
        .bind(&embedding_str)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
