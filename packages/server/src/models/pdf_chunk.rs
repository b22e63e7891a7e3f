//! PdfChunk - raw binary blobs of a few PDF pages, staged per chapter.
//!
//! Keyed by (source, number, chunk_index) and consumed when chapters are
//! merged into full PDFs for LLM submission.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PdfChunk {
    pub id: Uuid,
    pub source: String,
    pub number: i32,
    pub chunk_index: i32,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl PdfChunk {
    /// Store a chunk, replacing any previous upload at the same index.
    pub async fn upsert(
        source: &str,
        number: i32,
        chunk_index: i32,
        data: &[u8],
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO pdf_chunks (source, number, chunk_index, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source, number, chunk_index) DO UPDATE SET data = EXCLUDED.data
            RETURNING *
            "#,
        )
        .bind(source)
        .bind(number)
        .bind(chunk_index)
        .bind(data)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// All chunks for a chapter, in merge order.
    pub async fn list_for_chapter(source: &str, number: i32, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM pdf_chunks WHERE source = $1 AND number = $2 ORDER BY chunk_index",
        )
        .bind(source)
        .bind(number)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Drop a chapter's staging chunks once they have been consumed.
    pub async fn delete_for_chapter(source: &str, number: i32, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM pdf_chunks WHERE source = $1 AND number = $2")
            .bind(source)
            .bind(number)
            .execute(pool)
            .await?;
        Ok(())
    }
}
