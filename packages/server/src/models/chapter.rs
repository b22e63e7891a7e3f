//! Chapter - a persisted unit of study content scoped to one textbook
//! section, identified by (source, number).
//!
//! Pipeline output is stored as a new row under a derived source key;
//! the original row is never written by the pipeline.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use studygen::RestructuredGuide;

pub type ChapterId = Uuid;

/// Suffix appended to the source key of pipeline-generated chapters, so
/// restructured copies satisfy the (source, number) uniqueness without
/// colliding with their originals.
pub const RESTRUCTURED_SOURCE_SUFFIX: &str = "-restructured";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chapter {
    pub id: ChapterId,
    pub source: String,
    pub number: i32,
    pub title: String,
    pub summary: String,
    pub study_guide: String,
    pub key_points: String, // JSON-encoded array of strings
    pub high_yield: String, // JSON-encoded array of strings
    pub mnemonics: String,  // JSON-encoded array of strings
    pub language: String,
    pub prompt_hash: String, // restructure prompt revision, empty for ingested chapters
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    /// Create a chapter on ingest or import.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        source: &str,
        number: i32,
        title: &str,
        summary: &str,
        study_guide: &str,
        language: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO chapters (source, number, title, summary, study_guide, language)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(source)
        .bind(number)
        .bind(title)
        .bind(summary)
        .bind(study_guide)
        .bind(language)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: ChapterId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM chapters WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_source_number(
        source: &str,
        number: i32,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM chapters WHERE source = $1 AND number = $2")
            .bind(source)
            .bind(number)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn list_by_source(source: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM chapters WHERE source = $1 ORDER BY number")
            .bind(source)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM chapters ORDER BY source, number")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Update free-text content in place (regeneration actions).
    pub async fn update_content(
        id: ChapterId,
        summary: &str,
        study_guide: &str,
        key_points: &[String],
        high_yield: &[String],
        mnemonics: &[String],
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE chapters
            SET summary = $2, study_guide = $3, key_points = $4,
                high_yield = $5, mnemonics = $6, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(summary)
        .bind(study_guide)
        .bind(encode_list(key_points))
        .bind(encode_list(high_yield))
        .bind(encode_list(mnemonics))
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Persist a pipeline result as a new chapter under the derived
    /// source key. Re-running the pipeline for the same chapter upserts
    /// the derived row; the original is untouched.
    pub async fn create_restructured(guide: &RestructuredGuide, pool: &PgPool) -> Result<Self> {
        let source = format!("{}{}", guide.source, RESTRUCTURED_SOURCE_SUFFIX);
        let summary = format!(
            "Restructured study guide ({} facts restored)",
            guide.facts_restored
        );
        let language = guide.language.as_deref().unwrap_or("en");

        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO chapters (source, number, title, summary, study_guide, language, prompt_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source, number) DO UPDATE SET
                title = EXCLUDED.title,
                summary = EXCLUDED.summary,
                study_guide = EXCLUDED.study_guide,
                language = EXCLUDED.language,
                prompt_hash = EXCLUDED.prompt_hash,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(&source)
        .bind(guide.number)
        .bind(&guide.title)
        .bind(&summary)
        .bind(&guide.study_guide)
        .bind(language)
        .bind(&guide.prompt_hash)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Delete a chapter and everything hanging off it.
    ///
    /// Order: attempts → questions → reviews → flashcards → pdf chunks →
    /// chapter, all in one transaction.
    pub async fn delete(id: ChapterId, pool: &PgPool) -> Result<()> {
        let mut tx = pool.begin().await?;

        let row: Option<(String, i32)> =
            sqlx::query_as("SELECT source, number FROM chapters WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((source, number)) = row else {
            return Ok(());
        };

        sqlx::query(
            "DELETE FROM attempts WHERE question_id IN (SELECT id FROM questions WHERE chapter_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM questions WHERE chapter_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM reviews WHERE flashcard_id IN (SELECT id FROM flashcards WHERE chapter_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM flashcards WHERE chapter_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pdf_chunks WHERE source = $1 AND number = $2")
            .bind(&source)
            .bind(number)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Decoded key points.
    pub fn key_points_list(&self) -> Vec<String> {
        decode_list(&self.key_points)
    }

    /// Decoded high-yield facts.
    pub fn high_yield_list(&self) -> Vec<String> {
        decode_list(&self.high_yield)
    }

    /// Decoded mnemonics.
    pub fn mnemonics_list(&self) -> Vec<String> {
        decode_list(&self.mnemonics)
    }
}

/// Encode a string list for a JSON-encoded TEXT column.
pub fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a JSON-encoded TEXT column; malformed content reads as empty.
pub fn decode_list(encoded: &str) -> Vec<String> {
    serde_json::from_str(encoded).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_round_trip() {
        let items = vec!["AAA repair at 5.5 cm".to_string(), "WES sign".to_string()];
        assert_eq!(decode_list(&encode_list(&items)), items);
    }

    #[test]
    fn test_malformed_list_reads_empty() {
        assert!(decode_list("not json").is_empty());
        assert!(decode_list("").is_empty());
    }

    #[test]
    fn test_restructured_source_key_is_derived() {
        assert_eq!(
            format!("core-radiology{}", RESTRUCTURED_SOURCE_SUFFIX),
            "core-radiology-restructured"
        );
    }
}
