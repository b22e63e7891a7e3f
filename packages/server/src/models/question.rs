//! Quiz questions and answer attempts.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::chapter::{encode_list, ChapterId};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: Uuid,
    pub chapter_id: ChapterId,
    pub text: String,
    pub options: String, // JSON-encoded array of option strings
    pub correct_index: i32,
    pub explanation: String,
    pub difficulty: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// One recorded user answer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attempt {
    pub id: Uuid,
    pub question_id: Uuid,
    pub selected_index: i32,
    pub correct: bool,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub async fn create(
        chapter_id: ChapterId,
        text: &str,
        options: &[String],
        correct_index: i32,
        explanation: &str,
        difficulty: &str,
        category: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO questions (chapter_id, text, options, correct_index, explanation, difficulty, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(chapter_id)
        .bind(text)
        .bind(encode_list(options))
        .bind(correct_index)
        .bind(explanation)
        .bind(difficulty)
        .bind(category)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn list_by_chapter(chapter_id: ChapterId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM questions WHERE chapter_id = $1 ORDER BY created_at",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Record a user's answer, grading it against `correct_index`.
    pub async fn record_attempt(
        question_id: Uuid,
        selected_index: i32,
        pool: &PgPool,
    ) -> Result<Attempt> {
        let question = Self::find_by_id(question_id, pool)
            .await?
            .ok_or_else(|| anyhow::anyhow!("question not found: {question_id}"))?;
        let correct = selected_index == question.correct_index;

        sqlx::query_as::<_, Attempt>(
            r#"
            INSERT INTO attempts (question_id, selected_index, correct)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(question_id)
        .bind(selected_index)
        .bind(correct)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Delete a chapter's questions, attempts first.
    pub async fn delete_for_chapter(chapter_id: ChapterId, pool: &PgPool) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "DELETE FROM attempts WHERE question_id IN (SELECT id FROM questions WHERE chapter_id = $1)",
        )
        .bind(chapter_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM questions WHERE chapter_id = $1")
            .bind(chapter_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
