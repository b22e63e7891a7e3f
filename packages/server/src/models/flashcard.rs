//! Flashcards with a simple spaced-repetition review schedule.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::chapter::ChapterId;

/// Starting ease factor for a card with no review history.
pub const INITIAL_EASE: f32 = 2.5;

/// Ease never decays below this.
pub const MIN_EASE: f32 = 1.3;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Flashcard {
    pub id: Uuid,
    pub chapter_id: ChapterId,
    pub front: String,
    pub back: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub flashcard_id: Uuid,
    pub quality: i32,
    pub ease_factor: f32,
    pub interval_days: i32,
    pub next_review: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// SM-2-style schedule update.
///
/// Quality below 3 resets the interval to one day and decays ease;
/// otherwise the interval grows by the ease factor, which itself is
/// nudged by quality and floored at `MIN_EASE`.
pub fn next_schedule(ease_factor: f32, interval_days: i32, quality: u8) -> (f32, i32) {
    let quality = quality.min(5);

    if quality < 3 {
        return ((ease_factor - 0.2).max(MIN_EASE), 1);
    }

    let penalty = (5 - quality) as f32;
    let ease = (ease_factor + 0.1 - penalty * (0.08 + penalty * 0.02)).max(MIN_EASE);
    let interval = match interval_days {
        0 => 1,
        1 => 6,
        days => (days as f32 * ease).round() as i32,
    };
    (ease, interval)
}

impl Flashcard {
    pub async fn create(
        chapter_id: ChapterId,
        front: &str,
        back: &str,
        category: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO flashcards (chapter_id, front, back, category)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(chapter_id)
        .bind(front)
        .bind(back)
        .bind(category)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn list_by_chapter(chapter_id: ChapterId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM flashcards WHERE chapter_id = $1 ORDER BY created_at",
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Cards due for review: never reviewed, or latest review's
    /// `next_review` has passed.
    pub async fn list_due(chapter_id: ChapterId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT f.* FROM flashcards f
            LEFT JOIN LATERAL (
                SELECT next_review FROM reviews
                WHERE flashcard_id = f.id
                ORDER BY created_at DESC LIMIT 1
            ) r ON true
            WHERE f.chapter_id = $1 AND (r.next_review IS NULL OR r.next_review <= now())
            ORDER BY f.created_at
            "#,
        )
        .bind(chapter_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Record a review, advancing the card's schedule from its latest
    /// review (or the initial state for a fresh card).
    pub async fn record_review(flashcard_id: Uuid, quality: u8, pool: &PgPool) -> Result<Review> {
        let previous: Option<Review> = sqlx::query_as(
            "SELECT * FROM reviews WHERE flashcard_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(flashcard_id)
        .fetch_optional(pool)
        .await?;

        let (ease, interval) = match previous {
            Some(review) => next_schedule(review.ease_factor, review.interval_days, quality),
            None => next_schedule(INITIAL_EASE, 0, quality),
        };
        let next_review = Utc::now() + Duration::days(interval as i64);

        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (flashcard_id, quality, ease_factor, interval_days, next_review)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(flashcard_id)
        .bind(quality as i32)
        .bind(ease)
        .bind(interval)
        .bind(next_review)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Delete a chapter's flashcards, reviews first.
    pub async fn delete_for_chapter(chapter_id: ChapterId, pool: &PgPool) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "DELETE FROM reviews WHERE flashcard_id IN (SELECT id FROM flashcards WHERE chapter_id = $1)",
        )
        .bind(chapter_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM flashcards WHERE chapter_id = $1")
            .bind(chapter_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_review_resets_interval() {
        let (ease, interval) = next_schedule(2.5, 14, 1);
        assert_eq!(interval, 1);
        assert!(ease < 2.5);
    }

    #[test]
    fn test_ease_never_drops_below_floor() {
        let (ease, _) = next_schedule(1.3, 5, 0);
        assert!((ease - MIN_EASE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_interval_progression() {
        // Fresh card → 1 day → 6 days → grows by ease
        let (ease, interval) = next_schedule(INITIAL_EASE, 0, 5);
        assert_eq!(interval, 1);

        let (ease, interval) = next_schedule(ease, interval, 5);
        assert_eq!(interval, 6);

        let (_, interval) = next_schedule(ease, interval, 5);
        assert!(interval > 6);
    }

    #[test]
    fn test_hesitant_recall_slows_growth() {
        let (ease_confident, _) = next_schedule(2.5, 6, 5);
        let (ease_hesitant, _) = next_schedule(2.5, 6, 3);
        assert!(ease_hesitant < ease_confident);
    }
}
