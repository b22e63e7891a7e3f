//! Postgres-backed persistence seam for the pipeline.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use studygen::{ChapterSink, RestructuredGuide};

use crate::models::Chapter;

/// Saves pipeline output as new chapter rows.
#[derive(Clone)]
pub struct PgChapterSink {
    pool: PgPool,
}

impl PgChapterSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChapterSink for PgChapterSink {
    async fn save_restructured(
        &self,
        guide: &RestructuredGuide,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let chapter = Chapter::create_restructured(guide, &self.pool)
            .await
            .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { e.into() })?;
        Ok(chapter.id)
    }
}
