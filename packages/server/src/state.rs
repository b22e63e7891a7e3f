//! Shared application state for axum handlers.

use std::sync::Arc;

use sqlx::PgPool;
use studygen::{Llm, PipelineConfig};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub llm: Arc<dyn Llm>,
    pub pipeline_config: PipelineConfig,
}
