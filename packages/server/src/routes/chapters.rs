//! Thin JSON CRUD over chapters.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::Chapter;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub source: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Chapter>>, (StatusCode, String)> {
    let chapters = match query.source {
        Some(source) => Chapter::list_by_source(&source, &state.pool).await,
        None => Chapter::list(&state.pool).await,
    }
    .map_err(internal_error)?;

    Ok(Json(chapters))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Chapter>, (StatusCode, String)> {
    let chapter = Chapter::find_by_id(id, &state.pool)
        .await
        .map_err(internal_error)?
        .ok_or((StatusCode::NOT_FOUND, format!("chapter not found: {id}")))?;

    Ok(Json(chapter))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    Chapter::delete(id, &state.pool)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    tracing::error!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
