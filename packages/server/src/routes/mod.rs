//! HTTP surface.

pub mod chapters;
pub mod restructure;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chapters", get(chapters::list))
        .route("/api/chapters/:id", get(chapters::get).delete(chapters::remove))
        .route("/api/chapters/:id/restructure", post(restructure::restructure))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
