//! SSE restructuring endpoint.
//!
//! POST /api/chapters/:id/restructure  { "language": "fr" }
//!
//! Responds with a `text/event-stream` of JSON pipeline events,
//! terminated by a `completed` or `failed` event. Comment heartbeats
//! keep intermediate proxies from timing out the connection. The
//! pipeline runs in a spawned task: a client disconnect does not cancel
//! in-flight LLM calls, the run finishes (or fails) on its own and the
//! final event is simply undeliverable.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use studygen::{ChapterInput, Pipeline, RestructureOptions};

use crate::models::Chapter;
use crate::routes::chapters::internal_error;
use crate::sink::PgChapterSink;
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Default, Deserialize)]
pub struct RestructureBody {
    pub language: Option<String>,
}

pub async fn restructure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<RestructureBody>>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let chapter = Chapter::find_by_id(id, &state.pool)
        .await
        .map_err(internal_error)?
        .ok_or((StatusCode::NOT_FOUND, format!("chapter not found: {id}")))?;

    let opts = RestructureOptions {
        language: body.and_then(|Json(body)| body.language),
    };
    let input = ChapterInput {
        id: chapter.id,
        source: chapter.source.clone(),
        number: chapter.number,
        title: chapter.title.clone(),
        study_guide: chapter.study_guide,
    };

    let pipeline = Pipeline::new(
        state.llm.clone(),
        Arc::new(PgChapterSink::new(state.pool.clone())),
        state.pipeline_config.clone(),
    );

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // Result is ignored here: the terminal event already carries it
        let _ = pipeline.run(input, opts, tx).await;
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        let sse_event = Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data("{}"));
        Ok::<_, Infallible>(sse_event)
    });

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")))
}
