//! RadPrep HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anthropic_client::AnthropicClient;
use server_core::config::Config;
use server_core::routes;
use server_core::state::AppState;
use studygen::{AnthropicLlm, Llm, PipelineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,studygen=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting RadPrep server");

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let client = AnthropicClient::new(config.anthropic_api_key.clone());
    let llm: Arc<dyn Llm> = Arc::new(AnthropicLlm::new(client));

    let mut pipeline_config = PipelineConfig::default();
    if let Some(model) = config.model.clone() {
        pipeline_config.model = model;
    }
    if let Some(model) = config.verifier_model.clone() {
        pipeline_config.verifier_model = model;
    }

    let state = AppState {
        pool,
        llm,
        pipeline_config,
    };
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "RadPrep server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind server port")?;
    axum::serve(listener, app)
        .await
        .context("Server exited with error")?;

    Ok(())
}
