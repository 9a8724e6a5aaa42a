mod assessment;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod repo_content;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::assessment::poller::start_sweeps;
use crate::assessment::requester::{AnalysisRequester, BackoffPolicy};
use crate::assessment::{AssessmentPipeline, PipelineSettings};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::repo_content::GithubContentSource;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgAssessmentStore;

/// How long a running sweep may keep going after a shutdown signal.
const SWEEP_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting assess-api v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgAssessmentStore::new(db));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let content = Arc::new(GithubContentSource::new(config.github_token.clone()));
    if config.github_token.is_none() {
        info!("GITHUB_TOKEN not set; repository fetches are unauthenticated");
    }

    let settings = PipelineSettings::from_config(&config);
    info!(
        "Sweeps: analysis every {}s (batch {}, pacing {}s), report every {}s",
        settings.analysis_interval.as_secs(),
        settings.batch_size,
        settings.pacing.as_secs(),
        settings.report_interval.as_secs()
    );
    let pipeline = AssessmentPipeline::new(
        store,
        AnalysisRequester::new(Arc::new(llm), BackoffPolicy::default()),
        content,
        settings,
    );

    let sweeps = start_sweeps(pipeline.clone()).await?;

    // Build app state
    let state = AppState { pipeline };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the recruiter UI host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped; stopping sweeps");
    sweeps.shutdown(SWEEP_SHUTDOWN_GRACE).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
