mod analysis;
mod config;
mod errors;
mod llm_client;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::analyzer::LlmAnalyzer;
use crate::analysis::extraction::PdfTextExtractor;
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
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

    info!("Starting resume fit API v{}", env!("CARGO_PKG_VERSION"));

    let analyzer =
        LlmAnalyzer::new(&config.llm, &config.limits).context("Failed to build LLM HTTP client")?;
    match analyzer.model() {
        Some(model) => info!("LLM analyzer initialized (model: {model})"),
        None => warn!("OPENAI_API_KEY is not set; analysis requests will return 503"),
    }
    info!(
        "Limits: document {} bytes, job description {} chars, resume {} chars, min extracted {} chars",
        config.limits.max_document_bytes,
        config.limits.max_job_description_chars,
        config.limits.max_resume_chars,
        config.limits.min_extracted_chars
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        extractor: Arc::new(PdfTextExtractor::new(config.extraction_timeout)),
        analyzer: Arc::new(analyzer),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
