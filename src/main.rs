//! Tuition chat backend
//!
//! A WebSocket chat service that answers tuition questions, looks up and
//! pays tuition through the university APIs, and falls back to a local
//! language model for everything else.

mod agent;
mod api;
mod config;
mod db;
mod llm;
mod runtime;
mod services;
mod session;
mod system_prompt;

use agent::Orchestrator;
use api::{create_router, AppState, Gateway};
use axum::http::{Extensions, HeaderMap, StatusCode, Version};
use config::AppConfig;
use db::Database;
use llm::{LlmService, LoggingService, OllamaService};
use runtime::{ChatRuntime, DatabaseStorage};
use services::{AddressService, TokenCache, TuitionService};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::{predicate::DefaultPredicate, CompressionLayer, Predicate},
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuition_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    if config.upstream.tuition_base_url.is_none() {
        tracing::warn!("TUITION_API_BASE_URL not set; tuition lookups and payments will fail");
    }
    if config.upstream.address_base_url.is_none() {
        tracing::warn!("ADDRESS_API_BASE_URL not set; address lookups will fail");
    }

    let client = reqwest::Client::new();
    let ollama: Arc<dyn LlmService> = Arc::new(OllamaService::new(&config.llm));
    let llm = LoggingService::new(ollama);
    tracing::info!(model = %llm.model_id(), url = %config.llm.base_url, "Language model configured");

    let tuition = TuitionService::new(
        client.clone(),
        config.upstream.tuition_base_url.clone(),
        config.upstream.credentials.clone(),
        Arc::new(TokenCache::new()),
    );
    let addresses = AddressService::new(client.clone(), config.upstream.address_base_url.clone());

    let runtime = ChatRuntime::new(
        DatabaseStorage::new(db),
        Orchestrator::new(llm, tuition, addresses),
    );
    let state = AppState::new(runtime, Gateway::new(client, &config.upstream));

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true)
        .compress_when(DefaultPredicate::new().and(not_upgrade));

    let app = create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(compression),
    );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Tuition chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// WebSocket handshakes must pass through uncompressed
fn not_upgrade(status: StatusCode, _: Version, _: &HeaderMap, _: &Extensions) -> bool {
    status != StatusCode::SWITCHING_PROTOCOLS
}
