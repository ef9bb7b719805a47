mod activity;
mod arxiv;
mod auth_client;
mod catalog;
mod config;
mod db;
mod errors;
mod library;
mod models;
mod recommend;
mod routes;
mod state;
mod text;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::arxiv::cache::CachedPaperSource;
use crate::arxiv::ArxivClient;
use crate::auth_client::AuthClient;
use crate::config::Config;
use crate::db::create_pool;
use crate::recommend::TfIdfRecommender;
use crate::routes::build_router;
use crate::state::AppState;
use crate::text::keywords::KeywordExtractor;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting survey service v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    let auth = AuthClient::new(&config.auth_service_url)?;
    info!("Verifying callers against {}", config.auth_service_url);

    // arXiv client behind the Redis result cache
    let redis = redis::Client::open(config.redis_url.clone())?;
    let arxiv = ArxivClient::new(&config.arxiv_api_url)?;
    let papers = CachedPaperSource::new(Arc::new(arxiv), redis, config.arxiv_cache_ttl_secs);
    info!(
        "arXiv source initialized ({}, cache ttl {}s)",
        config.arxiv_api_url, config.arxiv_cache_ttl_secs
    );

    let state = AppState {
        db,
        auth,
        papers: Arc::new(papers),
        keywords: Arc::new(KeywordExtractor::new()),
        recommender: Arc::new(TfIdfRecommender),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
