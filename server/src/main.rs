use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use image_suite_core::removal::{MemoizedRemover, RembgClient};
use image_suite_core::{BatchRunner, PipelineConfig};

mod config;
mod handlers;
mod state;

use config::ServerConfig;
use state::AppState;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env();

    // The blocking HTTP client is created here, outside the async runtime,
    // and dropped after it.
    let client = RembgClient::new(&config.rembg_url, config.rembg_timeout)
        .context("Failed to set up rembg client")?;
    let remover = MemoizedRemover::with_capacity(client, config.cache_capacity);
    let runner = BatchRunner::new(PipelineConfig::default()).with_remover(Arc::new(remover));
    let state = Arc::new(AppState::with_capacity(runner, config.session_capacity));

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(&config, Arc::clone(&state)))
}

async fn serve(config: &ServerConfig, state: Arc<AppState>) -> Result<()> {
    let app = app(state, config.body_limit);

    log::info!("🚀 Image Suite Server running on http://{}", config.addr);
    log::info!("🪄 Cutout model: {}", config.rembg_url);
    log::info!("🗂️ Session limit: {}", config.session_capacity);
    log::info!("📖 API endpoints:");
    log::info!("   POST /convert - Convert images to JPEG/PNG/WebP");
    log::info!("   POST /remove-background - Remove image backgrounds");
    log::info!("   GET  /sessions/:id/files/:key - Download results");
    log::info!("   POST /sessions/:id/reset - Clear session results");
    log::info!("   GET  /health - Health check");

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn app(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/convert", post(handlers::convert))
        .route("/remove-background", post(handlers::remove_background))
        .route("/sessions/:id/files/:key", get(handlers::download))
        .route("/sessions/:id/reset", post(handlers::reset))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    concat!(
        "Image Suite Server v",
        env!("CARGO_PKG_VERSION"),
        "\n\nAPI Endpoints:\n",
        "  POST /convert\n",
        "  POST /remove-background\n",
        "  GET  /sessions/:id/files/:key\n",
        "  POST /sessions/:id/reset\n",
        "  GET  /health\n"
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
