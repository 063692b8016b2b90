//! Thin web front end: drive the pipeline, watch progress, fetch results.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

mod backend;
mod handlers;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/api/run", post(handlers::start_run))
        .route("/api/progress", get(handlers::progress))
        .route("/api/progress/stream", get(handlers::progress_stream))
        .route("/api/results", get(handlers::results))
        .route("/api/status", get(handlers::status))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port: u16 = std::env::var("LITREVIEW_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = format!("0.0.0.0:{port}");
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
