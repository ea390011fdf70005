//! ==============================================================================
//! server.rs - dashboard web server
//! ==============================================================================
//!
//! routes:
//!     GET /        html table of the latest readings
//!     GET /api     the same DisplayState as json
//!     GET /health  liveness check
//!
//! handlers only read the DisplayStore; the poller is the only writer.
//!
//! ==============================================================================

use crate::dashboard;
use crate::domain::{DisplayState, DisplayStore};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::{Html, Json},
    routing::get,
    Router,
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub store: DisplayStore,
    pub page_refresh_seconds: u64,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api", get(api_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// serve until `shutdown` resolves
pub async fn run_server<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("✓ Dashboard live at http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("web server error")?;
    Ok(())
}

async fn dashboard_handler(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.store.snapshot().await;
    Html(dashboard::render_page(&snapshot, state.page_refresh_seconds))
}

/// json api endpoint for programmatic access
async fn api_handler(State(state): State<AppState>) -> Json<DisplayState> {
    Json(state.store.snapshot().await)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
