//! HTTP adapter for the dashboard.
//!
//! - `GET /` - dashboard page, polls `/data`
//! - `GET /data` - [`DashboardView`] as JSON
//! - `GET /health` - liveness, independent of ingest health

use super::view::{DashboardView, build_view};
use crate::config::HttpConfig;
use crate::error::Result;
use crate::pipeline::SnapshotCache;
use crate::store::DocumentStore;
use axum::extract::State;
use axum::response::{Html, Json};
use axum::Router;
use axum::routing::get;
use log::info;
use serde_json::{Value, json};
use std::sync::Arc;

const INDEX_HTML: &str = include_str!("index.html");

/// Shared state for the dashboard handlers.
#[derive(Clone)]
pub struct DashboardState {
    pub cache: Arc<SnapshotCache>,
    pub store: Arc<dyn DocumentStore>,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn data(State(state): State<DashboardState>) -> Json<DashboardView> {
    Json(build_view(&state.cache, state.store.as_ref()).await)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/data", get(data))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until the task is dropped.
pub async fn serve(config: &HttpConfig, state: DashboardState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("[Dashboard] Listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
