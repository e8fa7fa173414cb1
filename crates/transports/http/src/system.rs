//! Health, readiness, and counter endpoints

use crate::server::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::json;

/// GET /api/v1/metrics and GET /stats
pub async fn metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.ingest.metrics().snapshot();
    Json(serde_json::to_value(snapshot).unwrap_or_else(|_| json!({})))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.ingest.metrics().snapshot();
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": snapshot.uptime_seconds,
        "stats": snapshot,
    }))
}

/// GET /ready
pub async fn ready() -> Json<serde_json::Value> {
    Json(json!({"status": "ready"}))
}
