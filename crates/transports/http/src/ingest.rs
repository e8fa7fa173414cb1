//! Ingestion endpoints: unary, batch, and legacy

use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mcp_gateway_core::ingest::{LegacyEvent, MAX_BATCH_EVENTS};
use mcp_gateway_core::{Error, Event};
use serde_json::json;

/// POST /api/v1/events
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<Event>,
) -> Result<impl IntoResponse, ApiError> {
    let ack = state.ingest.ingest(event).await?;
    Ok(Json(ack))
}

/// POST /api/v1/events/batch
///
/// The list size is checked here so an oversized batch maps to 413
/// rather than a generic 400.
pub async fn ingest_batch(
    State(state): State<AppState>,
    Json(events): Json<Vec<Event>>,
) -> Result<impl IntoResponse, ApiError> {
    if events.is_empty() {
        return Err(Error::invalid_argument("batch is empty").into());
    }
    if events.len() > MAX_BATCH_EVENTS {
        let body = Json(json!({
            "error": "payload_too_large",
            "message": format!("batch exceeds {MAX_BATCH_EVENTS} events"),
        }));
        return Ok((StatusCode::PAYLOAD_TOO_LARGE, body).into_response());
    }

    let outcome = state.ingest.ingest_batch(events).await?;
    Ok(Json(outcome).into_response())
}

/// POST /mcp
pub async fn ingest_legacy(
    State(state): State<AppState>,
    Json(legacy): Json<LegacyEvent>,
) -> Result<impl IntoResponse, ApiError> {
    state.ingest.ingest_legacy(legacy).await?;
    Ok(Json(json!({"status": "accepted"})))
}
