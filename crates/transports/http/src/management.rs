//! Forwarding management and federation endpoints
//!
//! Both surfaces answer 503 when their backing component is disabled;
//! everything else maps through the shared error taxonomy.

use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mcp_gateway_core::ForwardingTarget;
use mcp_gateway_forwarding::{FederatedServer, FederationRouter, ForwardingEngine};
use mcp_gateway_proto::generated::McpRequest;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn engine(state: &AppState) -> Result<&Arc<ForwardingEngine>, ApiError> {
    state
        .engine
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("forwarding engine"))
}

fn federation(state: &AppState) -> Result<&Arc<FederationRouter>, ApiError> {
    state
        .federation
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("federation"))
}

/// GET /api/v1/forwarding/targets
pub async fn list_targets(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(engine(&state)?.list_targets().await))
}

/// POST /api/v1/forwarding/targets
pub async fn create_target(
    State(state): State<AppState>,
    Json(target): Json<ForwardingTarget>,
) -> Result<impl IntoResponse, ApiError> {
    let target_id = target.id.clone();
    engine(&state)?.add_target(target).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"status": "created", "target_id": target_id})),
    ))
}

/// GET /api/v1/forwarding/targets/{id}
pub async fn get_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(engine(&state)?.get_target(&id).await?))
}

/// PUT /api/v1/forwarding/targets/{id}
pub async fn update_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(target): Json<ForwardingTarget>,
) -> Result<impl IntoResponse, ApiError> {
    engine(&state)?.replace_target(&id, target).await?;
    Ok(Json(json!({"status": "updated", "target_id": id})))
}

/// DELETE /api/v1/forwarding/targets/{id}
pub async fn delete_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    engine(&state)?.remove_target(&id).await?;
    Ok(Json(json!({"status": "deleted", "target_id": id})))
}

/// GET /api/v1/forwarding/metrics
pub async fn forwarding_metrics(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(engine(&state)?.metrics().await))
}

/// GET /api/v1/federation/servers
pub async fn list_servers(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(federation(&state)?.list().await))
}

/// POST /api/v1/federation/servers
pub async fn register_server(
    State(state): State<AppState>,
    Json(server): Json<FederatedServer>,
) -> Result<impl IntoResponse, ApiError> {
    let name = server.name.clone();
    federation(&state)?.register(server).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"status": "created", "server": name})),
    ))
}

/// DELETE /api/v1/federation/servers/{name}
pub async fn deregister_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    federation(&state)?.deregister(&name).await?;
    Ok(Json(json!({"status": "deleted", "server": name})))
}

/// Invocation body accepted over HTTP
#[derive(Debug, Deserialize)]
pub struct InvocationBody {
    /// Caller-chosen correlation id
    pub id: String,
    /// Opaque method name
    pub method: String,
    /// Opaque JSON parameters
    #[serde(default)]
    pub params: serde_json::Value,
    /// Free-form metadata forwarded verbatim
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// POST /api/v1/federation/servers/{name}/invoke
pub async fn invoke_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<InvocationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request = McpRequest {
        id: body.id,
        method: body.method,
        params: body.params.to_string(),
        metadata: body.metadata,
    };

    let reply = federation(&state)?.invoke(&name, request).await?;
    let result: serde_json::Value =
        serde_json::from_str(&reply.result).unwrap_or(serde_json::Value::String(reply.result));
    Ok(Json(json!({
        "id": reply.id,
        "result": result,
        "error": if reply.error.is_empty() { serde_json::Value::Null } else { json!(reply.error) },
    })))
}
