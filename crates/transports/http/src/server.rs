//! HTTP server: shared state, router, and bootstrap

use crate::{ingest, management, system};
use axum::routing::{delete, get, post};
use axum::Router;
use mcp_gateway_core::{Error, IngestCore, Result};
use mcp_gateway_forwarding::{FederationRouter, ForwardingEngine};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared ingestion core (owns metrics and the stream registry)
    pub ingest: Arc<IngestCore>,
    /// Forwarding engine; absent when forwarding is disabled
    pub engine: Option<Arc<ForwardingEngine>>,
    /// Federation catalog; absent when federation is disabled
    pub federation: Option<Arc<FederationRouter>>,
}

/// HTTP server for the gateway's REST surface
pub struct HttpServer {
    bind_address: String,
    state: AppState,
}

impl HttpServer {
    /// Create a server bound to `bind_address` once served
    pub fn new(bind_address: String, state: AppState) -> Self {
        Self {
            bind_address,
            state,
        }
    }

    /// Build the router with all endpoints
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            // Ingestion
            .route("/api/v1/events", post(ingest::ingest_event))
            .route("/api/v1/events/batch", post(ingest::ingest_batch))
            .route("/mcp", post(ingest::ingest_legacy))
            // Forwarding management
            .route(
                "/api/v1/forwarding/targets",
                get(management::list_targets).post(management::create_target),
            )
            .route(
                "/api/v1/forwarding/targets/:id",
                get(management::get_target)
                    .put(management::update_target)
                    .delete(management::delete_target),
            )
            .route("/api/v1/forwarding/metrics", get(management::forwarding_metrics))
            // Federation
            .route(
                "/api/v1/federation/servers",
                get(management::list_servers).post(management::register_server),
            )
            .route(
                "/api/v1/federation/servers/:name",
                delete(management::deregister_server),
            )
            .route(
                "/api/v1/federation/servers/:name/invoke",
                post(management::invoke_server),
            )
            // System
            .route("/api/v1/metrics", get(system::metrics))
            .route("/stats", get(system::metrics))
            .route("/health", get(system::health))
            .route("/ready", get(system::ready))
            .with_state(state)
            .layer(
                tower::ServiceBuilder::new()
                    .layer(tower_http::trace::TraceLayer::new_for_http())
                    .layer(tower_http::cors::CorsLayer::permissive())
                    .layer(tower_http::timeout::TimeoutLayer::new(
                        mcp_gateway_core::config::HTTP_WRITE_TIMEOUT,
                    )),
            )
    }

    /// Serve until `shutdown` resolves
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr: std::net::SocketAddr = self
            .bind_address
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {e}")))?;

        let router = Self::build_router(self.state);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Unavailable(format!("failed to bind {addr}: {e}")))?;

        info!(%addr, "HTTP server listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Unavailable(format!("HTTP server failed: {e}")))
    }
}
