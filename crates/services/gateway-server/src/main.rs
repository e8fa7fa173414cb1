//! Gateway server binary entry point
//!
//! Starts the MCP event gateway: gRPC and HTTP ingestion transports, the
//! forwarding engine, the federation catalog, and a standalone
//! health/readiness listener.
//!
//! # Environment Variables
//!
//! - `HTTP_PORT`: REST listener port (default: `8080`)
//! - `GRPC_PORT`: gRPC listener port (default: `50051`)
//! - `HEALTH_PORT`: health/readiness listener port (default: `8081`)
//! - `LOG_LEVEL`: `debug`, `info`, `warn`, or `error` (default: `info`)
//! - `FORWARDING_ENABLED`: start the forwarding engine (default: `true`)
//! - `FORWARDING_TARGETS`: inline JSON list of target definitions
//! - `FORWARDING_CONFIG_FILE`: JSON file with the same shape

use anyhow::Context;
use mcp_gateway_core::config::{GatewayConfig, SHUTDOWN_GRACE};
use mcp_gateway_core::{GatewayMetrics, IngestCore, StreamRegistry};
use mcp_gateway_forwarding::{FederationRouter, ForwardingEngine};
use mcp_gateway_grpc::{GatewayGrpcService, ServiceMetrics};
use mcp_gateway_http::{AppState, HttpServer};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("configuration error")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        http_port = config.http_port,
        grpc_port = config.grpc_port,
        health_port = config.health_port,
        forwarding_enabled = config.forwarding_enabled,
        "MCP event gateway starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("mcp-gateway")
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    runtime.block_on(run(config))?;

    info!("gateway shutdown complete");
    Ok(())
}

async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let metrics = Arc::new(GatewayMetrics::new());
    let streams = Arc::new(StreamRegistry::new(Arc::clone(&metrics)));
    let federation = Arc::new(FederationRouter::new());

    let engine = if config.forwarding_enabled {
        let engine = Arc::new(ForwardingEngine::new(
            Arc::clone(&metrics),
            config.targets.clone(),
        ));
        engine.start().await.context("forwarding engine failed to start")?;
        Some(engine)
    } else {
        warn!("forwarding is disabled; events will only be broadcast");
        None
    };

    let sink: Option<Arc<dyn mcp_gateway_core::EventSink>> = match &engine {
        Some(engine) => Some(Arc::clone(engine) as Arc<dyn mcp_gateway_core::EventSink>),
        None => None,
    };
    let ingest = Arc::new(IngestCore::new(
        Arc::clone(&metrics),
        Arc::clone(&streams),
        sink,
    ));

    let (shutdown_tx, _) = watch::channel(false);
    let wait_for_shutdown = |mut rx: watch::Receiver<bool>| async move {
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                break;
            }
        }
    };

    // gRPC transport.
    let grpc_service = GatewayGrpcService::new(
        Arc::clone(&ingest),
        Some(Arc::clone(&federation)),
        Arc::new(ServiceMetrics::with_default_registry().context("metrics registry")?),
    );
    let grpc_addr = format!("0.0.0.0:{}", config.grpc_port).parse()?;
    let mut grpc_task = tokio::spawn(mcp_gateway_grpc::serve(
        grpc_addr,
        grpc_service,
        wait_for_shutdown(shutdown_tx.subscribe()),
    ));

    // HTTP transport.
    let state = AppState {
        ingest: Arc::clone(&ingest),
        engine: engine.clone(),
        federation: Some(Arc::clone(&federation)),
    };
    let http_server = HttpServer::new(format!("0.0.0.0:{}", config.http_port), state.clone());
    let mut http_task = tokio::spawn(http_server.serve(wait_for_shutdown(shutdown_tx.subscribe())));

    // Standalone health/readiness listener for orchestrators.
    let mut health_task = tokio::spawn(serve_health(
        config.health_port,
        state,
        wait_for_shutdown(shutdown_tx.subscribe()),
    ));

    info!("gateway ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        result = &mut grpc_task => {
            fail_fast("gRPC server", result)?;
        }
        result = &mut http_task => {
            fail_fast("HTTP server", result)?;
        }
        result = &mut health_task => {
            fail_fast("health listener", result)?;
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(engine) = &engine {
        engine.stop().await;
    }

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = grpc_task.await;
        let _ = http_task.await;
        let _ = health_task.await;
    })
    .await;
    if drained.is_err() {
        warn!("listeners did not drain within the grace period");
    }

    Ok(())
}

/// A listener ending before shutdown was requested is a startup failure;
/// exit non-zero.
fn fail_fast(
    what: &str,
    result: Result<mcp_gateway_core::Result<()>, tokio::task::JoinError>,
) -> anyhow::Result<()> {
    match result {
        Ok(Ok(())) => anyhow::bail!("{what} exited unexpectedly"),
        Ok(Err(e)) => {
            error!(error = %e, "{what} failed");
            Err(e).context(format!("{what} failed"))
        }
        Err(e) => Err(e).context(format!("{what} panicked")),
    }
}

/// Minimal probe surface on its own port
async fn serve_health(
    port: u16,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> mcp_gateway_core::Result<()> {
    use axum::routing::get;

    let router = axum::Router::new()
        .route("/health", get(mcp_gateway_http::system::health))
        .route("/ready", get(mcp_gateway_http::system::ready))
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| mcp_gateway_core::Error::Unavailable(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, "health listener ready");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| mcp_gateway_core::Error::Unavailable(format!("health listener failed: {e}")))
}
