//! HTTP/REST transport for the MCP event gateway.
//!
//! Serves the ingestion surface (unary, batch, legacy), the forwarding
//! management API, the federation catalog, and the health/metrics
//! probes. All responses are JSON with permissive CORS and one access
//! log line per request.

pub mod error;
pub mod ingest;
pub mod management;
pub mod server;
pub mod system;

pub use server::{AppState, HttpServer};
