//! gRPC transport for the MCP event gateway.
//!
//! Serves the `McpGateway` contract: unary ingest, bidirectional event
//! streaming, health, metrics, and federation invocation. The server
//! enables reflection and caps messages at 4 MiB in both directions.

pub mod metrics;
pub mod server;
pub mod service;

pub use metrics::ServiceMetrics;
pub use server::serve;
pub use service::GatewayGrpcService;
