//! Policy-driven forwarding engine for the MCP event gateway.
//!
//! Decides which targets receive each accepted event, delivers with
//! retry under a per-target timeout, tracks health and response-time
//! statistics, and keeps the gateway live when any downstream is slow or
//! broken. The federation router reuses the same transport adapters to
//! route opaque MCP invocations to cataloged remote servers.

pub mod adapters;
pub mod engine;
pub mod federation;
pub mod limiter;
pub mod retry;
mod worker;

pub use engine::{ForwardingEngine, ForwardingMetrics, TargetSnapshot};
pub use federation::{FederatedServer, FederationRouter};
pub use retry::RetryPolicy;
