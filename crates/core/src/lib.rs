//! Core domain types and ingestion fabric for the MCP event gateway.
//!
//! This crate carries everything the transports and the forwarding engine
//! share: the event contract and its validator, dotted-path field
//! extraction, the rule evaluator, the forwarding-target data model, the
//! stream registry used for broadcast fan-out, the gateway counters, and
//! the ingestion core that ties them together.
//!
//! Deliberately transport-free: no tonic, axum, or client crates here. The
//! forwarding engine plugs in through the [`ingest::EventSink`] seam.

pub mod config;
pub mod error;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod rules;
pub mod streams;
pub mod target;

pub use error::{Error, Result};
pub use event::Event;
pub use ingest::{EventSink, IngestCore};
pub use metrics::GatewayMetrics;
pub use streams::StreamRegistry;
pub use target::{ForwardingTarget, TargetStatus, TargetType};
