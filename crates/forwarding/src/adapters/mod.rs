//! Transport adapters for downstream delivery
//!
//! One closed variant per transport family rather than trait objects: the
//! set of client handles is known and the engine owns them exclusively.
//! Every adapter classifies failures into transient (retryable) and fatal
//! so the dispatch loop stays transport-agnostic.

mod grpc;
mod http;
mod nats;

pub use grpc::GrpcForwarder;
pub use http::{HttpForwarder, WebhookMode};
pub use nats::NatsForwarder;

use mcp_gateway_core::target::{ForwardingTarget, TargetType};
use mcp_gateway_core::{Event, Result};
use mcp_gateway_proto::generated::{McpRequest, McpResponse};

/// Owned transport resource of one forwarding target or federated server
pub enum TransportHandle {
    /// Channel to a downstream gateway peer
    Grpc(GrpcForwarder),
    /// HTTP JSON receiver, webhook, or argo-events source
    Http(HttpForwarder),
    /// NATS producer
    MessageBus(NatsForwarder),
}

impl TransportHandle {
    /// Open the transport for a target. Failure leaves no resource
    /// behind and the caller must not register the target.
    pub async fn connect(target: &ForwardingTarget) -> Result<Self> {
        match target.target_type {
            TargetType::Grpc => Ok(Self::Grpc(GrpcForwarder::connect(target).await?)),
            TargetType::Http => Ok(Self::Http(HttpForwarder::new(target, WebhookMode::Standard)?)),
            TargetType::Webhook => {
                Ok(Self::Http(HttpForwarder::new(target, WebhookMode::Standard)?))
            }
            TargetType::ArgoEvents => {
                Ok(Self::Http(HttpForwarder::new(target, WebhookMode::Argo)?))
            }
            TargetType::MessageBus => Ok(Self::MessageBus(NatsForwarder::connect(target).await?)),
        }
    }

    /// Deliver one event. Errors are classified: `Error::Transient`
    /// re-enters the retry loop, anything else is final.
    pub async fn deliver(&self, event: &Event) -> Result<()> {
        match self {
            Self::Grpc(t) => t.deliver(event).await,
            Self::Http(t) => t.deliver(event).await,
            Self::MessageBus(t) => t.deliver(event).await,
        }
    }

    /// Probe the downstream for liveness
    pub async fn health_check(&self) -> bool {
        match self {
            Self::Grpc(t) => t.health_check().await,
            Self::Http(t) => t.health_check().await,
            Self::MessageBus(t) => t.health_check().await,
        }
    }

    /// Route an opaque MCP invocation (federation path)
    pub async fn invoke(&self, request: McpRequest) -> Result<McpResponse> {
        match self {
            Self::Grpc(t) => t.invoke(request).await,
            Self::Http(t) => t.invoke(request).await,
            Self::MessageBus(_) => Err(mcp_gateway_core::Error::invalid_argument(
                "message-bus targets cannot serve invocations",
            )),
        }
    }

    /// Flush and release the underlying resource. Dropping the handle
    /// releases it as well; `close` exists so shutdown can flush
    /// deterministically.
    pub async fn close(&self) {
        match self {
            Self::Grpc(_) | Self::Http(_) => {}
            Self::MessageBus(t) => t.close().await,
        }
    }
}
