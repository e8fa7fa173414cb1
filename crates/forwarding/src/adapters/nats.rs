//! NATS message-bus delivery
//!
//! The endpoint carries both the server and the subject:
//! `nats://host:4222/subject`. Events are published as JSON; a flush
//! after every publish surfaces broker failures instead of letting them
//! die in the client's write buffer.

use mcp_gateway_core::target::ForwardingTarget;
use mcp_gateway_core::{Error, Event, Result};
use tracing::debug;

/// Subject used when the endpoint path is empty
const DEFAULT_SUBJECT: &str = "mcp.events";

/// NATS producer handle for one target
pub struct NatsForwarder {
    client: async_nats::Client,
    subject: String,
}

impl NatsForwarder {
    /// Parse the endpoint and open the producer connection
    pub async fn connect(target: &ForwardingTarget) -> Result<Self> {
        let parsed = url::Url::parse(&target.endpoint)
            .map_err(|e| Error::invalid_argument(format!("invalid bus endpoint: {e}")))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| Error::invalid_argument("bus endpoint has no host"))?;
        let port = parsed.port().unwrap_or(4222);
        let server = format!("{host}:{port}");

        let subject = {
            let path = parsed.path().trim_matches('/');
            if path.is_empty() {
                DEFAULT_SUBJECT.to_string()
            } else {
                path.replace('/', ".")
            }
        };

        let client = async_nats::connect(&server)
            .await
            .map_err(|e| Error::Unavailable(format!("cannot reach broker {server}: {e}")))?;

        debug!(server = %server, subject = %subject, "bus producer connected");
        Ok(Self { client, subject })
    }

    /// Publish the event as JSON on the configured subject
    pub async fn deliver(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| Error::transient(format!("publish failed: {e}")))?;
        self.client
            .flush()
            .await
            .map_err(|e| Error::transient(format!("broker unavailable: {e}")))?;
        Ok(())
    }

    /// Producer connection state doubles as the health probe
    pub async fn health_check(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }

    /// Flush buffered publishes before the handle is dropped
    pub async fn close(&self) {
        let _ = self.client.flush().await;
    }
}
