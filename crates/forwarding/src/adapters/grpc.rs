//! gRPC delivery to downstream gateway peers
//!
//! Peers speak the same ingest contract this gateway serves, so delivery
//! is a remote `Ingest` and the probe is the remote `Health`. The tonic
//! channel is cheap to clone; each call clones the client rather than
//! locking it.

use mcp_gateway_core::target::{ForwardingTarget, TargetAuth};
use mcp_gateway_core::{Error, Event, Result};
use mcp_gateway_proto::generated::mcp_gateway_client::McpGatewayClient;
use mcp_gateway_proto::generated::{HealthRequest, IngestRequest, McpRequest, McpResponse};
use std::time::Duration;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};
use tracing::debug;

/// How long to wait for the initial channel handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// gRPC channel handle for one target or federated server
pub struct GrpcForwarder {
    client: McpGatewayClient<Channel>,
    authorization: Option<MetadataValue<tonic::metadata::Ascii>>,
}

impl GrpcForwarder {
    /// Open the channel. An unparseable endpoint is fatal; a peer that
    /// refuses the handshake leaves the target unregistered.
    pub async fn connect(target: &ForwardingTarget) -> Result<Self> {
        let endpoint = Endpoint::from_shared(target.endpoint.clone())
            .map_err(|e| Error::invalid_argument(format!("invalid gRPC endpoint: {e}")))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(target.config.timeout_secs));

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::Unavailable(format!("cannot reach {}: {e}", target.endpoint)))?;

        let authorization = match &target.config.auth {
            TargetAuth::Bearer { token } => Some(
                format!("Bearer {token}")
                    .parse()
                    .map_err(|_| Error::invalid_argument("bearer token is not valid ASCII"))?,
            ),
            TargetAuth::None => None,
            other => {
                return Err(Error::invalid_argument(format!(
                    "unsupported auth for gRPC targets: {other:?}"
                )));
            }
        };

        debug!(endpoint = %target.endpoint, "gRPC channel established");
        Ok(Self {
            client: McpGatewayClient::new(channel),
            authorization,
        })
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(auth) = &self.authorization {
            request.metadata_mut().insert("authorization", auth.clone());
        }
        request
    }

    /// Invoke the remote Ingest
    pub async fn deliver(&self, event: &Event) -> Result<()> {
        let request = self.request(IngestRequest {
            event: Some(event.into()),
        });

        match self.client.clone().ingest(request).await {
            Ok(_) => Ok(()),
            Err(status) => Err(classify_status(&status)),
        }
    }

    /// Invoke the remote health probe
    pub async fn health_check(&self) -> bool {
        match self.client.clone().health(self.request(HealthRequest {})).await {
            Ok(response) => {
                let status = response.into_inner().status;
                status == "healthy" || status == "serving"
            }
            Err(_) => false,
        }
    }

    /// Route an opaque MCP invocation to the peer
    pub async fn invoke(&self, request: McpRequest) -> Result<McpResponse> {
        self.client
            .clone()
            .invoke(self.request(request))
            .await
            .map(|response| response.into_inner())
            .map_err(|status| classify_status(&status))
    }
}

/// Classify a tonic status into transient or fatal
fn classify_status(status: &Status) -> Error {
    match status.code() {
        Code::Unavailable
        | Code::DeadlineExceeded
        | Code::ResourceExhausted
        | Code::Aborted
        | Code::Unknown => Error::transient(format!("peer returned {status}")),
        Code::Unauthenticated | Code::PermissionDenied => {
            Error::internal(format!("peer rejected credentials: {status}"))
        }
        _ => Error::internal(format!("peer rejected delivery: {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_level_codes_are_transient() {
        for code in [
            Code::Unavailable,
            Code::DeadlineExceeded,
            Code::ResourceExhausted,
            Code::Aborted,
        ] {
            assert!(classify_status(&Status::new(code, "x")).is_retryable());
        }
    }

    #[test]
    fn rejection_codes_are_fatal() {
        for code in [
            Code::Unauthenticated,
            Code::PermissionDenied,
            Code::InvalidArgument,
            Code::Unimplemented,
        ] {
            assert!(!classify_status(&Status::new(code, "x")).is_retryable());
        }
    }
}
