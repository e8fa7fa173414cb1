//! gRPC server bootstrap

use crate::service::GatewayGrpcService;
use mcp_gateway_core::{Error, Result};
use mcp_gateway_proto::generated::mcp_gateway_server::McpGatewayServer;
use mcp_gateway_proto::generated::FILE_DESCRIPTOR_SET;
use std::future::Future;
use std::net::SocketAddr;
use tonic::transport::Server;
use tracing::info;

/// Inbound and outbound message cap
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Serve the gateway contract until `shutdown` resolves.
///
/// Reflection is registered alongside the service so generic tooling can
/// discover the contract.
pub async fn serve(
    addr: SocketAddr,
    service: GatewayGrpcService,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .map_err(|e| Error::internal(format!("reflection setup failed: {e}")))?;

    info!(%addr, "gRPC server listening");

    Server::builder()
        .add_service(reflection)
        .add_service(
            McpGatewayServer::new(service)
                .max_decoding_message_size(MAX_MESSAGE_BYTES)
                .max_encoding_message_size(MAX_MESSAGE_BYTES),
        )
        .serve_with_shutdown(addr, shutdown)
        .await
        .map_err(|e| Error::Unavailable(format!("gRPC server failed: {e}")))
}
