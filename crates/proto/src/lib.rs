//! Protobuf contract and tonic stubs for the MCP event gateway.
//!
//! Stubs are generated into `src/generated` by `build.rs` (vendored
//! protoc). [`convert`] carries the lossless mappings between the wire
//! types and the domain types in `mcp-gateway-core`.

/// Generated protobuf and tonic code
pub mod generated {
    #![allow(missing_docs)]
    include!("generated/mcp_gateway.v1.rs");

    /// Serialized file descriptor set for gRPC server reflection
    pub const FILE_DESCRIPTOR_SET: &[u8] = include_bytes!("generated/gateway_descriptor.bin");
}

pub mod convert;
