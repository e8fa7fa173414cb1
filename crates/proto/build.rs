// Build script for the gateway proto crate
// Handles protobuf code generation for the gRPC contract

fn main() {
    // Use vendored protoc from protobuf-src
    std::env::set_var("PROTOC", protobuf_src::protoc());

    compile_protos();

    // Rebuild when protobuf files change
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=protos/");
}

/// Compile protocol buffers for the gateway service
fn compile_protos() {
    std::fs::create_dir_all("src/generated").expect("Failed to create src/generated");

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/generated")
        // Descriptor set feeds the reflection service.
        .file_descriptor_set_path("src/generated/gateway_descriptor.bin")
        .compile_protos(&["protos/gateway.proto"], &["protos/"])
        .unwrap_or_else(|e| panic!("Failed to compile protos: {}", e));
}
