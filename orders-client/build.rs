#![allow(clippy::panic)]

fn main() {
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&["proto/denormalized_order.proto"], &["proto"])
        .unwrap_or_else(|e| panic!("failed to compile denormalized_order.proto: {e}"));

    println!("cargo:rerun-if-changed=proto/denormalized_order.proto");
}
