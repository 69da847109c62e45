//! Generated protobuf messages and the `BlogService` server stubs

#![allow(clippy::all, clippy::pedantic, clippy::nursery)]

tonic::include_proto!("blog");

/// Encoded descriptor set for gRPC server reflection
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("blog_descriptor");
