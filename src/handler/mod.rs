//! Request handler module
//!
//! The multiplexer sends grpc-web traffic to the RPC adapter and everything
//! else to the static file handler serving the web client.

pub mod multiplex;
pub mod static_files;

pub use multiplex::{Multiplexer, Route};
