//! HTTP protocol layer module
//!
//! Response builders, MIME detection and `ETag` handling shared by the
//! static file handler and the request multiplexer.

pub mod cache;
pub mod mime;
pub mod response;

pub use response::{
    build_304_response, build_404_response, build_405_response, build_options_response,
};
