//! Blog RPC service
//!
//! Translates the five `BlogService` operations into record store calls.

mod blog;

pub use blog::BlogApi;
