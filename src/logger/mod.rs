//! Logger module
//!
//! Provides logging utilities for the blog server including:
//! - Startup and shutdown step logging
//! - RPC invocation logging
//! - Access logging for the HTTPS front end
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use chrono::Local;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Severity levels, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    /// Parse a configured level name; unknown names map to `Info`
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    const fn tag(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    MIN_LEVEL.store(Level::parse(&config.logging.level) as u8, Ordering::Relaxed);
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn enabled(level: Level) -> bool {
    level as u8 >= MIN_LEVEL.load(Ordering::Relaxed)
}

fn emit(level: Level, message: &str) {
    if !enabled(level) {
        return;
    }
    let line = format!(
        "{} [{}] {message}",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        level.tag()
    );
    match (writer::get(), level) {
        (Some(w), Level::Warn | Level::Error) => w.write_error(&line),
        (Some(w), _) => w.write_info(&line),
        (None, Level::Warn | Level::Error) => eprintln!("{line}"),
        (None, _) => println!("{line}"),
    }
}

pub fn log_debug(message: &str) {
    emit(Level::Debug, message);
}

pub fn log_info(message: &str) {
    emit(Level::Info, message);
}

pub fn log_warning(message: &str) {
    emit(Level::Warn, message);
}

pub fn log_error(message: &str) {
    emit(Level::Error, message);
}

/// Access lines bypass the level filter; `logging.access_log` gates them instead
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    let line = entry.format(format);
    match writer::get() {
        Some(w) => w.write_info(&line),
        None => println!("{line}"),
    }
}

pub fn log_rpc_invoked(operation: &str) {
    log_info(&format!("[RPC] {operation} invoked"));
}

pub fn log_startup_step(step: u8, message: &str) {
    log_info(&format!("[Step {step}] {message}"));
}

pub fn log_shutdown_step(step: u8, message: &str) {
    log_info(&format!("[Shutdown {step}/4] {message}"));
}

pub fn log_server_start(rpc_addr: &SocketAddr, http_addr: &SocketAddr, config: &Config) {
    log_info("======================================");
    log_info("Blog service started successfully");
    log_info(&format!("gRPC (TLS) listening on: {rpc_addr}"));
    log_info(&format!("HTTPS + grpc-web listening on: https://{http_addr}"));
    log_info(&format!("Static content: {}", config.http.static_dir));
    log_info(&format!(
        "Database: {} / {}.{}",
        config.database.uri, config.database.name, config.database.collection
    ));
    if config.service.list_throttle_ms > 0 {
        log_info(&format!(
            "ListBlog throttle: {}ms per item",
            config.service.list_throttle_ms
        ));
    }
    if let Some(workers) = config.server.workers {
        log_info(&format!("Worker threads: {workers}"));
    }
    log_info("Press Ctrl+C to stop");
    log_info("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    log_debug(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Display) {
    log_warning(&format!("[Connection] Failed to serve connection: {err}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("debug"), Level::Debug);
        assert_eq!(Level::parse("WARN"), Level::Warn);
        assert_eq!(Level::parse("error"), Level::Error);
        assert_eq!(Level::parse("info"), Level::Info);
        assert_eq!(Level::parse("verbose"), Level::Info);
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error > Level::Warn);
        assert!(Level::Warn > Level::Info);
        assert!(Level::Info > Level::Debug);
    }
}
