// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub tls: TlsConfig,
    pub http: HttpConfig,
    pub service: ServiceConfig,
    pub shutdown: ShutdownConfig,
    pub logging: LoggingConfig,
}

/// Listen addresses for the native RPC port and the HTTPS port
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub rpc_host: String,
    pub rpc_port: u16,
    pub http_host: String,
    pub http_port: u16,
    pub workers: Option<usize>,
}

/// Document store connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
    pub collection: String,
    /// Upper bound for establishing the initial connection
    pub connect_timeout_secs: u64,
}

/// Certificate and key shared by both ports (PEM files)
#[derive(Debug, Deserialize, Clone)]
pub struct TlsConfig {
    pub cert_file: String,
    pub key_file: String,
}

/// HTTPS front-end configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub static_dir: String,
    pub index_files: Vec<String>,
    /// Seconds allowed for the TLS handshake and for reading request headers
    pub read_timeout: u64,
    pub server_name: String,
    pub enable_cors: bool,
    #[serde(default)]
    pub max_connections: Option<u64>,
}

/// Blog service behaviour
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Pause between streamed `ListBlog` items, 0 disables pacing
    pub list_throttle_ms: u64,
    /// Register the gRPC reflection service on the RPC port
    pub reflection: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShutdownConfig {
    pub grace_period_secs: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common or json)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}
