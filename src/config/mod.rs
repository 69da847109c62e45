// Configuration module entry point
// Loads the service configuration from file, environment and defaults

mod types;

use std::net::SocketAddr;
use std::time::Duration;

pub use types::{
    Config, DatabaseConfig, HttpConfig, ServiceConfig, ShutdownConfig, TlsConfig,
};

/// Default config file, looked up without extension
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Environment variables override the file, e.g. `BLOG_DATABASE__URI`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("BLOG").separator("__"))
            .set_default("server.rpc_host", "0.0.0.0")?
            .set_default("server.rpc_port", 50051)?
            .set_default("server.http_host", "127.0.0.1")?
            .set_default("server.http_port", 8080)?
            .set_default("database.uri", "mongodb://localhost:27017")?
            .set_default("database.name", "mydb")?
            .set_default("database.collection", "blog")?
            .set_default("database.connect_timeout_secs", 20)?
            .set_default("tls.cert_file", "ssl/server.crt")?
            .set_default("tls.key_file", "ssl/server.key")?
            .set_default("http.static_dir", "ui/build")?
            .set_default("http.index_files", vec!["index.html"])?
            .set_default("http.read_timeout", 15)?
            .set_default("http.server_name", "blog-server/0.1")?
            .set_default("http.enable_cors", true)?
            .set_default("service.list_throttle_ms", 0)?
            .set_default("service.reflection", true)?
            .set_default("shutdown.grace_period_secs", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_rpc_socket_addr(&self) -> Result<SocketAddr, String> {
        parse_addr(&self.server.rpc_host, self.server.rpc_port)
            .map_err(|e| format!("Invalid RPC address: {e}"))
    }

    pub fn get_http_socket_addr(&self) -> Result<SocketAddr, String> {
        parse_addr(&self.server.http_host, self.server.http_port)
            .map_err(|e| format!("Invalid HTTP address: {e}"))
    }
}

impl ServiceConfig {
    pub const fn list_throttle(&self) -> Duration {
        Duration::from_millis(self.list_throttle_ms)
    }
}

impl HttpConfig {
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }
}

impl DatabaseConfig {
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl ShutdownConfig {
    pub const fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr, std::net::AddrParseError> {
    // IPv6 literals need brackets in the host:port form
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}").parse()
    } else {
        format!("{host}:{port}").parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_defaults() -> Config {
        Config::load_from("this-config-file-does-not-exist").expect("defaults should load")
    }

    #[test]
    fn test_defaults() {
        let cfg = load_defaults();
        assert_eq!(cfg.server.rpc_port, 50051);
        assert_eq!(cfg.server.http_port, 8080);
        assert_eq!(cfg.database.uri, "mongodb://localhost:27017");
        assert_eq!(cfg.database.name, "mydb");
        assert_eq!(cfg.database.collection, "blog");
        assert_eq!(cfg.database.connect_timeout(), Duration::from_secs(20));
        assert_eq!(cfg.tls.cert_file, "ssl/server.crt");
        assert_eq!(cfg.http.static_dir, "ui/build");
        assert_eq!(cfg.http.index_files, vec!["index.html".to_string()]);
        assert_eq!(cfg.service.list_throttle(), Duration::ZERO);
        assert!(cfg.service.reflection);
        assert!(cfg.http.max_connections.is_none());
        assert_eq!(cfg.logging.access_log_format, "combined");
    }

    #[test]
    fn test_socket_addrs() {
        let cfg = load_defaults();
        assert_eq!(
            cfg.get_rpc_socket_addr().unwrap(),
            "0.0.0.0:50051".parse().unwrap()
        );
        assert_eq!(
            cfg.get_http_socket_addr().unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
    }

    #[test]
    fn test_invalid_host() {
        let mut cfg = load_defaults();
        cfg.server.http_host = "not a host".to_string();
        let err = cfg.get_http_socket_addr().unwrap_err();
        assert!(err.starts_with("Invalid HTTP address"));
    }

    #[test]
    fn test_ipv6_host() {
        let addr = parse_addr("::1", 9000).unwrap();
        assert!(addr.is_ipv6());
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog.toml");
        std::fs::write(
            &path,
            "[service]\nlist_throttle_ms = 250\nreflection = false\n\n[database]\nname = \"blogs\"\n",
        )
        .unwrap();

        let stem = dir.path().join("blog");
        let cfg = Config::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(cfg.service.list_throttle(), Duration::from_millis(250));
        assert!(!cfg.service.reflection);
        assert_eq!(cfg.database.name, "blogs");
        assert_eq!(cfg.database.collection, "blog");
    }
}
