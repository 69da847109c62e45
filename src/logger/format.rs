//! Access log format module
//!
//! Supports `combined`, `common` and `json` formats for HTTPS front-end requests.

use chrono::Local;
use serde::Serialize;

/// Access log entry for one request served by the HTTPS front end
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    #[serde(serialize_with = "serialize_time")]
    pub time: chrono::DateTime<Local>,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub http_version: String,
    pub status: u16,
    /// Declared response size; streamed grpc-web bodies have none
    pub body_bytes: Option<u64>,
    /// Which side of the multiplexer answered (`grpc-web` or `static`)
    pub route: &'static str,
    pub user_agent: Option<String>,
    pub request_time_us: u64,
}

fn serialize_time<S: serde::Serializer>(
    time: &chrono::DateTime<Local>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339())
}

impl AccessLogEntry {
    /// Create a new access log entry with current timestamp
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: None,
            route: "static",
            user_agent: None,
            request_time_us: 0,
        }
    }

    /// Format the log entry; unknown formats fall back to `combined`
    pub fn format(&self, format: &str) -> String {
        match format {
            "common" => self.format_common(),
            "json" => self.format_json(),
            _ => self.format_combined(),
        }
    }

    fn request_line(&self) -> String {
        format!(
            "{} {}{} HTTP/{}",
            self.method,
            self.path,
            self.query
                .as_ref()
                .map(|q| format!("?{q}"))
                .unwrap_or_default(),
            self.http_version
        )
    }

    fn bytes_field(&self) -> String {
        self.body_bytes
            .map_or_else(|| "-".to_string(), |b| b.to_string())
    }

    /// `$remote_addr - - [$time_local] "$request" $status $bytes "$user_agent" $route ${time}us`
    fn format_combined(&self) -> String {
        format!(
            "{} \"{}\" {} {}us",
            self.format_common(),
            self.user_agent.as_deref().unwrap_or("-"),
            self.route,
            self.request_time_us,
        )
    }

    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.request_line(),
            self.status,
            self.bytes_field(),
        )
    }

    fn format_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entry() -> AccessLogEntry {
        let mut entry = AccessLogEntry::new(
            "192.168.1.1".to_string(),
            "POST".to_string(),
            "/blog.BlogService/ReadBlog".to_string(),
        );
        entry.status = 200;
        entry.route = "grpc-web";
        entry.user_agent = Some("Mozilla/5.0".to_string());
        entry.request_time_us = 1500;
        entry
    }

    #[test]
    fn test_format_combined() {
        let log = create_test_entry().format("combined");
        assert!(log.starts_with("192.168.1.1 - - ["));
        assert!(log.contains("\"POST /blog.BlogService/ReadBlog HTTP/1.1\" 200 -"));
        assert!(log.contains("\"Mozilla/5.0\" grpc-web 1500us"));
    }

    #[test]
    fn test_format_common() {
        let mut entry = create_test_entry();
        entry.method = "GET".to_string();
        entry.path = "/index.html".to_string();
        entry.query = Some("v=2".to_string());
        entry.body_bytes = Some(512);
        entry.route = "static";

        let log = entry.format("common");
        assert!(log.contains("\"GET /index.html?v=2 HTTP/1.1\" 200 512"));
        assert!(!log.contains("Mozilla"));
    }

    #[test]
    fn test_format_json() {
        let log = create_test_entry().format("json");
        let value: serde_json::Value = serde_json::from_str(&log).unwrap();
        assert_eq!(value["remote_addr"], "192.168.1.1");
        assert_eq!(value["method"], "POST");
        assert_eq!(value["status"], 200);
        assert_eq!(value["route"], "grpc-web");
        assert!(value["body_bytes"].is_null());
    }

    #[test]
    fn test_unknown_format_falls_back() {
        let entry = create_test_entry();
        assert_eq!(entry.format("something-else"), entry.format("combined"));
    }
}
