//! Static file serving module
//!
//! Serves the built web client from a single directory.

use crate::http::{self, cache, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response};
use std::path::PathBuf;
use tokio::fs;

/// Request details the static handler needs
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        Self {
            path: req.uri().path(),
            is_head: req.method() == Method::HEAD,
            if_none_match: req
                .headers()
                .get(hyper::header::IF_NONE_MATCH)
                .and_then(|v| v.to_str().ok()),
        }
    }
}

/// Fallback handler behind the multiplexer
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index_files: Vec<String>,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>, index_files: Vec<String>) -> Self {
        Self {
            root: root.into(),
            index_files,
        }
    }

    /// Answer any non-RPC request
    pub async fn serve<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        match *req.method() {
            Method::GET | Method::HEAD => {}
            Method::OPTIONS => return http::build_options_response(),
            ref other => {
                logger::log_debug(&format!("Method not allowed: {other}"));
                return http::build_405_response();
            }
        }

        let ctx = RequestContext::from_request(req);
        match self.load(ctx.path).await {
            Some((content, content_type)) => {
                build_static_file_response(content, content_type, ctx.if_none_match, ctx.is_head)
            }
            None => http::build_404_response(),
        }
    }

    /// Resolve a request path inside the root, with index file support
    pub async fn load(&self, path: &str) -> Option<(Vec<u8>, &'static str)> {
        // Remove leading slash and prevent directory traversal
        let cleaned = path.replace("..", "");
        let relative_path = cleaned.trim_start_matches('/');
        let mut file_path = self.root.join(relative_path);

        let root_canonical = match self.root.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                logger::log_warning(&format!(
                    "Static directory not found or inaccessible '{}': {e}",
                    self.root.display()
                ));
                return None;
            }
        };

        if relative_path.is_empty() || relative_path.ends_with('/') || file_path.is_dir() {
            file_path = self
                .index_files
                .iter()
                .map(|index| file_path.join(index))
                .find(|candidate| candidate.is_file())?;
        }

        // File not found is common (404), no need to log at warning level
        let file_canonical = file_path.canonicalize().ok()?;
        if !file_canonical.starts_with(&root_canonical) {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {} -> {}",
                path,
                file_canonical.display()
            ));
            return None;
        }

        let content = match fs::read(&file_canonical).await {
            Ok(c) => c,
            Err(e) => {
                logger::log_error(&format!(
                    "Failed to read file '{}': {e}",
                    file_canonical.display()
                ));
                return None;
            }
        };

        let content_type = mime::content_type_for(&file_path);
        Some((content, content_type))
    }
}

fn build_static_file_response(
    data: Vec<u8>,
    content_type: &str,
    if_none_match: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&data);

    if cache::check_etag_match(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    http::response::build_file_response(Bytes::from(data), content_type, &etag, is_head)
}
