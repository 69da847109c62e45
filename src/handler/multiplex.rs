//! Request multiplexer
//!
//! Every request on the HTTPS port is classified on its own: grpc-web calls
//! go to the RPC adapter, grpc-web CORS preflights are answered here, and
//! the rest falls through to the static file handler.

use hyper::body::{Body, Bytes};
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::fmt::Display;
use tonic::body::BoxBody;
use tonic_web::{GrpcWebLayer, GrpcWebService};
use tower::{Layer, ServiceExt};

use super::static_files::StaticFiles;
use crate::config::HttpConfig;
use crate::http::response::build_grpc_web_preflight_response;
use crate::proto::blog_service_server::BlogServiceServer;
use crate::service::BlogApi;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The blog service wrapped for HTTP/1.1 grpc-web clients
pub type GrpcWebBlogService = GrpcWebService<BlogServiceServer<BlogApi>>;

/// Where a request is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    GrpcWeb,
    GrpcWebPreflight,
    Static,
}

impl Route {
    /// Decide the route from the request line and headers alone
    pub fn classify<B>(req: &Request<B>) -> Self {
        if is_grpc_web_request(req) {
            Self::GrpcWeb
        } else if is_grpc_web_preflight(req) {
            Self::GrpcWebPreflight
        } else {
            Self::Static
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::GrpcWeb | Self::GrpcWebPreflight => "grpc-web",
            Self::Static => "static",
        }
    }
}

/// POST with a grpc-web content type (binary `+proto` or `-text`)
pub fn is_grpc_web_request<B>(req: &Request<B>) -> bool {
    req.method() == Method::POST
        && req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/grpc-web"))
}

/// Browser preflight for a grpc-web call (requests the `x-grpc-web` header)
pub fn is_grpc_web_preflight<B>(req: &Request<B>) -> bool {
    if req.method() != Method::OPTIONS
        || !req
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    {
        return false;
    }
    req.headers()
        .get_all(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|h| h.trim().eq_ignore_ascii_case("x-grpc-web"))
}

fn header_str<'a, B>(req: &'a Request<B>, name: &header::HeaderName) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Routes HTTPS requests between the grpc-web adapter and static files
#[derive(Clone)]
pub struct Multiplexer {
    grpc_web: GrpcWebBlogService,
    static_files: StaticFiles,
    enable_cors: bool,
    server_name: HeaderValue,
}

impl Multiplexer {
    pub fn new(api: BlogApi, config: &HttpConfig) -> Self {
        Self {
            grpc_web: GrpcWebLayer::new().layer(api.into_server()),
            static_files: StaticFiles::new(&config.static_dir, config.index_files.clone()),
            enable_cors: config.enable_cors,
            server_name: HeaderValue::from_str(&config.server_name)
                .unwrap_or_else(|_| HeaderValue::from_static("blog-server")),
        }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<BoxBody>, Infallible>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError> + Display,
    {
        let mut response = match Route::classify(&req) {
            Route::GrpcWeb => self.forward_grpc_web(req).await,
            Route::GrpcWebPreflight if self.enable_cors => {
                build_grpc_web_preflight_response(
                    header_str(&req, &header::ORIGIN),
                    header_str(&req, &header::ACCESS_CONTROL_REQUEST_HEADERS),
                )
                .map(tonic::body::boxed)
            }
            Route::GrpcWebPreflight | Route::Static => {
                // Static responses never read the request body
                let (parts, _body) = req.into_parts();
                let req = Request::from_parts(parts, ());
                self.static_files.serve(&req).await.map(tonic::body::boxed)
            }
        };

        response
            .headers_mut()
            .insert(header::SERVER, self.server_name.clone());
        Ok(response)
    }

    async fn forward_grpc_web<B>(&self, req: Request<B>) -> Response<BoxBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError> + Display,
    {
        let origin = req.headers().get(header::ORIGIN).cloned();

        // The adapter only accepts tonic's boxed body
        let req = req.map(tonic::body::boxed);
        let mut response = match self.grpc_web.clone().oneshot(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        if self.enable_cors {
            let headers = response.headers_mut();
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                origin.unwrap_or_else(|| HeaderValue::from_static("*")),
            );
            headers.insert(
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static("grpc-status, grpc-message"),
            );
        }
        response
    }
}
