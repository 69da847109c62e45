// HTTPS server module
// Accepts TLS connections and serves each one with hyper through the multiplexer

use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Version};
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tokio_rustls::TlsAcceptor;

use crate::config::Config;
use crate::handler::{Multiplexer, Route};
use crate::logger::{self, AccessLogEntry};

/// Per-connection settings taken from configuration
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub read_timeout: Duration,
    pub max_connections: Option<usize>,
    pub access_log: bool,
    pub access_log_format: String,
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            read_timeout: config.http.read_timeout(),
            max_connections: config
                .http
                .max_connections
                .map(|max| usize::try_from(max).unwrap_or(usize::MAX)),
            access_log: config.logging.access_log,
            access_log_format: config.logging.access_log_format.clone(),
        }
    }
}

/// Background task serving the web client and grpc-web traffic
pub struct HttpsServer {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl HttpsServer {
    pub fn spawn(
        listener: TcpListener,
        acceptor: TlsAcceptor,
        mux: Multiplexer,
        settings: ConnectionSettings,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(accept_loop(
            listener,
            acceptor,
            Arc::new(mux),
            Arc::new(settings),
            Arc::clone(&shutdown),
        ));
        Self { handle, shutdown }
    }

    /// Stop accepting, close open connections and wait for the loop to exit
    pub async fn close(mut self, grace: Duration) -> Result<(), String> {
        self.shutdown.notify_one();
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("HTTPS server task failed: {e}")),
            Err(_) => {
                self.handle.abort();
                Err(format!(
                    "HTTPS server did not stop within {}s, aborted",
                    grace.as_secs()
                ))
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    mux: Arc<Multiplexer>,
    settings: Arc<ConnectionSettings>,
    shutdown: Arc<Notify>,
) {
    logger::log_info("[HTTPS] Starting HTTPS server...");
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            () = shutdown.notified() => break,

            Some(_) = connections.join_next(), if !connections.is_empty() => {}

            accept_result = listener.accept() => {
                let (stream, peer_addr) = match accept_result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        logger::log_error(&format!("[HTTPS] Failed to accept connection: {e}"));
                        continue;
                    }
                };

                if let Some(max) = settings.max_connections {
                    if connections.len() >= max {
                        logger::log_warning(&format!(
                            "[HTTPS] Max connections reached: {max}. Connection from {peer_addr} rejected."
                        ));
                        continue;
                    }
                }

                logger::log_connection_accepted(&peer_addr);
                connections.spawn(serve_connection(
                    stream,
                    peer_addr,
                    acceptor.clone(),
                    Arc::clone(&mux),
                    Arc::clone(&settings),
                ));
            }
        }
    }

    drop(listener);
    let open = connections.len();
    connections.abort_all();
    while connections.join_next().await.is_some() {}
    logger::log_info(&format!("[HTTPS] Listener closed, {open} open connections dropped"));
}

async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    acceptor: TlsAcceptor,
    mux: Arc<Multiplexer>,
    settings: Arc<ConnectionSettings>,
) {
    let tls_stream = match tokio::time::timeout(settings.read_timeout, acceptor.accept(stream)).await
    {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            logger::log_debug(&format!("[HTTPS] TLS handshake with {peer_addr} failed: {e}"));
            return;
        }
        Err(_) => {
            logger::log_debug(&format!("[HTTPS] TLS handshake with {peer_addr} timed out"));
            return;
        }
    };

    let read_timeout = settings.read_timeout;
    let service = service_fn(move |req: Request<Incoming>| {
        let mux = Arc::clone(&mux);
        let settings = Arc::clone(&settings);
        async move {
            let started = Instant::now();
            let entry = settings
                .access_log
                .then(|| access_entry(&req, peer_addr));

            let response = mux.handle(req).await;

            if let (Some(mut entry), Ok(resp)) = (entry, response.as_ref()) {
                entry.status = resp.status().as_u16();
                entry.body_bytes = resp.body().size_hint().exact();
                entry.request_time_us =
                    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
                logger::log_access(&entry, &settings.access_log_format);
            }
            response
        }
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout)
        .keep_alive(true);

    if let Err(err) = builder
        .serve_connection(TokioIo::new(tls_stream), service)
        .await
    {
        logger::log_connection_error(&err);
    }
}

fn access_entry(req: &Request<Incoming>, peer_addr: SocketAddr) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = http_version(req.version()).to_string();
    entry.route = Route::classify(req).label();
    entry.user_agent = req
        .headers()
        .get(hyper::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    entry
}

const fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
