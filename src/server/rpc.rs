// Native RPC server module
// Runs the tonic server over TLS on the pre-bound RPC listener

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};

use super::StartupError;
use crate::logger;
use crate::proto::FILE_DESCRIPTOR_SET;
use crate::service::BlogApi;

/// Background task serving native gRPC clients
pub struct RpcServer {
    handle: JoinHandle<Result<(), tonic::transport::Error>>,
    shutdown: Arc<Notify>,
}

impl RpcServer {
    /// Configure TLS and services, then start serving in the background
    pub fn spawn(
        listener: TcpListener,
        identity: Identity,
        api: BlogApi,
        reflection: bool,
    ) -> Result<Self, StartupError> {
        let reflection_service = if reflection {
            Some(
                tonic_reflection::server::Builder::configure()
                    .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
                    .build_v1()?,
            )
        } else {
            None
        };

        let mut server = Server::builder().tls_config(ServerTlsConfig::new().identity(identity))?;
        let router = server
            .add_service(api.into_server())
            .add_optional_service(reflection_service);

        let shutdown = Arc::new(Notify::new());
        let stop = Arc::clone(&shutdown);
        let incoming = TcpListenerStream::new(listener);

        let handle = tokio::spawn(async move {
            logger::log_info("[RPC] Starting gRPC server...");
            router
                .serve_with_incoming_shutdown(incoming, async move { stop.notified().await })
                .await
        });

        Ok(Self { handle, shutdown })
    }

    /// Stop accepting new RPC connections
    pub fn stop_accepting(&self) {
        self.shutdown.notify_one();
    }

    /// Wait for the server task to finish, which drops its listener
    ///
    /// In-flight calls get `grace` to complete before the task is aborted.
    pub async fn close(mut self, grace: Duration) -> Result<(), String> {
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(format!("gRPC server error: {e}")),
            Ok(Err(e)) => Err(format!("gRPC server task failed: {e}")),
            Err(_) => {
                self.handle.abort();
                let _ = self.handle.await;
                Err(format!(
                    "gRPC server did not drain within {}s, aborted",
                    grace.as_secs()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::listener::create_listener;
    use crate::server::testing::{self, SelfSigned};
    use std::net::SocketAddr;
    use tokio::net::TcpStream;

    fn start(tls: &SelfSigned, reflection: bool) -> (RpcServer, SocketAddr) {
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = RpcServer::spawn(
            listener,
            tls.material.identity(),
            testing::blog_api(),
            reflection,
        )
        .unwrap();
        (server, addr)
    }

    #[tokio::test]
    async fn test_serves_h2_over_tls() {
        let tls = SelfSigned::generate();
        let (server, addr) = start(&tls, true);

        let conn = tls.connect(addr, &[b"h2"]).await.unwrap();
        assert_eq!(conn.get_ref().1.alpn_protocol(), Some(&b"h2"[..]));
        drop(conn);

        server.stop_accepting();
        server.close(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_accepting_ends_task_and_frees_port() {
        let tls = SelfSigned::generate();
        let (server, addr) = start(&tls, false);

        server.stop_accepting();
        server.close(Duration::from_secs(5)).await.unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
        // The port can be bound again once the listener is gone
        assert!(create_listener(addr).is_ok());
    }

    #[tokio::test]
    async fn test_close_without_stop_aborts_after_grace() {
        let tls = SelfSigned::generate();
        let (server, addr) = start(&tls, false);

        let err = server.close(Duration::from_millis(100)).await.unwrap_err();
        assert!(err.contains("aborted"), "{err}");
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
