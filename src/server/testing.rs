// Shared fixtures for the server tests: a self-signed pair loaded through
// `TlsMaterial::load`, a matching client connector and a multiplexer over
// the in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{self, RootCertStore};
use tokio_rustls::TlsConnector;

use super::https::ConnectionSettings;
use super::tls::TlsMaterial;
use crate::config::{HttpConfig, TlsConfig};
use crate::handler::Multiplexer;
use crate::service::BlogApi;
use crate::store::memory::MemoryBlogStore;

pub struct SelfSigned {
    _dir: TempDir,
    pub material: TlsMaterial,
    cert: CertificateDer<'static>,
}

impl SelfSigned {
    pub fn generate() -> Self {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cert_file = dir.path().join("server.crt");
        let key_file = dir.path().join("server.key");
        std::fs::write(&cert_file, cert.pem()).unwrap();
        std::fs::write(&key_file, key_pair.serialize_pem()).unwrap();

        let material = TlsMaterial::load(&TlsConfig {
            cert_file: cert_file.to_string_lossy().into_owned(),
            key_file: key_file.to_string_lossy().into_owned(),
        })
        .unwrap();

        Self {
            _dir: dir,
            material,
            cert: cert.der().clone(),
        }
    }

    /// Client that trusts only this certificate and offers `alpn`
    pub fn connector(&self, alpn: &[&[u8]]) -> TlsConnector {
        let mut roots = RootCertStore::empty();
        roots.add(self.cert.clone()).unwrap();
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
        TlsConnector::from(Arc::new(config))
    }

    pub async fn connect(
        &self,
        addr: SocketAddr,
        alpn: &[&[u8]],
    ) -> std::io::Result<TlsStream<TcpStream>> {
        let tcp = TcpStream::connect(addr).await?;
        let name = ServerName::try_from("localhost").unwrap();
        self.connector(alpn).connect(name, tcp).await
    }
}

pub fn blog_api() -> BlogApi {
    BlogApi::new(Arc::new(MemoryBlogStore::new()), Duration::ZERO)
}

pub fn multiplexer(static_dir: &std::path::Path) -> Multiplexer {
    let config = HttpConfig {
        static_dir: static_dir.to_string_lossy().into_owned(),
        index_files: vec!["index.html".to_string()],
        read_timeout: 5,
        server_name: "blog-test".to_string(),
        enable_cors: true,
        max_connections: None,
    };
    Multiplexer::new(blog_api(), &config)
}

pub fn settings(max_connections: Option<usize>) -> ConnectionSettings {
    ConnectionSettings {
        read_timeout: Duration::from_secs(5),
        max_connections,
        access_log: false,
        access_log_format: "combined".to_string(),
    }
}

/// Read until `needle` shows up, the peer closes, or five seconds pass
pub async fn read_until<S: AsyncRead + Unpin>(stream: &mut S, needle: &str) -> String {
    let mut received = Vec::new();
    let mut chunk = [0u8; 4096];
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    received.extend_from_slice(&chunk[..n]);
                    if String::from_utf8_lossy(&received).contains(needle) {
                        break;
                    }
                }
            }
        }
    })
    .await;
    String::from_utf8_lossy(&received).into_owned()
}
