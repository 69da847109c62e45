// TLS material module
// Loads the PEM certificate chain and key once for both listeners

use std::io;
use std::sync::Arc;
use tokio_rustls::rustls::{self, pki_types::CertificateDer, pki_types::PrivateKeyDer};
use tokio_rustls::TlsAcceptor;
use tonic::transport::Identity;

use crate::config::TlsConfig;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("failed to parse PEM in {path}: {source}")]
    Pem { path: String, source: io::Error },

    #[error("no certificate found in {0}")]
    NoCertificate(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("invalid certificate/key pair: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Certificate and key for the native RPC port and the HTTPS port
pub struct TlsMaterial {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    server_config: Arc<rustls::ServerConfig>,
}

impl TlsMaterial {
    /// Read and validate the configured certificate and key
    pub fn load(config: &TlsConfig) -> Result<Self, TlsError> {
        let cert_pem = read(&config.cert_file)?;
        let key_pem = read(&config.key_file)?;
        Self::from_pem(cert_pem, key_pem, &config.cert_file, &config.key_file)
    }

    fn from_pem(
        cert_pem: Vec<u8>,
        key_pem: Vec<u8>,
        cert_path: &str,
        key_path: &str,
    ) -> Result<Self, TlsError> {
        let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
            .collect::<Result<Vec<CertificateDer<'static>>, _>>()
            .map_err(|source| TlsError::Pem {
                path: cert_path.to_string(),
                source,
            })?;
        if certs.is_empty() {
            return Err(TlsError::NoCertificate(cert_path.to_string()));
        }

        let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_pem.as_slice())
            .map_err(|source| TlsError::Pem {
                path: key_path.to_string(),
                source,
            })?
            .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_string()))?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut server_config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        // The HTTPS port only speaks HTTP/1.1
        server_config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Self {
            cert_pem,
            key_pem,
            server_config: Arc::new(server_config),
        })
    }

    /// Identity for the tonic server on the RPC port
    pub fn identity(&self) -> Identity {
        Identity::from_pem(&self.cert_pem, &self.key_pem)
    }

    /// Acceptor for the HTTPS port
    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(Arc::clone(&self.server_config))
    }
}

fn read(path: &str) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(cert: &std::path::Path, key: &std::path::Path) -> TlsConfig {
        TlsConfig {
            cert_file: cert.to_string_lossy().into_owned(),
            key_file: key.to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = TlsMaterial::load(&config(&dir.path().join("server.crt"), &dir.path().join("server.key")))
            .err()
            .unwrap();
        assert!(matches!(err, TlsError::Read { .. }));
        assert!(err.to_string().contains("server.crt"));
    }

    #[test]
    fn test_file_without_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("server.crt");
        let key = dir.path().join("server.key");
        std::fs::write(&cert, "not a pem file").unwrap();
        std::fs::write(&key, "not a pem file").unwrap();

        let err = TlsMaterial::load(&config(&cert, &key)).err().unwrap();
        assert!(matches!(err, TlsError::NoCertificate(_)));
    }
}
