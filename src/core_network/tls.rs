// TLS context shared by the control and data channels.
use crate::core_network::error::NetworkError;
use std::sync::Arc;
use thiserror::Error;
use tokio_rustls::{rustls, TlsAcceptor};

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("TLS is not configured")]
    TlsNotConfigured,

    #[error("Failed to load certificate: {0}")]
    CertificateLoadError(String),

    #[error("Failed to load private key: {0}")]
    PrivateKeyLoadError(String),

    #[error("Invalid TLS configuration: {0}")]
    TlsConfigError(String),
}

/// Process-wide TLS state built once at startup.
///
/// One `rustls::ServerConfig` backs every handshake, control and data alike.
/// Its built-in server session cache is what lets a client resume the control
/// channel's TLS session on the data connection.
pub struct TlsContext {
    acceptor: TlsAcceptor,
}

impl TlsContext {
    pub fn new(cert_file: &str, key_file: &str) -> Result<Self, TlsError> {
        if !std::path::Path::new(cert_file).exists() || !std::path::Path::new(key_file).exists() {
            return Err(TlsError::TlsNotConfigured);
        }

        let certs = std::fs::read(cert_file)
            .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;
        let key = std::fs::read(key_file).map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;

        let cert_chain = rustls_pemfile::certs(&mut &certs[..])
            .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;

        let mut keys = rustls_pemfile::pkcs8_private_keys(&mut &key[..])
            .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;
        let private_key = match keys.pop() {
            Some(k) => k,
            None => {
                return Err(TlsError::PrivateKeyLoadError(
                    "No private key found".to_string(),
                ))
            }
        };

        let cert_chain: Vec<rustls::Certificate> =
            cert_chain.into_iter().map(rustls::Certificate).collect();
        let private_key = rustls::PrivateKey(private_key);

        let config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| TlsError::TlsConfigError(e.to_string()))?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        self.acceptor.clone()
    }
}

impl From<TlsError> for NetworkError {
    fn from(e: TlsError) -> Self {
        NetworkError::Protocol(e.to_string())
    }
}
