//! Tunnel error types

use thiserror::Error;

use crate::cert_source::CertSourceError;

/// Tunnel client errors
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Invalid tunnel options: {0}")]
    Config(String),

    #[error("Certificate source failed: {0}")]
    Cert(#[from] CertSourceError),

    #[error("Failed to bind local listener: {0}")]
    Bind(String),

    #[error("Tunnel closed: {0}")]
    Closed(String),

    #[error("Connection to remote failed: {0}")]
    ConnectionFailed(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
