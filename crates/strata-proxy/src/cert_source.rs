//! Client certificate provisioning
//!
//! The tunnel authenticates to the remote edge with a short-lived client
//! certificate. Where that certificate comes from is pluggable: production
//! code fetches one from the control plane, tests hand in static material.

use async_trait::async_trait;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;

/// Certificate source errors
#[derive(Debug, Error)]
pub enum CertSourceError {
    #[error("Invalid instance identifier: {0}")]
    InvalidInstance(String),

    #[error("Not authorized to issue a certificate: {0}")]
    Unauthorized(String),

    #[error("Certificate request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid certificate material: {0}")]
    InvalidMaterial(String),
}

/// Client certificate and the remote endpoint it is valid for
pub struct ClientCert {
    /// Leaf certificate followed by any intermediates
    pub cert_chain: Vec<CertificateDer<'static>>,

    /// Private key matching the leaf certificate
    pub private_key: PrivateKeyDer<'static>,

    /// Remote edge address the certificate authenticates to (host:port)
    pub remote_addr: String,

    /// TLS server name to verify the remote against
    pub server_name: String,
}

impl std::fmt::Debug for ClientCert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCert")
            .field("cert_chain", &self.cert_chain.len())
            .field("remote_addr", &self.remote_addr)
            .field("server_name", &self.server_name)
            .finish()
    }
}

/// Source of client certificates for a database instance
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Obtain a certificate for the instance identified by `org/database/branch`
    async fn fetch(&self, instance: &str) -> Result<ClientCert, CertSourceError>;
}
