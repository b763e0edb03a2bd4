//! Secure connectors
//!
//! A [`SecureConnector`] opens authenticated byte streams to the remote
//! database edge. The production implementation speaks TLS with a client
//! certificate obtained from a [`CertificateSource`]; tests substitute
//! in-memory connectors.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::cert_source::{CertificateSource, ClientCert};
use crate::error::TunnelError;

/// Byte stream to the remote edge
pub trait TunnelStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> TunnelStream for T {}

/// Boxed stream returned by connectors
pub type BoxedStream = Box<dyn TunnelStream>;

/// Opens secure streams to the remote instance
#[async_trait]
pub trait SecureConnector: Send + Sync {
    /// One-time session setup before the tunnel starts accepting.
    ///
    /// Failures here are fatal to the tunnel run.
    async fn prepare(&self) -> Result<(), TunnelError>;

    /// Open one stream to the remote instance
    async fn open(&self) -> Result<BoxedStream, TunnelError>;
}

/// Established TLS session parameters, built once per tunnel run
struct TlsSession {
    connector: tokio_rustls::TlsConnector,
    remote_addr: String,
    server_name: rustls::pki_types::ServerName<'static>,
}

/// TLS connector authenticating with a client certificate
pub struct TlsConnector {
    cert_source: Arc<dyn CertificateSource>,
    instance: String,
    remote_override: Option<String>,
    session: OnceCell<TlsSession>,
}

impl TlsConnector {
    /// Create a connector for the given instance.
    ///
    /// The remote address normally comes back with the certificate; an
    /// explicit `remote_override` takes precedence when set.
    pub fn new(
        cert_source: Arc<dyn CertificateSource>,
        instance: String,
        remote_override: Option<String>,
    ) -> Self {
        Self {
            cert_source,
            instance,
            remote_override,
            session: OnceCell::new(),
        }
    }

    async fn session(&self) -> Result<&TlsSession, TunnelError> {
        self.session
            .get_or_try_init(|| async {
                let cert = self.cert_source.fetch(&self.instance).await?;
                self.build_session(cert)
            })
            .await
    }

    fn build_session(&self, cert: ClientCert) -> Result<TlsSession, TunnelError> {
        ensure_crypto_provider();

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(cert.cert_chain, cert.private_key)
            .map_err(|e| TunnelError::Tls(format!("Invalid client certificate: {}", e)))?;

        let remote_addr = self
            .remote_override
            .clone()
            .unwrap_or_else(|| cert.remote_addr.clone());

        let server_name = rustls::pki_types::ServerName::try_from(cert.server_name.clone())
            .map_err(|e| {
                TunnelError::Tls(format!("Invalid server name '{}': {}", cert.server_name, e))
            })?;

        debug!("TLS session established for {}", remote_addr);

        Ok(TlsSession {
            connector: tokio_rustls::TlsConnector::from(std::sync::Arc::new(config)),
            remote_addr,
            server_name,
        })
    }
}

#[async_trait]
impl SecureConnector for TlsConnector {
    async fn prepare(&self) -> Result<(), TunnelError> {
        self.session().await.map(|_| ())
    }

    async fn open(&self) -> Result<BoxedStream, TunnelError> {
        let session = self.session().await?;

        let stream = TcpStream::connect(&session.remote_addr)
            .await
            .map_err(|e| {
                TunnelError::ConnectionFailed(format!(
                    "Failed to connect to {}: {}",
                    session.remote_addr, e
                ))
            })?;

        let tls_stream = session
            .connector
            .connect(session.server_name.clone(), stream)
            .await
            .map_err(|e| TunnelError::Tls(format!("TLS handshake failed: {}", e)))?;

        Ok(Box::new(tls_stream))
    }
}

static CRYPTO_PROVIDER_INIT: std::sync::Once = std::sync::Once::new();

fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("Rustls crypto provider already installed");
        }
    });
}
