//! Secure tunnel client for Strata database instances
//!
//! Binds a local TCP listener and forwards each connection over an
//! authenticated TLS stream to the remote database edge, so local clients
//! can speak to a branch as if it were running on localhost.

pub mod cert_source;
pub mod connector;
pub mod error;
pub mod tunnel;

pub use cert_source::{CertSourceError, CertificateSource, ClientCert};
pub use connector::{BoxedStream, SecureConnector, TlsConnector, TunnelStream};
pub use error::TunnelError;
pub use tunnel::{Tunnel, TunnelOptions};
