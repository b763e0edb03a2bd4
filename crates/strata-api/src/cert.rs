//! Remote certificate source
//!
//! Provisions the client certificate a tunnel authenticates with: generates
//! a fresh keypair locally, submits a CSR to the control plane, and hands
//! back the signed chain together with the edge address to dial. The private
//! key never leaves the process.

use async_trait::async_trait;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::debug;

use strata_proxy::{CertSourceError, CertificateSource, ClientCert};

use crate::client::Client;
use crate::error::ApiError;

/// Certificate source backed by the control plane
pub struct RemoteCertSource {
    client: Client,
}

impl RemoteCertSource {
    /// Create a source that issues certificates through `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CertificateSource for RemoteCertSource {
    async fn fetch(&self, instance: &str) -> Result<ClientCert, CertSourceError> {
        let (org, database, branch) = split_instance(instance)?;

        let key = rcgen::KeyPair::generate().map_err(|e| {
            CertSourceError::InvalidMaterial(format!("Failed to generate keypair: {}", e))
        })?;

        let csr = build_csr(&key, instance)?;
        debug!("Requesting certificate for {}", instance);

        let issued = self
            .client
            .create_certificate(org, database, branch, &csr)
            .await
            .map_err(|e| match e {
                ApiError::Auth(msg) => CertSourceError::Unauthorized(msg),
                ApiError::NotFound(msg) => CertSourceError::RequestFailed(msg),
                other => CertSourceError::RequestFailed(other.to_string()),
            })?;

        // Leaf first, then any intermediates
        let pem = format!("{}\n{}", issued.certificate, issued.certificate_chain);
        let cert_chain = rustls_pemfile::certs(&mut pem.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                CertSourceError::InvalidMaterial(format!("Failed to parse certificate: {}", e))
            })?;

        if cert_chain.is_empty() {
            return Err(CertSourceError::InvalidMaterial(
                "Certificate response contained no certificates".to_string(),
            ));
        }

        let private_key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()));

        let server_name = issued
            .server_name
            .clone()
            .unwrap_or_else(|| host_of(&issued.remote_addr));

        Ok(ClientCert {
            cert_chain,
            private_key,
            remote_addr: issued.remote_addr,
            server_name,
        })
    }
}

fn build_csr(key: &rcgen::KeyPair, instance: &str) -> Result<String, CertSourceError> {
    let mut params = rcgen::CertificateParams::default();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, instance);

    params
        .serialize_request(key)
        .map_err(|e| CertSourceError::InvalidMaterial(format!("Failed to serialize CSR: {}", e)))?
        .pem()
        .map_err(|e| CertSourceError::InvalidMaterial(format!("Failed to encode CSR: {}", e)))
}

fn split_instance(instance: &str) -> Result<(&str, &str, &str), CertSourceError> {
    let mut parts = instance.splitn(3, '/');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(org), Some(database), Some(branch))
            if !org.is_empty() && !database.is_empty() && !branch.is_empty() =>
        {
            Ok((org, database, branch))
        }
        _ => Err(CertSourceError::InvalidInstance(format!(
            "'{}' is not of the form org/database/branch",
            instance
        ))),
    }
}

/// Host part of a host:port address, without IPv6 brackets
fn host_of(addr: &str) -> String {
    let host = match addr.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => addr,
    };

    host.trim_start_matches('[').trim_end_matches(']').to_string()
}
