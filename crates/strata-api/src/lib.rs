//! Strata control plane API client
//!
//! Resource listing and certificate issuance against the Strata API, plus
//! the [`RemoteCertSource`] that plugs certificate provisioning into the
//! tunnel client.

pub mod cert;
pub mod client;
pub mod error;
pub mod models;

pub use cert::RemoteCertSource;
pub use client::{Client, ClientBuilder, Credentials, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use models::{Branch, BranchCertificate};
