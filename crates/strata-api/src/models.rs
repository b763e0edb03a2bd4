//! Control plane resource models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A branch of a database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name, unique within its database
    pub name: String,

    /// Whether this is the production branch
    #[serde(default)]
    pub production: bool,

    /// Whether the branch is ready to accept connections
    #[serde(default)]
    pub ready: bool,

    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Certificate issued for connecting to a branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchCertificate {
    /// PEM-encoded leaf certificate
    pub certificate: String,

    /// PEM-encoded intermediate chain
    #[serde(default)]
    pub certificate_chain: String,

    /// Edge address to dial with this certificate (host:port)
    pub remote_addr: String,

    /// TLS server name of the edge; derived from `remote_addr` when absent
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Envelope for list endpoints
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_decoding_tolerates_missing_fields() {
        let branch: Branch = serde_json::from_str(r#"{"name": "main"}"#).unwrap();

        assert_eq!(branch.name, "main");
        assert!(!branch.production);
        assert!(!branch.ready);
        assert!(branch.created_at.is_none());
    }

    #[test]
    fn test_branch_decoding_full() {
        let branch: Branch = serde_json::from_str(
            r#"{
                "name": "main",
                "production": true,
                "ready": true,
                "created_at": "2024-03-01T12:00:00Z",
                "unknown_field": 42
            }"#,
        )
        .unwrap();

        assert_eq!(branch.name, "main");
        assert!(branch.production);
        assert!(branch.ready);
        assert!(branch.created_at.is_some());
    }

    #[test]
    fn test_certificate_decoding() {
        let cert: BranchCertificate = serde_json::from_str(
            r#"{
                "certificate": "-----BEGIN CERTIFICATE-----",
                "remote_addr": "edge.strata.dev:3306"
            }"#,
        )
        .unwrap();

        assert_eq!(cert.remote_addr, "edge.strata.dev:3306");
        assert!(cert.certificate_chain.is_empty());
        assert!(cert.server_name.is_none());
    }

    #[test]
    fn test_list_envelope_decoding() {
        let list: ListResponse<Branch> =
            serde_json::from_str(r#"{"data": [{"name": "main"}, {"name": "dev"}]}"#).unwrap();

        assert_eq!(list.data.len(), 2);
        assert_eq!(list.data[0].name, "main");
        assert_eq!(list.data[1].name, "dev");
    }
}
