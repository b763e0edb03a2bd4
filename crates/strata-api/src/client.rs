//! HTTP client for the Strata control plane
//!
//! Thin wrapper around reqwest that handles authentication headers and
//! translates error responses into [`ApiError`] values callers can match on.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::models::{Branch, BranchCertificate, ListResponse};

/// Default control plane endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.strata.dev";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// API credentials
#[derive(Clone)]
pub enum Credentials {
    /// Service token issued for automation
    ServiceToken { id: String, token: String },

    /// Personal access token from an interactive login
    AccessToken(String),
}

// Token material must never reach logs, so only the id is printed
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ServiceToken { id, .. } => {
                f.debug_struct("ServiceToken").field("id", id).finish()
            }
            Credentials::AccessToken(_) => f.write_str("AccessToken"),
        }
    }
}

impl Credentials {
    fn authorization_header(&self) -> String {
        match self {
            Credentials::ServiceToken { id, token } => format!("{}:{}", id, token),
            Credentials::AccessToken(token) => format!("Bearer {}", token),
        }
    }
}

/// Control plane client
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl Client {
    /// Start building a client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// List the branches of a database
    pub async fn list_branches(&self, org: &str, database: &str) -> Result<Vec<Branch>, ApiError> {
        let path = format!("/v1/organizations/{}/databases/{}/branches", org, database);
        debug!("GET {}", path);

        let response = self.request(Method::GET, &path).send().await?;
        let list: ListResponse<Branch> = handle_response(response).await?;

        Ok(list.data)
    }

    /// Submit a certificate signing request for a branch.
    ///
    /// Returns the signed certificate along with the edge address it is
    /// valid for.
    pub async fn create_certificate(
        &self,
        org: &str,
        database: &str,
        branch: &str,
        csr: &str,
    ) -> Result<BranchCertificate, ApiError> {
        let path = format!(
            "/v1/organizations/{}/databases/{}/branches/{}/create-certificate",
            org, database, branch
        );
        debug!("POST {}", path);

        let response = self
            .request(Method::POST, &path)
            .json(&CertificateRequest { csr })
            .send()
            .await?;

        handle_response(response).await
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);

        self.http
            .request(method, &url)
            .header("Authorization", self.credentials.authorization_header())
    }
}

/// Builder for [`Client`]
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the control plane endpoint
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the credentials sent with every request
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<Client, ApiError> {
        let credentials = self
            .credentials
            .ok_or_else(|| ApiError::Auth("No credentials configured".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("strata-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Client {
            http,
            base_url: self.base_url,
            credentials,
        })
    }
}

#[derive(Serialize)]
struct CertificateRequest<'a> {
    csr: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();

    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(status, &body);

    match status {
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(message)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Auth(message)),
        _ => Err(ApiError::Api {
            status: status.as_u16(),
            message,
        }),
    }
}

/// Pull a human-readable message out of an error response body
fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }

    if !body.trim().is_empty() {
        return body.trim().to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}
