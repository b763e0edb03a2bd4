//! Global CLI configuration management
//!
//! Stores the default organization and service token credentials in
//! ~/.config/strata/config.json. Environment variables override the file:
//! STRATA_SERVICE_TOKEN_ID, STRATA_SERVICE_TOKEN, STRATA_TOKEN and
//! STRATA_API_URL.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use strata_api::{Credentials, DEFAULT_BASE_URL};

/// Global CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Default organization for commands that need one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Service token ID for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token_id: Option<String>,

    /// Service token secret for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,

    /// Personal access token for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Control plane endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl StrataConfig {
    /// Credentials to authenticate API calls with.
    ///
    /// A service token wins over an access token when both are configured.
    pub fn credentials(&self) -> Result<Credentials> {
        if let (Some(id), Some(token)) = (&self.service_token_id, &self.service_token) {
            return Ok(Credentials::ServiceToken {
                id: id.clone(),
                token: token.clone(),
            });
        }

        if let Some(token) = &self.access_token {
            return Ok(Credentials::AccessToken(token.clone()));
        }

        anyhow::bail!(
            "Not authenticated. Set STRATA_SERVICE_TOKEN_ID and STRATA_SERVICE_TOKEN, \
             or add service_token_id and service_token to ~/.config/strata/config.json"
        )
    }

    /// Control plane endpoint, falling back to the public API
    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(id) = get("STRATA_SERVICE_TOKEN_ID").filter(|v| !v.is_empty()) {
            self.service_token_id = Some(id);
        }
        if let Some(token) = get("STRATA_SERVICE_TOKEN").filter(|v| !v.is_empty()) {
            self.service_token = Some(token);
        }
        if let Some(token) = get("STRATA_TOKEN").filter(|v| !v.is_empty()) {
            self.access_token = Some(token);
        }
        if let Some(url) = get("STRATA_API_URL").filter(|v| !v.is_empty()) {
            self.api_url = Some(url);
        }
    }
}

/// Configuration manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the config file path
    fn get_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".config").join("strata").join("config.json"))
    }

    /// Load the configuration from disk with environment overrides applied
    pub fn load() -> Result<StrataConfig> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    fn load_from(path: &Path) -> Result<StrataConfig> {
        // Return default config if file doesn't exist
        if !path.exists() {
            return Ok(StrataConfig::default());
        }

        let json =
            fs::read_to_string(path).context(format!("Failed to read config file: {:?}", path))?;

        let config: StrataConfig = serde_json::from_str(&json)
            .context(format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Save the configuration to disk
    pub fn save(config: &StrataConfig) -> Result<()> {
        Self::save_to(&Self::get_config_path()?, config)
    }

    fn save_to(path: &Path, config: &StrataConfig) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(path, json).context(format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}
