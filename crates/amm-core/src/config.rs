//! Client configuration.
//!
//! Configuration is read from `~/.config/amm-assist/config.toml` when it
//! exists. `AMM_API_BASE_URL` overrides the base URL from the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AmmError, Result};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const API_BASE_URL_ENV: &str = "AMM_API_BASE_URL";

const CONFIG_DIR: &str = "amm-assist";
const CONFIG_FILE: &str = "config.toml";

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Settings for talking to the assistant backend.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the backend, without a trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Overall request timeout. Unset by default since chat responses are
    /// long-lived streams.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Loads the user config file (if any) and applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };

        if let Ok(base_url) = std::env::var(API_BASE_URL_ENV) {
            tracing::debug!("Using {} override: {}", API_BASE_URL_ENV, base_url);
            config.api_base_url = base_url;
        }

        config.normalized()
    }

    /// Loads configuration from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AmmError::config(format!(
                "Failed to read configuration file at {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.normalized()
    }

    /// Returns the full URL for an API path such as `/api/chat`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    fn normalized(mut self) -> Result<Self> {
        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(AmmError::config(format!(
                "api_base_url must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }
        self.api_base_url = trimmed.to_string();
        Ok(self)
    }
}

/// Returns the path of the user config file: ~/.config/amm-assist/config.toml
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
