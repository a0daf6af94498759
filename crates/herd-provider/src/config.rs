//! Provider configuration
//!
//! Resolution chain (highest priority first):
//! 1. Explicit CLI flags (`--api-url`, `--token`, `--insecure`)
//! 2. `HERD_API_URL`, `HERD_TOKEN`, `HERD_INSECURE` environment variables
//! 3. `~/.herd/config.json` (or the file passed with `--config`)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use herd_common::wait::PollSpec;
use herd_common::{Error, Result};

use crate::checks::removal_spec_with;

const CONFIG_DIR_NAME: &str = ".herd";
const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable for the management API URL
pub const API_URL_ENV: &str = "HERD_API_URL";
/// Environment variable for the API token
pub const TOKEN_ENV: &str = "HERD_TOKEN";
/// Environment variable to skip TLS verification
pub const INSECURE_ENV: &str = "HERD_INSECURE";

/// Connection and timing settings for talking to the management API
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the management API (with or without the `/v3` suffix)
    pub api_url: Option<String>,
    /// Bearer token
    pub token: Option<String>,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// How long to wait for a deletion to finish
    pub wait_timeout_secs: u64,
    /// Delay before the first removal probe
    pub wait_delay_secs: u64,
    /// Minimum time between removal probes
    pub wait_min_interval_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token: None,
            insecure: false,
            request_timeout_secs: 30,
            wait_timeout_secs: 600,
            wait_delay_secs: 1,
            wait_min_interval_secs: 3,
        }
    }
}

// Manual Debug so tokens never end up in logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("insecure", &self.insecure)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("wait_timeout_secs", &self.wait_timeout_secs)
            .field("wait_delay_secs", &self.wait_delay_secs)
            .field("wait_min_interval_secs", &self.wait_min_interval_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// Overlay values from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an environment lookup function
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.is_empty()) {
            self.api_url = Some(url);
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.token = Some(token);
        }
        if let Some(insecure) = lookup(INSECURE_ENV) {
            self.insecure = matches!(insecure.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Overlay explicit flags; `None` leaves the current value
    pub fn with_overrides(
        mut self,
        api_url: Option<String>,
        token: Option<String>,
        insecure: bool,
    ) -> Self {
        if api_url.is_some() {
            self.api_url = api_url;
        }
        if token.is_some() {
            self.token = token;
        }
        self.insecure |= insecure;
        self
    }

    /// Check that the configuration can reach an API
    pub fn validate(&self) -> Result<()> {
        let url = self.api_url()?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::config(format!(
                "api url '{}' must start with http:// or https://",
                url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::config("request timeout must be greater than zero"));
        }
        Ok(())
    }

    /// The API URL, or a configuration error naming how to set it
    pub fn api_url(&self) -> Result<&str> {
        self.api_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                Error::config(format!(
                    "no management API url configured (use --api-url or {})",
                    API_URL_ENV
                ))
            })
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Poll spec for waiting on a deletion, using the configured timing
    pub fn removal_spec(&self) -> PollSpec {
        removal_spec_with(
            Duration::from_secs(self.wait_timeout_secs),
            Duration::from_secs(self.wait_delay_secs),
            Duration::from_secs(self.wait_min_interval_secs),
        )
    }
}

/// Path to `~/.herd/config.json`
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load config from a file, returning defaults if it doesn't exist
pub fn load_config(path: &Path) -> Result<ProviderConfig> {
    if !path.exists() {
        return Ok(ProviderConfig::default());
    }
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&data)
        .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)))
}

/// Resolve configuration from the file (explicit or default path) and environment
pub fn resolve(config_file: Option<&Path>) -> Result<ProviderConfig> {
    let path = match config_file {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    let mut config = load_config(&path)?;
    config.apply_env();
    Ok(config)
}
