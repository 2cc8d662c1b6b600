//! Configuration types and loading
//!
//! Config precedence: CLI `--config` > `CONFIG_PATH` env var > `authctl.toml`.
//! `AUTHCTL_BASE_URL` overrides `api.base_url` after the file is read.
//! Tokens are never part of the config; they live in the credential store.

use serde::Deserialize;
use session_client::{ClientConfig, DEFAULT_EXEMPT_PATTERNS};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub exempt: ExemptConfig,
}

/// API endpoint settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Reissue endpoint settings
#[derive(Debug, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_path")]
    pub path: String,
    #[serde(default = "default_refresh_header")]
    pub header: String,
    #[serde(default = "default_refresh_timeout")]
    pub timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            path: default_refresh_path(),
            header: default_refresh_header(),
            timeout_secs: default_refresh_timeout(),
        }
    }
}

/// Credential persistence
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// URL substrings sent without credentials
#[derive(Debug, Deserialize)]
pub struct ExemptConfig {
    #[serde(default = "default_exempt_patterns")]
    pub patterns: Vec<String>,
}

impl Default for ExemptConfig {
    fn default() -> Self {
        Self {
            patterns: default_exempt_patterns(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

fn default_refresh_timeout() -> u64 {
    30
}

fn default_refresh_path() -> String {
    session_client::ClientConfig::default().refresh_path
}

fn default_refresh_header() -> String {
    session_client::ClientConfig::default().refresh_header
}

fn default_exempt_patterns() -> Vec<String> {
    DEFAULT_EXEMPT_PATTERNS.iter().map(|p| p.to_string()).collect()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(base_url) = std::env::var("AUTHCTL_BASE_URL") {
            config.api.base_url = base_url;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.refresh.timeout_secs == 0 {
            return Err(common::Error::Config(
                "refresh.timeout_secs must be greater than 0".into(),
            ));
        }

        if !self.refresh.path.starts_with('/') {
            return Err(common::Error::Config(format!(
                "refresh.path must start with /, got: {}",
                self.refresh.path
            )));
        }

        if self.refresh.header.trim().is_empty() {
            return Err(common::Error::Config(
                "refresh.header must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("authctl.toml")
    }

    /// Library-level client settings.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            refresh_path: self.refresh.path.clone(),
            refresh_header: self.refresh.header.clone(),
            exempt_patterns: self.exempt.patterns.clone(),
            request_timeout: Duration::from_secs(self.api.timeout_secs),
            refresh_timeout: Duration::from_secs(self.refresh.timeout_secs),
            ..ClientConfig::default()
        }
    }
}
