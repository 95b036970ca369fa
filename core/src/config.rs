//! Client configuration.
//!
//! Defaults match the production storefront. Hosts can load a JSON file
//! (missing keys keep their defaults) and then overlay environment variables.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://backend-22cs.onrender.com/api";
pub const DEFAULT_TOKEN_KEY: &str = "jwt_token";
pub const DEFAULT_ROLES_KEY: &str = "user_roles";
pub const DEFAULT_LOGIN_ROUTE: &str = "/index.html";

pub const ENV_BASE_URL: &str = "TIENDA_API_BASE_URL";
pub const ENV_LOGIN_ROUTE: &str = "TIENDA_LOGIN_ROUTE";
pub const ENV_TIMEOUT_SECS: &str = "TIENDA_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Credential store key holding the bearer token.
    pub token_key: String,
    /// Credential store key holding the JSON-encoded role list.
    pub roles_key: String,
    pub login_route: String,
    /// Path fragments that mark a page as private.
    pub private_fragments: Vec<String>,
    /// Global timeout for the bundled transport. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            roles_key: DEFAULT_ROLES_KEY.to_string(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            private_fragments: vec![
                "perfil".to_string(),
                "admin".to_string(),
                "checkout".to_string(),
            ],
            timeout_secs: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay_env(|key| std::env::var(key).ok())
    }

    /// Overlay values found through `lookup`, keyed by variable name.
    pub fn overlay_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(route) = lookup(ENV_LOGIN_ROUTE) {
            self.login_route = route;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
            self.timeout_secs = Some(secs);
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
