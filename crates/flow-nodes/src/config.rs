//! Generation backend configuration
//!
//! Defaults point at a generation service on localhost. Hosts override them
//! programmatically or through the environment:
//!
//! - `FLOW_BACKEND_URL` - base URL of the service
//! - `FLOW_BACKEND_TIMEOUT_SECS` - per-request timeout
//! - `FLOW_BACKEND_NAME` - name the backend is registered under

use serde::{Deserialize, Serialize};

pub const ENV_BACKEND_URL: &str = "FLOW_BACKEND_URL";
pub const ENV_BACKEND_TIMEOUT_SECS: &str = "FLOW_BACKEND_TIMEOUT_SECS";
pub const ENV_BACKEND_NAME: &str = "FLOW_BACKEND_NAME";

/// Connection settings for one HTTP generation backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Name used by `ExecutionContext::with_backend` to select this backend
    pub name: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_url: "http://localhost:7860".to_string(),
            timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    /// Defaults overridden by the `FLOW_BACKEND_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(name) = lookup(ENV_BACKEND_NAME).filter(|v| !v.trim().is_empty()) {
            config.name = name.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_BACKEND_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout_secs = secs,
                _ => log::warn!(
                    "Ignoring invalid {}='{}', using {}s",
                    ENV_BACKEND_TIMEOUT_SECS,
                    raw,
                    config.timeout_secs
                ),
            }
        }

        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
