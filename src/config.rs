//! Resolver configuration, loaded from a JSON file.
//!
//! ```json
//! {
//!   "endpoints": { "github": "https://ghe.example.com/api/v3" },
//!   "http": { "read_timeout_secs": 30 },
//!   "clone": { "max_retries": 5 },
//!   "credentials": [{ "host": "github.com", "token": "..." }]
//! }
//! ```
//!
//! Every section is optional; defaults target the public hosts.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::clone::RetryPolicy;
use crate::credentials::{Credential, StaticCredentials};
use crate::error::Result;
use crate::models::Provider;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub endpoints: Endpoints,
    pub http: HttpSettings,
    pub clone: CloneSettings,
    pub credentials: Vec<Credential>,
}

impl ResolverConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn credential_store(&self) -> StaticCredentials {
        StaticCredentials::new(self.credentials.clone())
    }
}

/// REST API roots per hosted provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub github: String,
    pub gitlab: String,
    pub bitbucket: String,
    pub azure: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github: "https://api.github.com".to_string(),
            gitlab: "https://gitlab.com/api/v4".to_string(),
            bitbucket: "https://api.bitbucket.org/2.0".to_string(),
            azure: "https://dev.azure.com".to_string(),
        }
    }
}

impl Endpoints {
    pub fn api_base(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Github => Some(&self.github),
            Provider::Gitlab => Some(&self.gitlab),
            Provider::Bitbucket => Some(&self.bitbucket),
            Provider::Azure => Some(&self.azure),
            Provider::Local => None,
        }
    }

    /// Host credentials are looked up under: the API host without an `api.` prefix.
    pub fn host(&self, provider: Provider) -> String {
        self.api_base(provider)
            .and_then(|base| Url::parse(base).ok())
            .and_then(|url| url.host_str().map(|h| h.trim_start_matches("api.").to_string()))
            .unwrap_or_else(|| provider.default_host().to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            read_timeout_secs: 20,
            user_agent: format!("repo-resolver/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneSettings {
    pub max_retries: u32,
    pub initial_backoff_secs: u64,
    pub submodules: bool,
}

impl Default for CloneSettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_secs: 3,
            submodules: true,
        }
    }
}

impl CloneSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
        }
    }
}
