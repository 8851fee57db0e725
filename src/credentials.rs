//! Credential lookup. Managing tokens is someone else's job; the resolver only asks
//! for whatever is configured for a provider and host.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Provider;

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub host: String,
    /// Restricts the credential to one provider; any provider on `host` otherwise.
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("host", &self.host)
            .field("provider", &self.provider)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub trait CredentialProvider {
    fn credential_for(&self, provider: Provider, host: &str) -> Option<Credential>;
}

/// Credentials from configuration, first match wins.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    credentials: Vec<Credential>,
}

impl StaticCredentials {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }
}

impl CredentialProvider for StaticCredentials {
    fn credential_for(&self, provider: Provider, host: &str) -> Option<Credential> {
        self.credentials
            .iter()
            .filter(|c| c.provider.is_none_or(|p| p == provider))
            .find(|c| c.host.eq_ignore_ascii_case(host))
            .cloned()
    }
}
