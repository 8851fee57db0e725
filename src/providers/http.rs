//! Blocking HTTP client shared by the REST adapters.
//!
//! Wraps `reqwest::blocking::Client` with the provider's API root, its authentication
//! scheme and the status mapping every adapter relies on:
//! 401/403 → `AuthenticationFailure`, 404 → `NotFound`, other failures →
//! `UnexpectedResponse`.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::config::{HttpSettings, ResolverConfig};
use crate::credentials::{Credential, CredentialProvider};
use crate::error::{ResolverError, Result};
use crate::models::Provider;

#[derive(Debug, Clone, Default)]
pub enum Auth {
    #[default]
    Anonymous,
    /// `Authorization`-style header, e.g. `("Authorization", "token abc")`.
    Header { name: &'static str, value: String },
    Basic { username: String, password: Option<String> },
}

pub struct ApiClient {
    client: Client,
    provider: Provider,
    base_url: Url,
    auth: Auth,
}

impl ApiClient {
    pub fn new(provider: Provider, base_url: &str, auth: Auth, settings: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.read_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            provider,
            base_url: Url::parse(base_url)?,
            auth,
        })
    }

    /// Client for `provider` using the configured endpoint and looked-up credential.
    pub fn from_config(
        provider: Provider,
        config: &ResolverConfig,
        credentials: &dyn CredentialProvider,
        auth_for: impl FnOnce(Credential) -> Auth,
    ) -> Result<Self> {
        let base = config
            .endpoints
            .api_base(provider)
            .ok_or_else(|| ResolverError::UnsupportedProvider(provider.to_string()))?;
        let auth = credentials
            .credential_for(provider, &config.endpoints.host(provider))
            .map(auth_for)
            .unwrap_or_default();
        Self::new(provider, base, auth, &config.http)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// API root extended by `segments`, each percent-encoded as a single segment.
    pub fn endpoint<'a, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ResolverError::Internal(format!("{} cannot be an API root", self.base_url)))?
            .pop_if_empty()
            .extend(segments.into_iter().filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Send a GET without interpreting the status.
    pub fn send(&self, url: Url) -> Result<Response> {
        tracing::debug!("{} GET {}", self.provider, url);
        let response = self.authorize(self.client.get(url)).send()?;
        Ok(response)
    }

    /// GET with the shared status mapping. `what` names the resource in errors.
    pub fn get(&self, url: Url, what: &str) -> Result<Response> {
        let response = self.send(url)?;
        self.check_status(response, what)
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let response = self.get(url, what)?;
        Ok(response.json()?)
    }

    pub fn get_bytes(&self, url: Url, what: &str) -> Result<Vec<u8>> {
        let response = self.get(url, what)?;
        Ok(response.bytes()?.to_vec())
    }

    pub fn check_status(&self, response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::NOT_FOUND => Err(ResolverError::NotFound(what.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ResolverError::AuthenticationFailure(format!(
                    "{} returned {} for {}",
                    self.provider, status, what
                )))
            }
            _ => {
                let body = response.text().unwrap_or_default();
                Err(ResolverError::unexpected(
                    self.provider,
                    format!("{} for {}: {}", status, what, body.trim()),
                ))
            }
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Anonymous => request,
            Auth::Header { name, value } => request.header(*name, value),
            Auth::Basic { username, password } => request.basic_auth(username, password.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(Provider::Gitlab, base, Auth::Anonymous, &HttpSettings::default()).unwrap()
    }

    #[test]
    fn endpoint_encodes_each_segment() {
        let api = client("https://gitlab.com/api/v4");
        let url = api
            .endpoint(["projects", "group/project", "repository", "files", "dir/a b.txt"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.com/api/v4/projects/group%2Fproject/repository/files/dir%2Fa%20b.txt"
        );
    }

    #[test]
    fn endpoint_skips_empty_segments() {
        let api = client("https://api.github.com/");
        let url = api.endpoint(["repos", "o", "r", "contents", ""]).unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/repos/o/r/contents");
    }
}
