//! Provider adapters: one implementation per backend behind `ProviderAdapter`.
//!
//! - `github`: GitHub contents + Git Data APIs
//! - `gitlab`: GitLab repository tree/files APIs
//! - `bitbucket`: Bitbucket Cloud `src` API
//! - `azure`: Azure DevOps items API
//! - `local`: git2 reader over a local (shallow) clone
//!
//! Adapters own the mapping of their backend's entry vocabulary onto `EntryType` and
//! the decoding of file contents. The session only ever talks to the trait.

pub mod azure;
pub mod bitbucket;
pub mod github;
pub mod gitlab;
pub mod http;
pub mod local;

use base64::Engine;
use std::collections::HashMap;

use crate::config::ResolverConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ResolverError, Result};
use crate::models::{Entry, EntryType, Link, Location, Provider};
use crate::session::path;

pub use azure::AzureAdapter;
pub use bitbucket::BitbucketAdapter;
pub use github::GithubAdapter;
pub use gitlab::GitlabAdapter;
pub use local::LocalAdapter;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Raw result of fetching a path as a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blob {
    Content(Vec<u8>),
    /// The path is a symlink; `target` is repository-relative and normalized.
    Symlink { target: String },
}

pub trait ProviderAdapter {
    fn provider(&self) -> Provider;

    /// Head commit of `branch`, or of the default branch when `branch` is `None`.
    fn resolve_commit(&self, repo: &str, branch: Option<&str>) -> Result<String>;

    /// List a directory. Raises `NotFound` when the backend reports the path absent.
    /// When the path itself is a symlink or submodule, returns that single link entry
    /// (its `path` equals `location.path`).
    fn list_directory(&self, location: &Location) -> Result<Vec<Entry>>;

    /// Fetch a path as a file without following symlinks.
    fn fetch_blob(&self, location: &Location) -> Result<Blob>;

    /// Read a file, following a symlink once. A link to another link is not followed.
    fn read_file(&self, location: &Location) -> Result<Vec<u8>> {
        match self.fetch_blob(location)? {
            Blob::Content(bytes) => Ok(bytes),
            Blob::Symlink { target } => {
                tracing::debug!("Following symlink {} -> {}", location, target);
                match self.fetch_blob(&location.with_path(target))? {
                    Blob::Content(bytes) => Ok(bytes),
                    Blob::Symlink { .. } => Err(ResolverError::NotFound(location.path.clone())),
                }
            }
        }
    }
}

/// The adapters available to a session, one per provider.
#[derive(Default)]
pub struct Providers {
    adapters: HashMap<Provider, Box<dyn ProviderAdapter>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    /// All five backends, wired with the configured endpoints and credentials.
    pub fn from_config(config: &ResolverConfig, credentials: &dyn CredentialProvider) -> Result<Self> {
        let mut providers = Self::new();
        for provider in Provider::ALL {
            let adapter: Box<dyn ProviderAdapter> = match provider {
                Provider::Github => Box::new(GithubAdapter::from_config(config, credentials)?),
                Provider::Gitlab => Box::new(GitlabAdapter::from_config(config, credentials)?),
                Provider::Bitbucket => Box::new(BitbucketAdapter::from_config(config, credentials)?),
                Provider::Azure => Box::new(AzureAdapter::from_config(config, credentials)?),
                Provider::Local => Box::new(LocalAdapter::new()),
            };
            providers.adapters.insert(provider, adapter);
        }
        Ok(providers)
    }

    pub fn with_adapter(mut self, adapter: impl ProviderAdapter + 'static) -> Self {
        self.insert(Box::new(adapter));
        self
    }

    pub fn insert(&mut self, adapter: Box<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: Provider) -> Result<&dyn ProviderAdapter> {
        self.adapters
            .get(&provider)
            .map(|a| a.as_ref())
            .ok_or_else(|| ResolverError::UnsupportedProvider(provider.to_string()))
    }
}

/// Blob for `location` as its parent listing describes it, for backends whose file
/// reads carry no file mode. `Ok(None)` means the entry is a plain file and its
/// contents still have to be fetched.
pub fn listed_blob<A>(adapter: &A, location: &Location) -> Result<Option<Blob>>
where
    A: ProviderAdapter + ?Sized,
{
    let parent = location.with_path(path::parent(&location.path).unwrap_or(""));
    let entry = adapter
        .list_directory(&parent)?
        .into_iter()
        .find(|entry| entry.path == location.path)
        .ok_or_else(|| ResolverError::NotFound(location.path.clone()))?;

    match (entry.entry_type, entry.link) {
        (EntryType::File, _) => Ok(None),
        (EntryType::Symlink, Some(Link::Symlink { target })) => Ok(Some(Blob::Symlink { target })),
        // Directories, submodules and links escaping the repository
        _ => Err(ResolverError::NotFound(location.path.clone())),
    }
}

/// Decode base64 API content (line breaks allowed) and strip a UTF-8 BOM.
pub fn decode_base64(content: &str) -> Result<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ResolverError::Internal(format!("Invalid base64 content: {}", e)))?;
    Ok(strip_bom(bytes))
}

pub fn strip_bom(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    bytes
}

/// Resolve a raw symlink target against the directory holding the link.
///
/// Absolute targets are taken from the repository root. `None` when the target
/// escapes the repository.
pub fn symlink_target(link_path: &str, raw_target: &str) -> Option<String> {
    let raw_target = raw_target.trim_end_matches('\n');
    if let Some(absolute) = raw_target.strip_prefix('/') {
        return path::normalize_within_root(absolute);
    }
    let dir = path::parent(link_path).unwrap_or("");
    path::normalize_within_root(&path::join(dir, raw_target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wrapped_base64_and_strips_bom() {
        // "\u{feff}octokit\n" wrapped over two lines
        let encoded = "77u/b2N0\nb2tpdAo=\n";
        assert_eq!(decode_base64(encoded).unwrap(), b"octokit\n");
    }

    #[test]
    fn keeps_bytes_without_bom_intact() {
        let bytes = vec![0x00, 0xFF, 0xEF, 0xBB, 0xBF];
        assert_eq!(strip_bom(bytes.clone()), bytes);
    }

    #[test]
    fn symlink_targets_resolve_from_link_directory() {
        assert_eq!(symlink_target("some/dir", "../shared/dir"), Some("shared/dir".to_string()));
        assert_eq!(symlink_target("a/link.txt", "b.txt"), Some("a/b.txt".to_string()));
        assert_eq!(symlink_target("a/link.txt", "/top/b.txt"), Some("top/b.txt".to_string()));
        assert_eq!(symlink_target("link", "../outside"), None);
    }
}
