//! GitHub adapter over the REST contents API.
//!
//! - Listing: `GET /repos/{repo}/contents/{path}?ref={commit}`. A single object instead
//!   of an array means the path is a file, symlink or submodule.
//! - Reading: same endpoint; symlinks come back with their `target`. Blobs over the
//!   contents API size limit are answered with 403 `too_large`, in which case the
//!   blob sha is taken from the parent listing and fetched through the Git Data API.
//! - Commit: `GET /repos/{repo}/git/refs/heads/{branch}`; default branch from
//!   `GET /repos/{repo}`.

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config::ResolverConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ResolverError, Result};
use crate::models::{Entry, EntryType, Link, Location, Provider};
use crate::providers::http::{ApiClient, Auth};
use crate::providers::{decode_base64, strip_bom, symlink_target, Blob, ProviderAdapter};
use crate::session::path;

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    sha: Option<String>,
    content: Option<String>,
    encoding: Option<String>,
    target: Option<String>,
    submodule_git_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentItem>),
    Single(Box<ContentItem>),
}

#[derive(Debug, Deserialize)]
struct GitBlob {
    content: String,
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RefResponse {
    Exact { object: RefObject },
    // GitHub answers a ref prefix with every matching ref
    Prefix(Vec<serde_json::Value>),
}

pub struct GithubAdapter {
    api: ApiClient,
}

impl GithubAdapter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn from_config(config: &ResolverConfig, credentials: &dyn CredentialProvider) -> Result<Self> {
        let api = ApiClient::from_config(Provider::Github, config, credentials, |credential| {
            match credential.token.or(credential.password) {
                Some(token) => Auth::Header {
                    name: "Authorization",
                    value: format!("token {}", token),
                },
                None => Auth::Anonymous,
            }
        })?;
        Ok(Self::new(api))
    }

    fn repo_url(&self, repo: &str, rest: &[&str]) -> Result<Url> {
        self.api
            .endpoint(["repos"].into_iter().chain(repo.split('/')).chain(rest.iter().copied()))
    }

    fn contents_url(&self, location: &Location) -> Result<Url> {
        let mut url = self.repo_url(&location.repo, &["contents"])?;
        url.path_segments_mut()
            .map_err(|_| ResolverError::Internal("GitHub API root cannot hold paths".to_string()))?
            .extend(location.path.split('/').filter(|s| !s.is_empty()));
        url.query_pairs_mut().append_pair("ref", &location.commit);
        Ok(url)
    }

    fn contents(&self, location: &Location) -> Result<ContentsResponse> {
        let url = self.contents_url(location)?;
        self.api.get_json(url, &location.path)
    }

    /// Size-unconstrained read through the Git Data blobs API.
    fn fetch_large_blob(&self, location: &Location) -> Result<Vec<u8>> {
        let dir = path::parent(&location.path).unwrap_or("");
        let name = path::file_name(&location.path);
        let sha = self
            .list_directory(&location.with_path(dir))?
            .into_iter()
            .find(|entry| entry.name == name)
            .and_then(|entry| entry.sha)
            .ok_or_else(|| ResolverError::NotFound(location.path.clone()))?;

        tracing::debug!("{} is too large for the contents API, fetching blob {}", location, sha);
        let url = self.repo_url(&location.repo, &["git", "blobs", &sha])?;
        let blob: GitBlob = self.api.get_json(url, &location.path)?;
        if blob.encoding == "utf-8" {
            return Ok(strip_bom(blob.content.into_bytes()));
        }
        decode_base64(&blob.content)
    }

    fn to_entry(item: ContentItem, listed_from: &str) -> Option<Entry> {
        let entry_type = match item.kind.as_str() {
            "file" => EntryType::File,
            "dir" => EntryType::Dir,
            "symlink" => EntryType::Symlink,
            "submodule" => EntryType::Submodule,
            other => {
                tracing::debug!("Skipping GitHub entry {} of type {}", item.path, other);
                return None;
            }
        };

        let link = match entry_type {
            EntryType::Symlink => item
                .target
                .as_deref()
                .and_then(|target| symlink_target(&item.path, target))
                .map(|target| Link::Symlink { target }),
            EntryType::Submodule => item.sha.clone().map(|commit| Link::Submodule {
                url: item.submodule_git_url.clone(),
                commit,
            }),
            _ => None,
        };

        // Paths come back relative to the repository root already
        let path = if item.path.is_empty() {
            path::join(listed_from, &item.name)
        } else {
            item.path
        };

        let mut entry = Entry::new(item.name, path, entry_type).with_size(item.size);
        if let Some(sha) = item.sha {
            entry = entry.with_sha(sha);
        }
        if let Some(link) = link {
            entry = entry.with_link(link);
        }
        Some(entry)
    }
}

impl ProviderAdapter for GithubAdapter {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn resolve_commit(&self, repo: &str, branch: Option<&str>) -> Result<String> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => {
                let url = self.repo_url(repo, &[])?;
                let info: RepoInfo = self.api.get_json(url, repo).map_err(|e| match e {
                    ResolverError::NotFound(_) => ResolverError::RepoNotFound(repo.to_string()),
                    other => other,
                })?;
                info.default_branch
            }
        };

        let mut segments = vec!["git", "refs", "heads"];
        segments.extend(branch.split('/'));
        let url = self.repo_url(repo, &segments)?;
        match self.api.get_json::<RefResponse>(url, &branch) {
            Ok(RefResponse::Exact { object }) => Ok(object.sha),
            Ok(RefResponse::Prefix(_)) | Err(ResolverError::NotFound(_)) => {
                Err(ResolverError::BranchNotFound(branch))
            }
            Err(e) => Err(e),
        }
    }

    fn list_directory(&self, location: &Location) -> Result<Vec<Entry>> {
        match self.contents(location)? {
            ContentsResponse::Listing(items) => Ok(items
                .into_iter()
                .filter_map(|item| Self::to_entry(item, &location.path))
                .collect()),
            ContentsResponse::Single(item) if matches!(item.kind.as_str(), "symlink" | "submodule") => {
                let parent = path::parent(&location.path).unwrap_or("");
                Ok(Self::to_entry(*item, parent).into_iter().collect())
            }
            ContentsResponse::Single(_) => Err(ResolverError::NotFound(location.path.clone())),
        }
    }

    fn fetch_blob(&self, location: &Location) -> Result<Blob> {
        let url = self.contents_url(location)?;
        let response = self.api.send(url)?;

        if response.status() == StatusCode::FORBIDDEN {
            let body = response.text().unwrap_or_default();
            if body.contains("too_large") {
                return self.fetch_large_blob(location).map(Blob::Content);
            }
            return Err(ResolverError::AuthenticationFailure(format!(
                "github returned 403 for {}",
                location.path
            )));
        }

        let response = self.api.check_status(response, &location.path)?;
        let item = match response.json::<ContentsResponse>()? {
            ContentsResponse::Single(item) => item,
            ContentsResponse::Listing(_) => return Err(ResolverError::NotFound(location.path.clone())),
        };

        match item.kind.as_str() {
            "symlink" => {
                let target = item
                    .target
                    .as_deref()
                    .and_then(|target| symlink_target(&location.path, target))
                    .ok_or_else(|| ResolverError::NotFound(location.path.clone()))?;
                Ok(Blob::Symlink { target })
            }
            "file" => match (item.encoding.as_deref(), item.content.as_deref()) {
                (Some("base64"), Some(content)) => decode_base64(content).map(Blob::Content),
                // 1-100MB files come back with encoding "none" and no content
                _ if item.size > 0 => self.fetch_large_blob(location).map(Blob::Content),
                _ => Ok(Blob::Content(Vec::new())),
            },
            _ => Err(ResolverError::NotFound(location.path.clone())),
        }
    }
}
