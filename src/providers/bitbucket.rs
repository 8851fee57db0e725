//! Bitbucket Cloud adapter over the 2.0 `src` API.
//!
//! Listings and raw file bodies share one endpoint,
//! `GET /repositories/{owner}/{repo}/src/{commit}/{path}`: directories answer with a
//! paginated `values` page (`next` holds the following page URL), files with their
//! raw bytes. Reads list the parent first, since a link's raw body is its target path.

use serde::Deserialize;
use url::Url;

use crate::config::ResolverConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ResolverError, Result};
use crate::models::{Entry, EntryType, Link, Location, Provider};
use crate::providers::http::{ApiClient, Auth};
use crate::providers::{listed_blob, strip_bom, symlink_target, Blob, ProviderAdapter};
use crate::session::path;

const PAGE_LEN: &str = "100";

#[derive(Debug, Deserialize)]
struct SrcPage {
    values: Vec<SrcItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SrcItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    attributes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    mainbranch: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    target: BranchTarget,
}

#[derive(Debug, Deserialize)]
struct BranchTarget {
    hash: String,
}

pub struct BitbucketAdapter {
    api: ApiClient,
}

impl BitbucketAdapter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn from_config(config: &ResolverConfig, credentials: &dyn CredentialProvider) -> Result<Self> {
        let api = ApiClient::from_config(Provider::Bitbucket, config, credentials, |credential| {
            match (credential.username, credential.password, credential.token) {
                (Some(username), password, _) => Auth::Basic { username, password },
                (None, _, Some(token)) => Auth::Header {
                    name: "Authorization",
                    value: format!("Bearer {}", token),
                },
                _ => Auth::Anonymous,
            }
        })?;
        Ok(Self::new(api))
    }

    fn repo_url(&self, repo: &str, rest: &[&str]) -> Result<Url> {
        self.api.endpoint(
            ["repositories"]
                .into_iter()
                .chain(repo.split('/'))
                .chain(rest.iter().copied()),
        )
    }

    fn src_url(&self, location: &Location) -> Result<Url> {
        let mut url = self.repo_url(&location.repo, &["src", &location.commit])?;
        url.path_segments_mut()
            .map_err(|_| ResolverError::Internal("Bitbucket API root cannot hold paths".to_string()))?
            .extend(location.path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn to_entry(&self, location: &Location, item: SrcItem) -> Result<Option<Entry>> {
        let has = |attribute: &str| item.attributes.iter().any(|a| a == attribute);
        let entry_type = match item.kind.as_str() {
            "commit_directory" => EntryType::Dir,
            "commit_file" if has("link") => EntryType::Symlink,
            "commit_file" if has("subrepository") => EntryType::Submodule,
            "commit_file" => EntryType::File,
            other => {
                tracing::debug!("Skipping Bitbucket entry {} of type {}", item.path, other);
                return Ok(None);
            }
        };

        let name = path::file_name(&item.path).to_string();
        let mut entry = Entry::new(name, item.path.clone(), entry_type).with_size(item.size);

        // The link target is the body of the link blob
        if entry_type == EntryType::Symlink {
            let url = self.src_url(&location.with_path(item.path.as_str()))?;
            let raw = self.api.get_bytes(url, &item.path)?;
            if let Some(target) = symlink_target(&item.path, &String::from_utf8_lossy(&raw)) {
                entry = entry.with_link(Link::Symlink { target });
            }
        }
        Ok(Some(entry))
    }
}

impl ProviderAdapter for BitbucketAdapter {
    fn provider(&self) -> Provider {
        Provider::Bitbucket
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
                info.mainbranch
                    .map(|b| b.name)
                    .ok_or_else(|| ResolverError::unexpected(Provider::Bitbucket, format!("{} has no main branch", repo)))?
            }
        };

        let url = self.repo_url(repo, &["refs", "branches", &branch])?;
        match self.api.get_json::<BranchInfo>(url, &branch) {
            Ok(info) => Ok(info.target.hash),
            Err(ResolverError::NotFound(_)) => Err(ResolverError::BranchNotFound(branch)),
            Err(e) => Err(e),
        }
    }

    fn list_directory(&self, location: &Location) -> Result<Vec<Entry>> {
        let mut url = self.src_url(location)?;
        url.query_pairs_mut().append_pair("pagelen", PAGE_LEN);

        let mut entries = Vec::new();
        loop {
            let response = self.api.get(url, &location.path)?;
            let is_json = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with("application/json"));
            if !is_json {
                // A file body rather than a directory page
                return Err(ResolverError::NotFound(location.path.clone()));
            }

            let page: SrcPage = response.json()?;
            for item in page.values {
                entries.extend(self.to_entry(location, item)?);
            }
            match page.next {
                Some(next) => url = Url::parse(&next)?,
                None => break,
            }
        }
        Ok(entries)
    }

    fn fetch_blob(&self, location: &Location) -> Result<Blob> {
        // Raw bodies of links are their targets; only the parent listing tells them apart
        if let Some(blob) = listed_blob(self, location)? {
            return Ok(blob);
        }

        let url = self.src_url(location)?;
        let bytes = self.api.get_bytes(url, &location.path)?;
        Ok(Blob::Content(strip_bom(bytes)))
    }
}
