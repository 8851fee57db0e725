//! GitLab adapter over the v4 repository API.
//!
//! - Listing: `GET /projects/{id}/repository/tree?path=&ref=&per_page=100`, following
//!   `X-Next-Page`. Types: `blob` (mode `120000` is a symlink), `tree`, `commit`.
//! - Symlink targets: `GET /projects/{id}/repository/blobs/{sha}/raw` of the link blob.
//! - Reading: the parent listing first (the files API hides the mode, so that is where
//!   symlinks show up), then `GET /projects/{id}/repository/files/{path}?ref=`.
//! - GitLab does not return file sizes or submodule URLs in tree listings.

use serde::Deserialize;
use url::Url;

use crate::config::ResolverConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ResolverError, Result};
use crate::models::{Entry, EntryType, Link, Location, Provider};
use crate::providers::http::{ApiClient, Auth};
use crate::providers::{decode_base64, listed_blob, strip_bom, symlink_target, Blob, ProviderAdapter};

const PER_PAGE: &str = "100";
const SYMLINK_MODE: &str = "120000";

#[derive(Debug, Deserialize)]
struct TreeItem {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    mode: String,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    id: String,
}

pub struct GitlabAdapter {
    api: ApiClient,
}

impl GitlabAdapter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn from_config(config: &ResolverConfig, credentials: &dyn CredentialProvider) -> Result<Self> {
        let api = ApiClient::from_config(Provider::Gitlab, config, credentials, |credential| {
            match credential.token.or(credential.password) {
                Some(token) => Auth::Header {
                    name: "PRIVATE-TOKEN",
                    value: token,
                },
                None => Auth::Anonymous,
            }
        })?;
        Ok(Self::new(api))
    }

    /// Project endpoints take the URL-encoded full path as the project id.
    fn project_url(&self, repo: &str, rest: &[&str]) -> Result<Url> {
        self.api
            .endpoint(["projects", repo].into_iter().chain(rest.iter().copied()))
    }

    fn tree_page(&self, location: &Location, page: &str) -> Result<(Vec<TreeItem>, Option<String>)> {
        let mut url = self.project_url(&location.repo, &["repository", "tree"])?;
        {
            let mut query = url.query_pairs_mut();
            if !location.path.is_empty() {
                query.append_pair("path", &location.path);
            }
            query
                .append_pair("ref", &location.commit)
                .append_pair("per_page", PER_PAGE)
                .append_pair("page", page);
        }

        let response = self.api.get(url, &location.path)?;
        let next_page = response
            .headers()
            .get("x-next-page")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Ok((response.json()?, next_page))
    }

    fn to_entry(&self, repo: &str, item: TreeItem) -> Result<Option<Entry>> {
        let entry_type = match (item.kind.as_str(), item.mode.as_str()) {
            ("blob", SYMLINK_MODE) => EntryType::Symlink,
            ("blob", _) => EntryType::File,
            ("tree", _) => EntryType::Dir,
            ("commit", _) => EntryType::Submodule,
            (other, _) => {
                tracing::debug!("Skipping GitLab entry {} of type {}", item.path, other);
                return Ok(None);
            }
        };

        let link = match entry_type {
            // The link target is the body of the link blob
            EntryType::Symlink => {
                let url = self.project_url(repo, &["repository", "blobs", &item.id, "raw"])?;
                let raw = self.api.get_bytes(url, &item.path)?;
                symlink_target(&item.path, &String::from_utf8_lossy(&raw)).map(|target| Link::Symlink { target })
            }
            EntryType::Submodule => Some(Link::Submodule {
                url: None,
                commit: item.id.clone(),
            }),
            _ => None,
        };

        let mut entry = Entry::new(item.name, item.path, entry_type).with_sha(item.id);
        if let Some(link) = link {
            entry = entry.with_link(link);
        }
        Ok(Some(entry))
    }
}

impl ProviderAdapter for GitlabAdapter {
    fn provider(&self) -> Provider {
        Provider::Gitlab
    }

    fn resolve_commit(&self, repo: &str, branch: Option<&str>) -> Result<String> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => {
                let url = self.project_url(repo, &[])?;
                let info: ProjectInfo = self.api.get_json(url, repo).map_err(|e| match e {
                    ResolverError::NotFound(_) => ResolverError::RepoNotFound(repo.to_string()),
                    other => other,
                })?;
                info.default_branch
                    .ok_or_else(|| ResolverError::unexpected(Provider::Gitlab, format!("{} is empty", repo)))?
            }
        };

        let url = self.project_url(repo, &["repository", "branches", &branch])?;
        match self.api.get_json::<BranchInfo>(url, &branch) {
            Ok(info) => Ok(info.commit.id),
            Err(ResolverError::NotFound(_)) => Err(ResolverError::BranchNotFound(branch)),
            Err(e) => Err(e),
        }
    }

    fn list_directory(&self, location: &Location) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        let mut page = "1".to_string();
        loop {
            let (items, next_page) = self.tree_page(location, &page)?;
            for item in items {
                entries.extend(self.to_entry(&location.repo, item)?);
            }
            match next_page {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(entries)
    }

    fn fetch_blob(&self, location: &Location) -> Result<Blob> {
        // The files API does not report the file mode
        if let Some(blob) = listed_blob(self, location)? {
            return Ok(blob);
        }

        let mut url = self.project_url(&location.repo, &["repository", "files", &location.path])?;
        url.query_pairs_mut().append_pair("ref", &location.commit);

        let file: FileResponse = self.api.get_json(url, &location.path)?;
        if file.encoding == "base64" {
            return decode_base64(&file.content).map(Blob::Content);
        }
        Ok(Blob::Content(strip_bom(file.content.into_bytes())))
    }
}
