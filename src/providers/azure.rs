//! Azure DevOps adapter over the Git items API.
//!
//! Repositories are named `{org}/{project}/_git/{repo}`. Listings use
//! `items?recursionLevel=OneLevel`, whose result includes the folder itself; reads ask
//! for the raw octet stream.
//!
//! The items API reports no file mode, so symlinks look like regular blobs: listings
//! never hold symlink entries and reads return the link's target path as content.

use serde::Deserialize;
use url::Url;

use crate::config::ResolverConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ResolverError, Result};
use crate::models::{Entry, EntryType, Link, Location, Provider};
use crate::providers::http::{ApiClient, Auth};
use crate::providers::{strip_bom, Blob, ProviderAdapter};
use crate::session::path;

const API_VERSION: &str = "7.1";

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    object_id: String,
    git_object_type: String,
    path: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitRef {
    name: String,
    object_id: String,
}

/// `org/project/_git/repo` split into its parts.
struct RepoName<'a> {
    org: &'a str,
    project: &'a str,
    repo: &'a str,
}

impl<'a> RepoName<'a> {
    fn parse(repo: &'a str) -> Result<Self> {
        let parts: Vec<&str> = repo.split('/').collect();
        match parts.as_slice() {
            [org, project, "_git", name] => Ok(Self {
                org: *org,
                project: *project,
                repo: *name,
            }),
            _ => Err(ResolverError::RepoNotFound(format!(
                "{} is not an org/project/_git/repo name",
                repo
            ))),
        }
    }
}

pub struct AzureAdapter {
    api: ApiClient,
}

impl AzureAdapter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn from_config(config: &ResolverConfig, credentials: &dyn CredentialProvider) -> Result<Self> {
        let api = ApiClient::from_config(Provider::Azure, config, credentials, |credential| {
            match credential.token.or(credential.password) {
                // Personal access tokens go in the password with any user name
                Some(secret) => Auth::Basic {
                    username: credential.username.unwrap_or_default(),
                    password: Some(secret),
                },
                None => Auth::Anonymous,
            }
        })?;
        Ok(Self::new(api))
    }

    fn repository_url(&self, repo: &str, rest: &[&str]) -> Result<Url> {
        let name = RepoName::parse(repo)?;
        let mut url = self.api.endpoint(
            [name.org, name.project, "_apis", "git", "repositories", name.repo]
                .into_iter()
                .chain(rest.iter().copied()),
        )?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    fn items_url(&self, location: &Location) -> Result<Url> {
        let mut url = self.repository_url(&location.repo, &["items"])?;
        url.query_pairs_mut()
            .append_pair("path", &format!("/{}", location.path))
            .append_pair("versionDescriptor.version", &location.commit)
            .append_pair("versionDescriptor.versionType", "commit");
        Ok(url)
    }

    fn to_entry(item: Item) -> Option<Entry> {
        let entry_type = match item.git_object_type.as_str() {
            "blob" => EntryType::File,
            "tree" => EntryType::Dir,
            "commit" => EntryType::Submodule,
            other => {
                tracing::debug!("Skipping Azure item {} of type {}", item.path, other);
                return None;
            }
        };

        let item_path = path::normalize(&item.path);
        let name = path::file_name(&item_path).to_string();
        let mut entry = Entry::new(name, item_path, entry_type)
            .with_size(item.size)
            .with_sha(item.object_id.clone());
        if entry_type == EntryType::Submodule {
            entry = entry.with_link(Link::Submodule {
                url: None,
                commit: item.object_id,
            });
        }
        Some(entry)
    }
}

impl ProviderAdapter for AzureAdapter {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn resolve_commit(&self, repo: &str, branch: Option<&str>) -> Result<String> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => {
                let url = self.repository_url(repo, &[])?;
                let info: RepositoryInfo = self.api.get_json(url, repo).map_err(|e| match e {
                    ResolverError::NotFound(_) => ResolverError::RepoNotFound(repo.to_string()),
                    other => other,
                })?;
                let default_branch = info
                    .default_branch
                    .ok_or_else(|| ResolverError::unexpected(Provider::Azure, format!("{} is empty", repo)))?;
                default_branch.trim_start_matches("refs/heads/").to_string()
            }
        };

        let mut url = self.repository_url(repo, &["refs"])?;
        url.query_pairs_mut().append_pair("filter", &format!("heads/{}", branch));

        // `filter` is a prefix match
        let full_name = format!("refs/heads/{}", branch);
        let refs: ValueList<GitRef> = self.api.get_json(url, &branch)?;
        refs.value
            .into_iter()
            .find(|r| r.name == full_name)
            .map(|r| r.object_id)
            .ok_or(ResolverError::BranchNotFound(branch))
    }

    fn list_directory(&self, location: &Location) -> Result<Vec<Entry>> {
        let mut url = self.items_url(location)?;
        url.query_pairs_mut().append_pair("recursionLevel", "OneLevel");

        let items: ValueList<Item> = self.api.get_json(url, &location.path)?;
        let (own, entries): (Vec<Entry>, Vec<Entry>) = items
            .value
            .into_iter()
            .filter_map(Self::to_entry)
            .partition(|e| e.path == location.path);

        match own.into_iter().next() {
            // Listing a file yields just the file
            Some(own) if own.entry_type == EntryType::File => Err(ResolverError::NotFound(location.path.clone())),
            Some(own) if own.is_link() => Ok(vec![own]),
            _ => Ok(entries),
        }
    }

    fn fetch_blob(&self, location: &Location) -> Result<Blob> {
        let mut url = self.items_url(location)?;
        url.query_pairs_mut().append_pair("$format", "octetStream");
        let bytes = self.api.get_bytes(url, &location.path)?;
        Ok(Blob::Content(strip_bom(bytes)))
    }
}
