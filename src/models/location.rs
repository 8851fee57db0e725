//! Where content lives: providers, fully specified locations and session roots.
//!
//! - `Provider`: closed set of supported backends
//! - `Location`: `{provider, repo, commit, path}` ready for adapter dispatch
//! - `Source`: the root a session resolves against (repo, base directory, branch/commit)
//! - `parse_repo_url`: maps submodule URLs onto a provider and repo name

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ResolverError;
use crate::session::path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
    Bitbucket,
    Azure,
    Local,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Github,
        Provider::Gitlab,
        Provider::Bitbucket,
        Provider::Azure,
        Provider::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Bitbucket => "bitbucket",
            Provider::Azure => "azure",
            Provider::Local => "local",
        }
    }

    /// Public host of the provider, used for credential lookup and clone URLs.
    pub fn default_host(&self) -> &'static str {
        match self {
            Provider::Github => "github.com",
            Provider::Gitlab => "gitlab.com",
            Provider::Bitbucket => "bitbucket.org",
            Provider::Azure => "dev.azure.com",
            Provider::Local => "localhost",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ResolverError::UnsupportedProvider(s.to_string()))
    }
}

/// A fully specified pointer into one backend. Built fresh for every resolution.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct Location {
    pub provider: Provider,
    pub repo: String,
    pub commit: String,
    pub path: String,
}

impl Location {
    pub fn new(provider: Provider, repo: impl Into<String>, commit: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            provider,
            repo: repo.into(),
            commit: commit.into(),
            path: path.into(),
        }
    }

    /// Same repository and commit, different path.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}:/{}", self.provider, self.repo, self.commit, self.path)
    }
}

/// Root of a fetch session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub provider: Provider,
    pub repo: String,
    /// Base directory caller paths are relative to, normalized without slashes at the ends.
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub branch: Option<String>,
    /// Pinned commit; when absent the branch head (or default branch head) is used.
    #[serde(default)]
    pub commit: Option<String>,
}

impl Source {
    pub fn new(provider: Provider, repo: impl Into<String>) -> Self {
        Self {
            provider,
            repo: repo.into(),
            directory: String::new(),
            branch: None,
            commit: None,
        }
    }

    /// A local checkout, e.g. one produced by `CloneAcquirer`.
    pub fn local(checkout: impl Into<String>) -> Self {
        Self::new(Provider::Local, checkout)
    }

    pub fn with_directory(mut self, directory: &str) -> Self {
        self.directory = path::normalize(directory);
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }
}

/// Map a git remote URL onto a hosted provider and repository name.
///
/// Understands `https://`, `ssh://`, `git://` and scp-style `git@host:owner/repo`
/// remotes of the public hosts. Returns `None` for any other host.
pub fn parse_repo_url(url: &str) -> Option<(Provider, String)> {
    let url = url.trim().trim_start_matches("git+");

    let (host, repo_path) = if let Some((_, rest)) = url.split_once("://") {
        let rest = rest.split_once('@').map(|(_, r)| r).unwrap_or(rest);
        let (host, path) = rest.split_once('/')?;
        (host.split(':').next().unwrap_or(host).to_string(), path.to_string())
    } else {
        // scp-like syntax: user@host:path
        let (user_host, path) = url.split_once(':')?;
        let host = user_host.rsplit('@').next().unwrap_or(user_host);
        (host.to_string(), path.to_string())
    };

    let repo_path = repo_path
        .trim_matches('/')
        .trim_end_matches(".git")
        .to_string();
    if repo_path.is_empty() {
        return None;
    }

    match host.to_ascii_lowercase().as_str() {
        "github.com" | "www.github.com" => two_segments(&repo_path).map(|r| (Provider::Github, r)),
        "gitlab.com" | "www.gitlab.com" => Some((Provider::Gitlab, repo_path)),
        "bitbucket.org" | "www.bitbucket.org" => {
            two_segments(&repo_path).map(|r| (Provider::Bitbucket, r))
        }
        "dev.azure.com" => azure_repo(&repo_path).map(|r| (Provider::Azure, r)),
        "ssh.dev.azure.com" | "vs-ssh.visualstudio.com" => {
            // v3/org/project/repo
            let parts: Vec<&str> = repo_path.split('/').collect();
            match parts.as_slice() {
                ["v3", org, project, repo] => {
                    Some((Provider::Azure, format!("{}/{}/_git/{}", org, project, repo)))
                }
                _ => None,
            }
        }
        h if h.ends_with(".visualstudio.com") => {
            let org = h.trim_end_matches(".visualstudio.com");
            azure_repo(&format!("{}/{}", org, repo_path)).map(|r| (Provider::Azure, r))
        }
        _ => None,
    }
}

fn two_segments(repo_path: &str) -> Option<String> {
    let mut parts = repo_path.split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => {
            Some(format!("{}/{}", owner, name))
        }
        _ => None,
    }
}

fn azure_repo(repo_path: &str) -> Option<String> {
    let parts: Vec<&str> = repo_path.split('/').collect();
    match parts.as_slice() {
        [org, project, "_git", repo, ..] => Some(format!("{}/{}/_git/{}", org, project, repo)),
        _ => None,
    }
}
