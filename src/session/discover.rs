//! Redirection discovery: turning a not-found into a newly mapped symlink or submodule.
//!
//! Walks from the parent of the missing path up to the repository root, listing each
//! ancestor with redirections followed. The first link entry covering the missing path
//! is registered. Ancestor listings go straight to the adapters (through the cache)
//! and are never filtered or rediscovered themselves.

use std::path::Path;

use crate::error::Result;
use crate::models::{parse_repo_url, Entry, Link, Location, Provider};
use crate::session::registry::Redirection;
use crate::session::{boundary, path, FetchSession};

const GITMODULES: &str = ".gitmodules";

impl FetchSession {
    /// True iff a new redirection covering `logical_path` was registered.
    pub(crate) fn discover(&mut self, logical_path: &str) -> Result<bool> {
        let mut ancestor = path::parent(logical_path).map(str::to_string);

        while let Some(dir) = ancestor {
            let location = self.resolve(&dir, true)?;
            let entries = match self.list_at(&location) {
                Ok(entries) => entries,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            };

            let covering = match boundary(&entries, &location) {
                Some(link) => Some((dir.clone(), link.clone())),
                None => entries
                    .iter()
                    .filter(|entry| entry.is_link())
                    .map(|entry| (path::join(&dir, &entry.name), entry))
                    .find(|(logical, _)| path::is_within(logical_path, logical))
                    .map(|(logical, entry)| (logical, entry.clone())),
            };

            if let Some((prefix, entry)) = covering {
                return self.register_link(&prefix, &location, &entry);
            }
            ancestor = path::parent(&dir).map(str::to_string);
        }

        tracing::debug!("No symlink or submodule covers /{}", logical_path);
        Ok(false)
    }

    /// Register the redirection for a link entry listed at `listed_at`. False when the
    /// link cannot be mapped or its prefix is already known.
    pub(crate) fn register_link(&mut self, prefix: &str, listed_at: &Location, entry: &Entry) -> Result<bool> {
        if self.registry.contains(prefix) {
            return Ok(false);
        }

        let redirection = match &entry.link {
            Some(Link::Symlink { target }) => Some(Redirection {
                path_prefix: prefix.to_string(),
                provider: listed_at.provider,
                repo: listed_at.repo.clone(),
                commit: listed_at.commit.clone(),
                rewritten_prefix: target.clone(),
            }),
            Some(Link::Submodule { url, commit }) => self
                .submodule_repo(listed_at, entry, url.as_deref())?
                .map(|(provider, repo)| Redirection {
                    path_prefix: prefix.to_string(),
                    provider,
                    repo,
                    commit: commit.clone(),
                    rewritten_prefix: String::new(),
                }),
            None => None,
        };

        match redirection {
            Some(redirection) => Ok(self.registry.register(redirection)),
            None => {
                tracing::warn!("Cannot map {} at /{}, leaving it unresolved", entry.path, prefix);
                Ok(false)
            }
        }
    }

    /// Provider and repository a submodule entry points to.
    fn submodule_repo(
        &mut self,
        listed_at: &Location,
        entry: &Entry,
        reported_url: Option<&str>,
    ) -> Result<Option<(Provider, String)>> {
        // A local clone has its submodules checked out in place
        if listed_at.provider == Provider::Local {
            let checkout = Path::new(&listed_at.repo).join(&entry.path);
            return Ok(Some((Provider::Local, checkout.to_string_lossy().to_string())));
        }

        let url = match reported_url {
            Some(url) => Some(url.to_string()),
            None => self.gitmodules_url(listed_at, &entry.path)?,
        };
        let Some(url) = url else {
            return Ok(None);
        };

        if url.starts_with("./") || url.starts_with("../") {
            let repo = path::normalize_within_root(&path::join(&listed_at.repo, &url))
                .map(|repo| repo.trim_end_matches(".git").to_string());
            return Ok(repo.map(|repo| (listed_at.provider, repo)));
        }

        let parsed = parse_repo_url(&url);
        if parsed.is_none() {
            tracing::warn!("Submodule {} points at unsupported remote {}", entry.path, url);
        }
        Ok(parsed)
    }

    /// URL of the submodule at `submodule_path` from the superproject's `.gitmodules`.
    fn gitmodules_url(&mut self, listed_at: &Location, submodule_path: &str) -> Result<Option<String>> {
        let gitmodules = listed_at.with_path(GITMODULES);
        let contents = match self.read_at(&gitmodules) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(parse_gitmodules(&String::from_utf8_lossy(&contents))
            .into_iter()
            .find(|module| module.path == submodule_path)
            .and_then(|module| module.url))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Submodule {
    pub name: String,
    pub path: String,
    pub url: Option<String>,
}

/// Parse the `[submodule "name"]` sections of a `.gitmodules` file.
pub fn parse_gitmodules(contents: &str) -> Vec<Submodule> {
    let mut modules: Vec<Submodule> = Vec::new();

    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix("[submodule").and_then(|h| h.strip_suffix(']')) {
            modules.push(Submodule {
                name: header.trim().trim_matches('"').to_string(),
                ..Default::default()
            });
            continue;
        }
        if line.starts_with('[') {
            // Some other section; stop attributing keys to the last submodule
            modules.push(Submodule::default());
            continue;
        }

        let (Some(module), Some((key, value))) = (modules.last_mut(), line.split_once('=')) else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "path" => module.path = path::normalize(value),
            "url" => module.url = Some(value.to_string()),
            _ => {}
        }
    }

    modules.retain(|m| !m.name.is_empty() && !m.path.is_empty());
    modules
}
