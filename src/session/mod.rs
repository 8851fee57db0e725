//! Fetch sessions: one root repository at one commit, read through redirections.
//!
//! A session owns the redirection registry and the content cache; both live exactly as
//! long as it does. Every request goes through the same loop:
//!
//! 1. resolve the logical path to a `Location` (following registered redirections)
//! 2. ask the provider adapter (through the cache)
//! 3. on not-found, walk the ancestors looking for an unmapped symlink or submodule
//! 4. retry once per newly registered redirection, otherwise surface the error

pub mod cache;
pub mod discover;
pub mod path;
pub mod registry;
pub mod resolver;

use crate::error::{ResolverError, Result};
use crate::filter::EntryFilter;
use crate::models::{Entry, EntryType, Location, Source};
use crate::providers::Providers;

pub use cache::{CacheKey, CacheStats, ContentCache};
pub use registry::{LinkedPathRegistry, Redirection};

/// Options for `FetchSession::repo_contents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentsOptions {
    /// Treat the directory as relative to the repository root, not the base directory.
    pub ignore_base_directory: bool,
    /// Surface a missing directory as an error instead of an empty listing.
    pub raise_errors: bool,
    pub follow_redirections: bool,
}

impl Default for ContentsOptions {
    fn default() -> Self {
        Self {
            ignore_base_directory: false,
            raise_errors: true,
            follow_redirections: true,
        }
    }
}

pub struct FetchSession {
    source: Source,
    providers: Providers,
    registry: LinkedPathRegistry,
    cache: ContentCache,
    filter: Option<Box<dyn EntryFilter>>,
    commit: Option<String>,
}

impl FetchSession {
    pub fn new(source: Source, providers: Providers) -> Self {
        let commit = source.commit.clone();
        Self {
            source,
            providers,
            registry: LinkedPathRegistry::new(),
            cache: ContentCache::new(),
            filter: None,
            commit,
        }
    }

    pub fn with_filter(mut self, filter: impl EntryFilter + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Root commit: the pinned one, or the branch head resolved on first use.
    pub fn commit(&mut self) -> Result<String> {
        if let Some(commit) = &self.commit {
            return Ok(commit.clone());
        }

        let adapter = self.providers.get(self.source.provider)?;
        let commit = adapter.resolve_commit(&self.source.repo, self.source.branch.as_deref())?;
        tracing::info!(
            "Resolved {}:{} {} to {}",
            self.source.provider,
            self.source.repo,
            self.source.branch.as_deref().unwrap_or("(default branch)"),
            commit
        );
        self.commit = Some(commit.clone());
        Ok(commit)
    }

    /// Location of a logical path (relative to the repository root).
    pub fn resolve(&mut self, logical_path: &str, follow_redirections: bool) -> Result<Location> {
        let root = self.root()?;
        let logical_path = path::normalize(logical_path);
        Ok(resolver::resolve(&root, &self.registry, &logical_path, follow_redirections))
    }

    pub fn redirections(&self) -> impl Iterator<Item = &Redirection> {
        self.registry.iter()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// List a directory relative to the base directory.
    pub fn repo_contents(&mut self, dir: &str, options: ContentsOptions) -> Result<Vec<Entry>> {
        let logical = self.logical_path(dir, options.ignore_base_directory);

        let entries = match self.list_logical(&logical, options.follow_redirections) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() && !options.raise_errors => {
                tracing::debug!("No directory at /{}, returning an empty listing", logical);
                return Ok(Vec::new());
            }
            Err(e) if e.is_not_found() => return Err(ResolverError::DirectoryNotFound(format!("/{}", logical))),
            Err(e) => return Err(e),
        };

        Ok(match &self.filter {
            Some(filter) => entries.into_iter().filter(|e| !filter.excludes(e)).collect(),
            None => entries,
        })
    }

    /// Read a file relative to the base directory.
    pub fn read_file(&mut self, filename: &str, follow_redirections: bool) -> Result<Vec<u8>> {
        let logical = self.logical_path(filename, false);
        if logical.is_empty() {
            return Err(ResolverError::InvalidPath("The repository root is not a file".to_string()));
        }
        self.read_logical(&logical, follow_redirections).map_err(|e| {
            if e.is_not_found() {
                ResolverError::FileNotFound(format!("/{}", logical))
            } else {
                e
            }
        })
    }

    /// Read a file only if its directory lists it as a file or symlink; `None` otherwise.
    pub fn fetch_file_if_present(&mut self, filename: &str, follow_redirections: bool) -> Result<Option<Vec<u8>>> {
        let logical = self.logical_path(filename, false);
        let dir = path::parent(&logical).unwrap_or("");
        let name = path::file_name(&logical);

        let options = ContentsOptions {
            ignore_base_directory: true,
            raise_errors: false,
            follow_redirections,
        };
        let listed = self
            .repo_contents(dir, options)?
            .iter()
            .any(|entry| entry.name == name && matches!(entry.entry_type, EntryType::File | EntryType::Symlink));
        if !listed {
            return Ok(None);
        }

        self.read_file(filename, follow_redirections).map(Some)
    }

    fn root(&mut self) -> Result<Location> {
        let commit = self.commit()?;
        Ok(Location::new(self.source.provider, self.source.repo.clone(), commit, ""))
    }

    fn logical_path(&self, path: &str, ignore_base_directory: bool) -> String {
        if ignore_base_directory {
            path::normalize(path)
        } else {
            path::normalize(&path::join(&self.source.directory, path))
        }
    }

    /// Listing of a logical directory, with entry paths in logical coordinates.
    fn list_logical(&mut self, logical: &str, follow: bool) -> Result<Vec<Entry>> {
        loop {
            let location = self.resolve(logical, follow)?;
            match self.list_at(&location) {
                Ok(entries) => match boundary(&entries, &location) {
                    Some(link) => {
                        // The directory itself is a symlink or submodule
                        if follow && self.register_link(logical, &location, link)? {
                            continue;
                        }
                        return Err(ResolverError::NotFound(logical.to_string()));
                    }
                    None => {
                        return Ok(entries
                            .into_iter()
                            .map(|mut entry| {
                                entry.path = path::join(logical, &entry.name);
                                entry
                            })
                            .collect());
                    }
                },
                Err(e) if e.is_not_found() && follow => {
                    if self.discover(logical)? {
                        tracing::debug!("Retrying listing of /{} after discovery", logical);
                        continue;
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn read_logical(&mut self, logical: &str, follow: bool) -> Result<Vec<u8>> {
        loop {
            let location = self.resolve(logical, follow)?;
            match self.read_at(&location) {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_not_found() && follow => {
                    if self.discover(logical)? {
                        tracing::debug!("Retrying read of /{} after discovery", logical);
                        continue;
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cached adapter listing of a resolved location.
    fn list_at(&mut self, location: &Location) -> Result<Vec<Entry>> {
        let providers = &self.providers;
        self.cache
            .listings
            .get_or_compute(CacheKey::from(location), || {
                providers.get(location.provider)?.list_directory(location)
            })
    }

    /// Cached adapter read of a resolved location.
    fn read_at(&mut self, location: &Location) -> Result<Vec<u8>> {
        let providers = &self.providers;
        self.cache
            .files
            .get_or_compute(CacheKey::from(location), || providers.get(location.provider)?.read_file(location))
    }
}

/// The single link entry an adapter returns when the listed path is itself a link.
fn boundary<'a>(entries: &'a [Entry], location: &Location) -> Option<&'a Entry> {
    match entries {
        [entry] if entry.is_link() && entry.path == location.path && !location.path.is_empty() => Some(entry),
        _ => None,
    }
}

#[cfg(test)]
mod tests;
