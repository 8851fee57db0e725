//! Session content cache for directory listings and file contents.
//!
//! Memoizes adapter results keyed by resolved `(provider, repo, commit, path)`. The commit is
//! fixed for the session, so entries are never invalidated; the cache is dropped with
//! the session. Only successful fetches are stored, so a not-found path is asked for
//! again once a redirection has been discovered.
//!
//! Used by: `FetchSession` for every listing and read, including the ancestor
//! listings the redirection discoverer walks through.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::Result;
use crate::models::{Entry, Location, Provider};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: Provider,
    pub repo: String,
    pub commit: String,
    pub path: String,
}

impl From<&Location> for CacheKey {
    fn from(location: &Location) -> Self {
        Self {
            provider: location.provider,
            repo: location.repo.clone(),
            commit: location.commit.clone(),
            path: location.path.clone(),
        }
    }
}

/// One memo table. `get_or_compute` runs `compute` only on a miss.
#[derive(Debug)]
pub struct Memo<V> {
    entries: HashMap<CacheKey, V>,
    hits: usize,
    misses: usize,
}

impl<V> Default for Memo<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<V: Clone> Memo<V> {
    pub fn get_or_compute<F>(&mut self, key: CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.entries.get(&key) {
            self.hits += 1;
            tracing::debug!("Cache hit: {}@{}:/{}", key.repo, key.commit, key.path);
            return Ok(value.clone());
        }

        self.misses += 1;
        let value = compute()?;
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Listings and file contents, cached separately.
#[derive(Debug, Default)]
pub struct ContentCache {
    pub listings: Memo<Vec<Entry>>,
    pub files: Memo<Vec<u8>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get cache statistics for debugging
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached_listings: self.listings.len(),
            cached_files: self.files.len(),
            hits: self.listings.hits + self.files.hits,
            misses: self.listings.misses + self.files.misses,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub cached_listings: usize,
    pub cached_files: usize,
    pub hits: usize,
    pub misses: usize,
}
