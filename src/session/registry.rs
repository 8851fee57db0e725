//! Registry of discovered redirections, keyed by logical path prefix.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::Provider;
use crate::session::path;

/// A logical path prefix that resolves into another repository, provider or commit.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Redirection {
    pub path_prefix: String,
    pub provider: Provider,
    pub repo: String,
    pub commit: String,
    /// Path inside the target the prefix maps onto (empty for a submodule root).
    pub rewritten_prefix: String,
}

/// Redirections discovered during one session. Entries are only ever added: a
/// repository's link topology cannot change at a fixed commit.
#[derive(Debug, Default)]
pub struct LinkedPathRegistry {
    redirections: BTreeMap<String, Redirection>,
}

impl LinkedPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a redirection. Returns false if its prefix was already known, in which
    /// case the existing entry is kept.
    pub fn register(&mut self, redirection: Redirection) -> bool {
        if self.redirections.contains_key(&redirection.path_prefix) {
            return false;
        }
        tracing::info!(
            "Registered redirection {} -> {}:{}@{}:/{}",
            if redirection.path_prefix.is_empty() { "(root)" } else { &redirection.path_prefix },
            redirection.provider,
            redirection.repo,
            redirection.commit,
            redirection.rewritten_prefix
        );
        self.redirections
            .insert(redirection.path_prefix.clone(), redirection);
        true
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.redirections.contains_key(prefix)
    }

    /// Most specific redirection covering `logical_path`, if any.
    pub fn longest_match(&self, logical_path: &str) -> Option<&Redirection> {
        self.redirections
            .values()
            .filter(|r| path::is_within(logical_path, &r.path_prefix))
            .max_by_key(|r| r.path_prefix.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Redirection> {
        self.redirections.values()
    }

    pub fn len(&self) -> usize {
        self.redirections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redirections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect(prefix: &str, repo: &str) -> Redirection {
        Redirection {
            path_prefix: prefix.to_string(),
            provider: Provider::Github,
            repo: repo.to_string(),
            commit: "c".to_string(),
            rewritten_prefix: String::new(),
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let mut registry = LinkedPathRegistry::new();
        registry.register(redirect("vendor", "org/outer"));
        registry.register(redirect("vendor/sub", "org/inner"));

        let hit = registry.longest_match("vendor/sub/file.txt").map(|r| r.repo.as_str());
        assert_eq!(hit, Some("org/inner"));
        let hit = registry.longest_match("vendor/other.txt").map(|r| r.repo.as_str());
        assert_eq!(hit, Some("org/outer"));
        assert!(registry.longest_match("vendored/file.txt").is_none());
    }

    #[test]
    fn duplicate_prefixes_are_rejected() {
        let mut registry = LinkedPathRegistry::new();
        assert!(registry.register(redirect("vendor", "org/first")));
        assert!(!registry.register(redirect("vendor", "org/second")));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.longest_match("vendor").map(|r| r.repo.as_str()),
            Some("org/first")
        );
    }
}
