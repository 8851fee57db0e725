//! Exclusion hook applied to the listings a session hands back to its caller.
//!
//! Which paths to exclude is the caller's policy. Redirection discovery always sees
//! the unfiltered listings.

use crate::models::Entry;
use crate::session::path;

pub trait EntryFilter {
    /// True when `entry` (with its logical path) should be hidden from the caller.
    fn excludes(&self, entry: &Entry) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&Entry) -> bool,
{
    fn excludes(&self, entry: &Entry) -> bool {
        self(entry)
    }
}

/// Hides every entry at or below one of the given logical paths.
#[derive(Debug, Clone, Default)]
pub struct ExcludedPaths {
    prefixes: Vec<String>,
}

impl ExcludedPaths {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| path::normalize(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl EntryFilter for ExcludedPaths {
    fn excludes(&self, entry: &Entry) -> bool {
        self.prefixes.iter().any(|prefix| path::is_within(&entry.path, prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryType;

    #[test]
    fn excludes_paths_below_prefixes() {
        let filter = ExcludedPaths::new(["/docs/", "vendor"]);
        let entry = |p: &str| Entry::new(path::file_name(p), p, EntryType::File);

        assert!(filter.excludes(&entry("docs/index.md")));
        assert!(filter.excludes(&entry("vendor")));
        assert!(!filter.excludes(&entry("vendored.txt")));
        assert!(!filter.excludes(&entry("src/docs.rs")));
    }

    #[test]
    fn closures_are_filters() {
        let filter = |entry: &Entry| entry.name.starts_with('.');
        assert!(filter.excludes(&Entry::new(".env", ".env", EntryType::File)));
        assert!(!ExcludedPaths::new(Vec::<String>::new()).excludes(&Entry::new("a", "a", EntryType::File)));
    }
}
