//! Logical path → fully specified location.

use crate::models::Location;
use crate::session::path;
use crate::session::registry::LinkedPathRegistry;

/// Resolve `logical_path` against `root`, following the most specific registered
/// redirection when `follow_redirections` is set. Pure: no I/O.
pub fn resolve(
    root: &Location,
    registry: &LinkedPathRegistry,
    logical_path: &str,
    follow_redirections: bool,
) -> Location {
    if follow_redirections {
        if let Some(redirection) = registry.longest_match(logical_path) {
            let rest = path::strip_prefix(logical_path, &redirection.path_prefix).unwrap_or("");
            return Location::new(
                redirection.provider,
                redirection.repo.clone(),
                redirection.commit.clone(),
                path::join(&redirection.rewritten_prefix, rest),
            );
        }
    }

    root.with_path(logical_path)
}
