//! Logical path helpers. Logical paths are slash separated, relative to the
//! repository root, and never carry `.`/`..` segments or leading/trailing slashes.

/// Collapse `.`, `..`, empty segments and surrounding slashes.
///
/// `..` above the root is dropped, matching how hosted APIs clean request paths.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Like `normalize`, but `None` when the path climbs above the root.
pub fn normalize_within_root(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

pub fn join(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, rest),
    }
}

/// Parent directory; the root's parent is `None`.
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(""))
}

pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Remainder of `path` below `prefix`, if `path` is `prefix` itself or lies beneath it.
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

pub fn is_within(path: &str, prefix: &str) -> bool {
    strip_prefix(path, prefix).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_cleans_segments() {
        assert_eq!(normalize("/app//sub/./x.txt/"), "app/sub/x.txt");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("../../x"), "x");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn normalize_within_root_rejects_escapes() {
        assert_eq!(normalize_within_root("some/../other"), Some("other".to_string()));
        assert_eq!(normalize_within_root("../outside"), None);
    }

    #[test]
    fn prefixes_respect_segment_boundaries() {
        assert_eq!(strip_prefix("vendor/sub/file.txt", "vendor"), Some("sub/file.txt"));
        assert_eq!(strip_prefix("vendor", "vendor"), Some(""));
        assert_eq!(strip_prefix("vendored/file.txt", "vendor"), None);
        assert!(is_within("anything", ""));
    }

    #[test]
    fn parent_walks_to_root() {
        assert_eq!(parent("a/b/c"), Some("a/b"));
        assert_eq!(parent("a"), Some(""));
        assert_eq!(parent(""), None);
        assert_eq!(file_name("a/b/c.txt"), "c.txt");
    }
}
