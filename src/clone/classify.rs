//! Classification of `git` failures by their stderr.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneFailure {
    /// Network or server hiccup; worth retrying.
    Transient,
    OutOfDisk,
    Authentication,
    BranchNotFound,
    /// A submodule could not be cloned; the superproject checkout is usable.
    Submodule,
    Other,
}

/// Logs a pattern that fails to compile; its category then never matches.
fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .inspect_err(|e| tracing::error!("Invalid git failure pattern: {}", e))
        .ok()
}

static TRANSIENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(concat!(
        r"(?i)",
        r"the remote end hung up unexpectedly",
        r"|early eof",
        r"|unexpected disconnect while reading sideband packet",
        r"|rpc failed",
        r"|index-pack failed",
        r"|fetch-pack: invalid index-pack output",
        r"|protocol error: bad pack header",
        r"|the requested url returned error: (429|5\d\d)",
        r"|http/2 stream \d+ was not closed cleanly",
        r"|gnutls_handshake\(\) failed",
        r"|ssl_read: connection was reset",
        r"|connection reset by peer",
        r"|connection timed out",
        r"|operation timed out",
        r"|failed to connect to",
        r"|could not resolve host",
        r"|temporary failure in name resolution",
        r"|server does not allow request for unadvertised object",
        r"|internal server error",
        r"|service unavailable",
        r"|too many requests",
    ))
});

static OUT_OF_DISK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(r"(?i)no space left on device|disk quota exceeded|out of disk")
});

static AUTHENTICATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(concat!(
        r"(?i)",
        r"authentication failed",
        r"|could not read username",
        r"|terminal prompts disabled",
        r"|repository not found",
        r"|permission denied \(publickey",
        r"|the requested url returned error: 40[134]",
        r"|invalid username or password",
    ))
});

static BRANCH_NOT_FOUND: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(r"(?i)remote branch .+ not found in upstream|couldn't find remote ref")
});

static SUBMODULE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(concat!(
        r"(?i)",
        r"clone of '[^']+' into submodule path '[^']+' failed",
        r"|failed to clone '[^']+'.*submodule",
        r"|fatal: could not get a repository handle for submodule",
        r"|failed to recurse into submodule path",
        r"|unable to fetch in submodule path",
    ))
});

fn matches(pattern: &LazyLock<Option<Regex>>, stderr: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(stderr))
}

/// Classify a failed `git` invocation. Transient signatures take precedence.
pub fn classify(stderr: &str) -> CloneFailure {
    if matches(&TRANSIENT, stderr) {
        CloneFailure::Transient
    } else if matches(&OUT_OF_DISK, stderr) {
        CloneFailure::OutOfDisk
    } else if matches(&SUBMODULE, stderr) {
        CloneFailure::Submodule
    } else if matches(&BRANCH_NOT_FOUND, stderr) {
        CloneFailure::BranchNotFound
    } else if matches(&AUTHENTICATION, stderr) {
        CloneFailure::Authentication
    } else {
        CloneFailure::Other
    }
}

/// Whether a failed invocation also reported a submodule clone failure.
pub fn mentions_submodule(stderr: &str) -> bool {
    matches(&SUBMODULE, stderr)
}
