use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::*;
use crate::filter::ExcludedPaths;
use crate::models::{Link, Provider};
use crate::providers::{Blob, ProviderAdapter};

type Calls = Rc<RefCell<Vec<String>>>;

/// In-memory backend keyed by `(repo, path)`; records every call it receives.
struct FakeBackend {
    provider: Provider,
    listings: HashMap<(String, String), Vec<Entry>>,
    files: HashMap<(String, String), Vec<u8>>,
    calls: Calls,
}

impl FakeBackend {
    fn new(provider: Provider, calls: &Calls) -> Self {
        Self {
            provider,
            listings: HashMap::new(),
            files: HashMap::new(),
            calls: Rc::clone(calls),
        }
    }

    fn dir(mut self, repo: &str, dir: &str, entries: Vec<Entry>) -> Self {
        self.listings.insert((repo.to_string(), dir.to_string()), entries);
        self
    }

    fn file(mut self, repo: &str, path: &str, contents: &[u8]) -> Self {
        self.files.insert((repo.to_string(), path.to_string()), contents.to_vec());
        self
    }
}

impl ProviderAdapter for FakeBackend {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn resolve_commit(&self, _repo: &str, branch: Option<&str>) -> crate::error::Result<String> {
        match branch {
            None | Some("main") => Ok("c1".to_string()),
            Some(other) => Err(ResolverError::BranchNotFound(other.to_string())),
        }
    }

    fn list_directory(&self, location: &Location) -> crate::error::Result<Vec<Entry>> {
        self.calls.borrow_mut().push(format!("list {}", location));
        self.listings
            .get(&(location.repo.clone(), location.path.clone()))
            .cloned()
            .ok_or_else(|| ResolverError::NotFound(location.path.clone()))
    }

    fn fetch_blob(&self, location: &Location) -> crate::error::Result<Blob> {
        self.calls.borrow_mut().push(format!("read {}", location));
        self.files
            .get(&(location.repo.clone(), location.path.clone()))
            .cloned()
            .map(Blob::Content)
            .ok_or_else(|| ResolverError::NotFound(location.path.clone()))
    }
}

fn file(path: &str) -> Entry {
    Entry::new(path::file_name(path), path, EntryType::File)
}

fn dir(path: &str) -> Entry {
    Entry::new(path::file_name(path), path, EntryType::Dir)
}

fn submodule(path: &str, url: Option<&str>, commit: &str) -> Entry {
    Entry::new(path::file_name(path), path, EntryType::Submodule).with_link(Link::Submodule {
        url: url.map(str::to_string),
        commit: commit.to_string(),
    })
}

fn symlink(path: &str, target: &str) -> Entry {
    Entry::new(path::file_name(path), path, EntryType::Symlink).with_link(Link::Symlink {
        target: target.to_string(),
    })
}

/// Repo A has `src/vendor` as a submodule of repo B at `c2`.
fn submodule_backend(calls: &Calls) -> FakeBackend {
    FakeBackend::new(Provider::Github, calls)
        .dir("org/a", "", vec![dir("src"), file("README.md")])
        .dir(
            "org/a",
            "src",
            vec![file("src/main.rs"), submodule("src/vendor", Some("https://github.com/org/b.git"), "c2")],
        )
        .file("org/a", "src/main.rs", b"fn main() {}")
        .dir("org/b", "lib", vec![file("lib/x.txt")])
        .file("org/b", "lib/x.txt", b"hello from b")
}

fn session(backend: FakeBackend) -> FetchSession {
    let source = Source::new(Provider::Github, "org/a");
    FetchSession::new(source, Providers::new().with_adapter(backend))
}

#[test]
fn paths_resolve_to_the_root_without_redirections() {
    let calls = Calls::default();
    let mut session = session(submodule_backend(&calls));

    let location = session.resolve("/src/./main.rs", true).unwrap();
    assert_eq!(location, Location::new(Provider::Github, "org/a", "c1", "src/main.rs"));
    assert_eq!(session.redirections().count(), 0);
}

#[test]
fn reads_through_an_unmapped_submodule() {
    let calls = Calls::default();
    let mut session = session(submodule_backend(&calls));

    let bytes = session.read_file("src/vendor/lib/x.txt", true).unwrap();
    assert_eq!(bytes, b"hello from b");

    let redirections: Vec<&Redirection> = session.redirections().collect();
    assert_eq!(redirections.len(), 1);
    assert_eq!(redirections[0].path_prefix, "src/vendor");
    assert_eq!(redirections[0].repo, "org/b");
    assert_eq!(redirections[0].commit, "c2");
    assert_eq!(
        session.resolve("src/vendor/lib/x.txt", true).unwrap(),
        Location::new(Provider::Github, "org/b", "c2", "lib/x.txt")
    );
}

#[test]
fn listings_inside_submodules_use_logical_paths() {
    let calls = Calls::default();
    let mut session = session(submodule_backend(&calls));

    let entries = session.repo_contents("src/vendor/lib", ContentsOptions::default()).unwrap();
    let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["src/vendor/lib/x.txt"]);
}

#[test]
fn repeated_listings_hit_the_backend_once() {
    let calls = Calls::default();
    let mut session = session(submodule_backend(&calls));

    for _ in 0..3 {
        session.repo_contents("src", ContentsOptions::default()).unwrap();
    }

    let listings = calls.borrow().iter().filter(|c| c.starts_with("list")).count();
    assert_eq!(listings, 1);
    assert_eq!(session.cache_stats().hits, 2);
}

#[test]
fn discovery_gives_up_at_the_root() {
    let calls = Calls::default();
    let mut session = session(submodule_backend(&calls));

    assert!(!session.discover("missing/deep/file.txt").unwrap());
    let err = session.read_file("missing/deep/file.txt", true).unwrap_err();
    assert!(matches!(err, ResolverError::FileNotFound(ref p) if p == "/missing/deep/file.txt"));
    assert_eq!(session.redirections().count(), 0);
    assert!(matches!(session.read_file("/", true), Err(ResolverError::InvalidPath(_))));
}

#[test]
fn missing_directories_are_empty_unless_raising() {
    let calls = Calls::default();
    let mut session = session(submodule_backend(&calls));

    let lenient = ContentsOptions {
        raise_errors: false,
        ..Default::default()
    };
    assert!(session.repo_contents("nope", lenient).unwrap().is_empty());
    assert!(matches!(
        session.repo_contents("nope", ContentsOptions::default()),
        Err(ResolverError::DirectoryNotFound(ref p)) if p == "/nope"
    ));
}

#[test]
fn redirections_are_not_followed_when_disabled() {
    let calls = Calls::default();
    let mut session = session(submodule_backend(&calls));

    let err = session.read_file("src/vendor/lib/x.txt", false).unwrap_err();
    assert!(matches!(err, ResolverError::FileNotFound(_)));
    assert_eq!(session.redirections().count(), 0);
}

#[test]
fn symlinked_directories_list_their_target() {
    let calls = Calls::default();
    let backend = FakeBackend::new(Provider::Github, &calls)
        .dir("org/a", "", vec![dir("shared"), symlink("linked", "shared")])
        .dir("org/a", "shared", vec![file("shared/a.txt")])
        .file("org/a", "shared/a.txt", b"a");
    let mut session = session(backend);

    let entries = session.repo_contents("linked", ContentsOptions::default()).unwrap();
    assert_eq!(entries.iter().map(|e| e.path.as_str()).collect::<Vec<_>>(), vec!["linked/a.txt"]);
    assert_eq!(session.read_file("linked/a.txt", true).unwrap(), b"a");
    assert_eq!(
        session.resolve("linked/a.txt", true).unwrap(),
        Location::new(Provider::Github, "org/a", "c1", "shared/a.txt")
    );
}

#[test]
fn boundary_listings_register_the_link_itself() {
    let calls = Calls::default();
    let backend = FakeBackend::new(Provider::Github, &calls)
        .dir(
            "org/a",
            "deps",
            vec![submodule("deps", Some("git@github.com:org/deps.git"), "c9")],
        )
        .dir("org/deps", "", vec![file("Cargo.toml")]);
    let mut session = session(backend);

    let entries = session.repo_contents("deps", ContentsOptions::default()).unwrap();
    assert_eq!(entries[0].path, "deps/Cargo.toml");
    assert_eq!(session.redirections().next().map(|r| r.repo.as_str()), Some("org/deps"));
}

#[test]
fn submodule_urls_fall_back_to_gitmodules() {
    let calls = Calls::default();
    let backend = FakeBackend::new(Provider::Github, &calls)
        .dir("org/a", "", vec![submodule("vendor", None, "c3"), file(".gitmodules")])
        .file(
            "org/a",
            ".gitmodules",
            b"[submodule \"vendor\"]\n\tpath = vendor\n\turl = ../b.git\n",
        )
        .file("org/b", "x.txt", b"relative");
    let mut session = session(backend);

    assert_eq!(session.read_file("vendor/x.txt", true).unwrap(), b"relative");
    assert_eq!(
        session.resolve("vendor/x.txt", true).unwrap(),
        Location::new(Provider::Github, "org/b", "c3", "x.txt")
    );
}

#[test]
fn unknown_submodule_hosts_stay_unresolved() {
    let calls = Calls::default();
    let backend = FakeBackend::new(Provider::Github, &calls).dir(
        "org/a",
        "",
        vec![submodule("vendor", Some("https://git.example.com/x/y.git"), "c3")],
    );
    let mut session = session(backend);

    assert!(session.read_file("vendor/x.txt", true).is_err());
    assert_eq!(session.redirections().count(), 0);
}

#[test]
fn filters_hide_entries_without_blocking_discovery() {
    let calls = Calls::default();
    let mut session = session(submodule_backend(&calls)).with_filter(ExcludedPaths::new(["src/vendor"]));

    let names: Vec<String> = session
        .repo_contents("src", ContentsOptions::default())
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["main.rs"]);
    assert_eq!(session.read_file("src/vendor/lib/x.txt", true).unwrap(), b"hello from b");
}

#[test]
fn base_directory_scopes_caller_paths() {
    let calls = Calls::default();
    let backend = submodule_backend(&calls);
    let source = Source::new(Provider::Github, "org/a").with_directory("/src/");
    let mut session = FetchSession::new(source, Providers::new().with_adapter(backend));

    assert_eq!(
        session.fetch_file_if_present("main.rs", true).unwrap(),
        Some(b"fn main() {}".to_vec())
    );
    assert_eq!(session.fetch_file_if_present("absent.rs", true).unwrap(), None);
    assert_eq!(session.fetch_file_if_present("vendor", true).unwrap(), None);

    let root = ContentsOptions {
        ignore_base_directory: true,
        ..Default::default()
    };
    assert_eq!(session.repo_contents("", root).unwrap().len(), 2);
}

#[test]
fn commit_resolves_once_and_honours_pins() {
    let calls = Calls::default();
    let mut session = FetchSession::new(
        Source::new(Provider::Github, "org/a").with_branch("feature"),
        Providers::new().with_adapter(submodule_backend(&calls)),
    );
    assert!(matches!(session.commit(), Err(ResolverError::BranchNotFound(_))));

    let mut pinned = FetchSession::new(
        Source::new(Provider::Github, "org/a").with_commit("abc123"),
        Providers::new().with_adapter(submodule_backend(&calls)),
    );
    assert_eq!(pinned.commit().unwrap(), "abc123");
}
