use git2::{BranchType, ObjectType, Repository, Tree, TreeEntry};
use std::collections::hash_map::Entry as Slot;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{ResolverError, Result};
use crate::models::{Entry, EntryType, Link, Location, Provider};
use crate::providers::{strip_bom, symlink_target, Blob, ProviderAdapter};
use crate::session::path;

const SYMLINK_MODE: i32 = 0o120000;

/// Reads a local clone through git2. `Location::repo` is the checkout directory.
#[derive(Default)]
pub struct LocalAdapter {
    repos: Mutex<HashMap<String, Repository>>,
}

impl LocalAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo<F, T>(&self, checkout: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let mut repos = self.repos.lock().map_err(|_| ResolverError::Internal("Lock poisoned".to_string()))?;
        let repo = match repos.entry(checkout.to_string()) {
            Slot::Occupied(slot) => slot.into_mut(),
            Slot::Vacant(slot) => {
                let repo = Repository::open(checkout).map_err(|_| ResolverError::RepoNotFound(checkout.to_string()))?;
                slot.insert(repo)
            }
        };
        f(repo)
    }

    fn tree_at<'r>(repo: &'r Repository, commit: &str) -> Result<Tree<'r>> {
        let commit = repo
            .revparse_single(commit)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| ResolverError::NotFound(format!("commit {}", commit)))?;
        Ok(commit.tree()?)
    }

    fn is_symlink(entry: &TreeEntry) -> bool {
        entry.kind() == Some(ObjectType::Blob) && entry.filemode() == SYMLINK_MODE
    }

    fn link_target(repo: &Repository, entry: &TreeEntry, entry_path: &str) -> Option<String> {
        let object = entry.to_object(repo).ok()?;
        let blob = object.as_blob()?;
        symlink_target(entry_path, &String::from_utf8_lossy(blob.content()))
    }

    fn to_entry(repo: &Repository, entry: &TreeEntry, base_path: &str) -> Option<Entry> {
        let name = entry.name().unwrap_or("").to_string();
        let entry_path = path::join(base_path, &name);

        let entry_type = match entry.kind() {
            Some(ObjectType::Blob) if Self::is_symlink(entry) => EntryType::Symlink,
            Some(ObjectType::Blob) => EntryType::File,
            Some(ObjectType::Tree) => EntryType::Dir,
            Some(ObjectType::Commit) => EntryType::Submodule,
            _ => return None,
        };

        let size = if entry_type == EntryType::File {
            entry
                .to_object(repo)
                .ok()
                .and_then(|obj| obj.as_blob().map(|b| b.size() as u64))
                .unwrap_or(0)
        } else {
            0
        };

        let link = match entry_type {
            EntryType::Symlink => {
                Self::link_target(repo, entry, &entry_path).map(|target| Link::Symlink { target })
            }
            EntryType::Submodule => Some(Link::Submodule {
                url: None,
                commit: entry.id().to_string(),
            }),
            _ => None,
        };

        let mut listed = Entry::new(name, entry_path, entry_type)
            .with_size(size)
            .with_sha(entry.id().to_string());
        if let Some(link) = link {
            listed = listed.with_link(link);
        }
        Some(listed)
    }
}

impl ProviderAdapter for LocalAdapter {
    fn provider(&self) -> Provider {
        Provider::Local
    }

    fn resolve_commit(&self, checkout: &str, branch: Option<&str>) -> Result<String> {
        self.with_repo(checkout, |repo| {
            let commit = match branch {
                None => repo.head()?.peel_to_commit()?,
                Some(name) => repo
                    .find_branch(name, BranchType::Local)
                    .or_else(|_| repo.find_branch(&format!("origin/{}", name), BranchType::Remote))
                    .and_then(|b| b.get().peel_to_commit())
                    .map_err(|_| ResolverError::BranchNotFound(name.to_string()))?,
            };
            Ok(commit.id().to_string())
        })
    }

    fn list_directory(&self, location: &Location) -> Result<Vec<Entry>> {
        self.with_repo(&location.repo, |repo| {
            let root = Self::tree_at(repo, &location.commit)?;

            let target_tree = if location.path.is_empty() {
                root
            } else {
                let entry = root
                    .get_path(Path::new(&location.path))
                    .map_err(|_| ResolverError::NotFound(location.path.clone()))?;
                if Self::is_symlink(&entry) || entry.kind() == Some(ObjectType::Commit) {
                    let parent = path::parent(&location.path).unwrap_or("");
                    return Ok(Self::to_entry(repo, &entry, parent).into_iter().collect());
                }
                entry
                    .to_object(repo)?
                    .peel_to_tree()
                    .map_err(|_| ResolverError::NotFound(location.path.clone()))?
            };

            Ok(target_tree
                .iter()
                .filter_map(|entry| Self::to_entry(repo, &entry, &location.path))
                .collect())
        })
    }

    fn fetch_blob(&self, location: &Location) -> Result<Blob> {
        self.with_repo(&location.repo, |repo| {
            let root = Self::tree_at(repo, &location.commit)?;
            let entry = root
                .get_path(Path::new(&location.path))
                .map_err(|_| ResolverError::NotFound(location.path.clone()))?;

            if Self::is_symlink(&entry) {
                let target = Self::link_target(repo, &entry, &location.path)
                    .ok_or_else(|| ResolverError::NotFound(location.path.clone()))?;
                return Ok(Blob::Symlink { target });
            }

            let object = entry.to_object(repo)?;
            let blob = object
                .as_blob()
                .ok_or_else(|| ResolverError::NotFound(location.path.clone()))?;
            Ok(Blob::Content(strip_bom(blob.content().to_vec())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Oid, Signature};
    use tempfile::TempDir;

    /// `(path, content, filemode)`; gitlinks use `content` as the commit sha.
    type Item<'a> = (&'a str, &'a str, i32);

    fn build_tree(repo: &Repository, files: &[Item]) -> Oid {
        let mut builder = repo.treebuilder(None).unwrap();
        let mut subdirs: HashMap<&str, Vec<Item>> = HashMap::new();

        for &(file_path, content, mode) in files {
            match file_path.split_once('/') {
                Some((dir, rest)) => subdirs.entry(dir).or_default().push((rest, content, mode)),
                None if mode == 0o160000 => {
                    builder.insert(file_path, Oid::from_str(content).unwrap(), mode).unwrap();
                }
                None => {
                    let blob = repo.blob(content.as_bytes()).unwrap();
                    builder.insert(file_path, blob, mode).unwrap();
                }
            }
        }
        for (dir, children) in subdirs {
            let subtree = build_tree(repo, &children);
            builder.insert(dir, subtree, 0o040000).unwrap();
        }
        builder.write().unwrap()
    }

    fn commit(repo: &Repository, files: &[Item]) -> String {
        let tree = repo.find_tree(build_tree(repo, files)).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parents = match repo.head().ok().and_then(|h| h.peel_to_commit().ok()) {
            Some(parent) => vec![parent],
            None => vec![],
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parent_refs)
            .unwrap()
            .to_string()
    }

    fn fixture() -> (TempDir, String, String) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let base = commit(&repo, &[("README.md", "readme", 0o100644)]);
        let sha = commit(
            &repo,
            &[
                ("README.md", "\u{feff}readme", 0o100644),
                ("shared/config.txt", "key = value", 0o100644),
                ("shared/nested/deep.txt", "deep", 0o100644),
                ("config.txt", "shared/config.txt", 0o120000),
                ("linked", "shared", 0o120000),
                ("vendor", base.as_str(), 0o160000),
            ],
        );
        let checkout = dir.path().to_string_lossy().to_string();
        (dir, checkout, sha)
    }

    #[test]
    fn lists_trees_with_links() {
        let (_dir, checkout, sha) = fixture();
        let adapter = LocalAdapter::new();

        let mut entries = adapter
            .list_directory(&Location::new(Provider::Local, &checkout, &sha, ""))
            .unwrap();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let summary: Vec<(&str, EntryType)> = entries.iter().map(|e| (e.path.as_str(), e.entry_type)).collect();
        assert_eq!(
            summary,
            vec![
                ("README.md", EntryType::File),
                ("config.txt", EntryType::Symlink),
                ("linked", EntryType::Symlink),
                ("shared", EntryType::Dir),
                ("vendor", EntryType::Submodule),
            ]
        );
        assert_eq!(entries[2].link, Some(Link::Symlink { target: "shared".to_string() }));
        assert!(matches!(&entries[4].link, Some(Link::Submodule { url: None, .. })));
    }

    #[test]
    fn link_paths_list_as_boundaries() {
        let (_dir, checkout, sha) = fixture();
        let adapter = LocalAdapter::new();

        let entries = adapter
            .list_directory(&Location::new(Provider::Local, &checkout, &sha, "linked"))
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "linked");
        assert!(entries[0].is_link());

        let missing = adapter.list_directory(&Location::new(Provider::Local, &checkout, &sha, "nope"));
        assert!(missing.unwrap_err().is_not_found());
    }

    #[test]
    fn reads_files_following_symlinks() {
        let (_dir, checkout, sha) = fixture();
        let adapter = LocalAdapter::new();
        let at = |p: &str| Location::new(Provider::Local, &checkout, &sha, p);

        assert_eq!(adapter.read_file(&at("README.md")).unwrap(), b"readme");
        assert_eq!(adapter.read_file(&at("config.txt")).unwrap(), b"key = value");
        assert!(adapter.read_file(&at("shared")).unwrap_err().is_not_found());
    }

    #[test]
    fn resolves_head_and_reports_missing_repos() {
        let (_dir, checkout, sha) = fixture();
        let adapter = LocalAdapter::new();

        assert_eq!(adapter.resolve_commit(&checkout, None).unwrap(), sha);
        assert!(matches!(
            adapter.resolve_commit(&checkout, Some("no-such-branch")),
            Err(ResolverError::BranchNotFound(_))
        ));
        assert!(matches!(
            adapter.resolve_commit("/definitely/not/a/repo", None),
            Err(ResolverError::RepoNotFound(_))
        ));
    }
}
