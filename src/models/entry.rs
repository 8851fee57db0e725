//! Directory listing DTOs shared by every provider adapter.
//!
//! - `Entry`: one normalized listing row
//! - `EntryType`: canonical `file|dir|symlink|submodule` vocabulary
//! - `Link`: where a symlink or submodule entry points

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    /// Path within the repository the entry was listed from.
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
    Symlink,
    Submodule,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Link {
    /// Target is relative to the repository root and already normalized.
    Symlink { target: String },
    /// `url` is `None` when the backend does not report it; `.gitmodules` has it then.
    Submodule { url: Option<String>, commit: String },
}

impl Entry {
    pub fn new(name: impl Into<String>, path: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            entry_type,
            size: 0,
            sha: None,
            link: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.link = Some(link);
        self
    }

    /// Symlinks and submodules are the entries that can redirect part of the tree.
    pub fn is_link(&self) -> bool {
        matches!(self.entry_type, EntryType::Symlink | EntryType::Submodule)
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Dir
    }
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::File => "file",
            EntryType::Dir => "dir",
            EntryType::Symlink => "symlink",
            EntryType::Submodule => "submodule",
        }
    }
}
