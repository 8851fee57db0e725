//! Virtual repository content resolver.
//!
//! Reads directories and files of a hosted git repository (GitHub, GitLab, Bitbucket,
//! Azure DevOps) or a local clone as one logical tree, transparently following
//! symlinks and submodules into whatever repository and commit they point at.

pub mod clone;
pub mod config;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod models;
pub mod providers;
pub mod routes;
pub mod session;

pub use error::{ResolverError, Result};
pub use models::{Entry, EntryType, Location, Provider, Source};
pub use session::{ContentsOptions, FetchSession};
