//! Resolver error types and HTTP response mapping.
//!
//! `ResolverError` covers every failure a session can surface. `NotFound` is the
//! internal "path absent" signal adapters raise; the session either recovers from it
//! through redirection discovery or turns it into `FileNotFound`/`DirectoryNotFound`.
//!
//! Error mappings for the HTTP surface:
//! - `NotFound`, `FileNotFound`, `DirectoryNotFound`, `BranchNotFound`, `RepoNotFound` → 404
//! - `AuthenticationFailure` → 401
//! - `UnsupportedProvider`, `InvalidPath` → 400
//! - `OutOfDisk` → 507
//! - everything else → 500

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("Out of disk space: {0}")]
    OutOfDisk(String),

    #[error("Unsupported provider '{0}'")]
    UnsupportedProvider(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Clone failed: {0}")]
    CloneFailed(String),

    #[error("Unexpected response from {provider}: {message}")]
    UnexpectedResponse { provider: String, message: String },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolverError {
    /// True for the recoverable "path absent" signal raised by adapters.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolverError::NotFound(_))
    }

    pub(crate) fn unexpected(provider: impl ToString, message: impl Into<String>) -> Self {
        ResolverError::UnexpectedResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ResolverError {
    fn into_response(self) -> Response {
        let status = match &self {
            ResolverError::NotFound(_)
            | ResolverError::FileNotFound(_)
            | ResolverError::DirectoryNotFound(_)
            | ResolverError::BranchNotFound(_)
            | ResolverError::RepoNotFound(_) => StatusCode::NOT_FOUND,
            ResolverError::AuthenticationFailure(_) => StatusCode::UNAUTHORIZED,
            ResolverError::UnsupportedProvider(_) | ResolverError::InvalidPath(_) => {
                StatusCode::BAD_REQUEST
            }
            ResolverError::OutOfDisk(_) => StatusCode::INSUFFICIENT_STORAGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;
