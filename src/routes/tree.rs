use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Entry, Location};
use crate::routes::AppState;
use crate::session::{path, ContentsOptions, Redirection};

#[derive(Deserialize)]
pub struct ContentsQuery {
    #[serde(default)]
    path: String,
    #[serde(default = "default_true")]
    follow: bool,
    /// Return an empty listing instead of 404 for a missing directory.
    #[serde(default)]
    lenient: bool,
    /// Interpret `path` from the repository root instead of the base directory.
    #[serde(default)]
    from_root: bool,
}

#[derive(Deserialize)]
pub struct FileQuery {
    path: String,
    #[serde(default = "default_true")]
    follow: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct ResolvedPath {
    location: Location,
    redirections: Vec<Redirection>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/contents", get(get_contents))
        .route("/api/v1/file", get(get_file))
        .route("/api/v1/resolve", get(get_resolved))
        .with_state(state)
}

async fn get_contents(State(state): State<AppState>, Query(query): Query<ContentsQuery>) -> Result<Json<Vec<Entry>>> {
    let options = ContentsOptions {
        ignore_base_directory: query.from_root,
        raise_errors: !query.lenient,
        follow_redirections: query.follow,
    };
    let entries = state
        .with_session(move |session| session.repo_contents(&query.path, options))
        .await?;
    Ok(Json(entries))
}

async fn get_file(State(state): State<AppState>, Query(query): Query<FileQuery>) -> Result<impl IntoResponse> {
    let path = query.path.clone();
    let bytes = state
        .with_session(move |session| session.read_file(&query.path, query.follow))
        .await?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes))
}

/// Where a path ends up, reading it first so that any redirection on the way is discovered.
async fn get_resolved(State(state): State<AppState>, Query(query): Query<FileQuery>) -> Result<Json<ResolvedPath>> {
    let resolved = state
        .with_session(move |session| {
            let options = ContentsOptions {
                raise_errors: false,
                follow_redirections: query.follow,
                ..Default::default()
            };
            if session.repo_contents(&query.path, options)?.is_empty() {
                session.fetch_file_if_present(&query.path, query.follow)?;
            }

            let logical = path::join(&session.source().directory, &query.path);
            Ok(ResolvedPath {
                location: session.resolve(&logical, query.follow)?,
                redirections: session.redirections().cloned().collect(),
            })
        })
        .await?;
    Ok(Json(resolved))
}
