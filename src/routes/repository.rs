use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::Result;
use crate::models::{Provider, Source};
use crate::routes::AppState;

#[derive(Serialize)]
struct RepositoryInfo {
    provider: Provider,
    repo: String,
    directory: String,
    branch: Option<String>,
    commit: String,
}

#[derive(Serialize)]
struct CommitInfo {
    commit: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/repository", get(get_repository_info))
        .route("/api/v1/commit", get(get_commit))
        .with_state(state)
}

async fn get_repository_info(State(state): State<AppState>) -> Result<Json<RepositoryInfo>> {
    let Source {
        provider,
        repo,
        directory,
        branch,
        ..
    } = state.source().clone();
    let commit = state.with_session(|session| session.commit()).await?;

    Ok(Json(RepositoryInfo {
        provider,
        repo,
        directory,
        branch,
        commit,
    }))
}

async fn get_commit(State(state): State<AppState>) -> Result<Json<CommitInfo>> {
    let commit = state.with_session(|session| session.commit()).await?;
    Ok(Json(CommitInfo { commit }))
}
