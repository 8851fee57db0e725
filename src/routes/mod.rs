pub mod repository;
pub mod tree;

use std::sync::Arc;

use axum::Router;

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::filter::ExcludedPaths;
use crate::models::Source;
use crate::providers::Providers;
use crate::session::FetchSession;

/// Shared by every handler. Sessions are per request, so nothing here is mutable.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ResolverConfig>,
    source: Arc<Source>,
    excluded: Arc<ExcludedPaths>,
}

impl AppState {
    pub fn new(config: ResolverConfig, source: Source, excluded: ExcludedPaths) -> Self {
        Self {
            config: Arc::new(config),
            source: Arc::new(source),
            excluded: Arc::new(excluded),
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Run `f` against a fresh session on the blocking pool.
    pub async fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FetchSession) -> Result<T> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || {
            let providers = Providers::from_config(&state.config, &state.config.credential_store())?;
            let mut session =
                FetchSession::new((*state.source).clone(), providers).with_filter((*state.excluded).clone());
            f(&mut session)
        })
        .await
        .map_err(|e| ResolverError::Internal(format!("Session task failed: {}", e)))?
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(repository::routes(state.clone()))
        .merge(tree::routes(state))
}
