//! Shared types for the HTTP API layer.

use std::sync::Arc;

use serde::Deserialize;

use crate::api::error::ApiError;
use crate::auth::Claims;
use crate::core_state::CoreState;
use crate::models::PageRequest;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Verified caller, injected into request extensions by the auth middleware.
///
/// Also copied onto the response so the audit layer can name the subject.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
}

/// `?page=&page_size=` with the listing defaults.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

pub(crate) fn default_page() -> i64 {
    1
}

pub(crate) fn default_page_size() -> i64 {
    10
}

impl PageParams {
    pub fn validate(self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::new(self.page, self.page_size)?)
    }
}

/// Run a blocking service call on the blocking pool.
///
/// Service calls hold the store mutex and perform blocking HTTP, so they
/// never run on the async workers.
pub async fn run_blocking<T, E, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
        .map_err(Into::into)
}
