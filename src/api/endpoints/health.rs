//! Service banner and liveness check.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{run_blocking, ApiContext};
use crate::config::{APP_NAME, APP_VERSION};
use crate::db;

#[derive(Serialize)]
pub struct BannerResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /`
pub async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: format!("Welcome to the {APP_NAME} API"),
    })
}

/// `GET /health`: answers once the document store responds.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let store = ctx.core.db.clone();
    run_blocking(move || store.with_conn(db::count_tables)).await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: APP_VERSION,
    }))
}
