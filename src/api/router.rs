//! HTTP API router.
//!
//! Middleware stack (outermost → innermost):
//! Extension → CORS → body limit → audit → auth → anti-forgery → handler.
//! Auth and anti-forgery only wrap the protected routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::MAX_UPLOAD_BYTES;
use crate::core_state::CoreState;

/// Multipart framing and the text fields ride on top of the file itself.
const BODY_LIMIT_BYTES: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>, cors_origins: &[String]) -> Router {
    let ctx = ApiContext::new(core);
    let router = build_router(ctx.clone());

    let router = match cors_layer(cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.layer(axum::Extension(ctx))
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                AUTHORIZATION,
                CONTENT_TYPE,
                HeaderName::from_static("x-csrf-token"),
            ])
            .allow_credentials(true),
    )
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/assign-admin", put(endpoints::auth::assign_admin))
        .route("/patients", get(endpoints::patients::list))
        .route(
            "/patients/:fhir_id",
            get(endpoints::patients::get)
                .put(endpoints::patients::update)
                .delete(endpoints::patients::delete),
        )
        .route("/lab_set", post(endpoints::lab_sets::upload))
        .route(
            "/lab_set/:id",
            get(endpoints::lab_sets::list).delete(endpoints::lab_sets::delete),
        )
        .route("/lab_set/:id/interpret", post(endpoints::lab_sets::interpret))
        .route(
            "/observations/:id",
            get(endpoints::observations::get).delete(endpoints::observations::delete),
        )
        .route(
            "/observations/patient/:fhir_id",
            delete(endpoints::observations::delete_for_patient),
        )
        .with_state(ctx.clone())
        // Innermost first; route_layer keeps unmatched paths out of auth
        .route_layer(axum::middleware::from_fn(middleware::csrf::verify_csrf))
        .route_layer(axum::middleware::from_fn(middleware::auth::require_auth));

    let public = Router::new()
        .route("/", get(endpoints::health::banner))
        .route("/health", get(endpoints::health::check))
        .route("/auth/login", post(endpoints::auth::login))
        .route("/auth/check-email", get(endpoints::auth::check_email))
        .route("/auth/forgot-password", post(endpoints::auth::forgot_password))
        .route("/auth/reset-password", post(endpoints::auth::reset_password))
        .route("/patients", post(endpoints::patients::register))
        .with_state(ctx);

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
}
