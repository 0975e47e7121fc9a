//! Double-submit anti-forgery check for state-changing requests.
//!
//! Mounted on the protected router only; the public routes (login, reset,
//! registration) run before a cookie exists.

use axum::http::header::COOKIE;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::auth::csrf::{cookie_value, is_safe_method, tokens_match, CSRF_COOKIE, CSRF_HEADER};

pub async fn verify_csrf(req: Request<axum::body::Body>, next: Next) -> Response {
    if is_safe_method(req.method().as_str()) {
        return next.run(req).await;
    }

    let header = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let cookie = req
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| cookie_value(raw, CSRF_COOKIE))
        .unwrap_or_default();

    if !tokens_match(header, cookie) {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            "Anti-forgery token missing or mismatched"
        );
        return ApiError::Forbidden("CSRF token missing or invalid".into()).into_response();
    }

    next.run(req).await
}
