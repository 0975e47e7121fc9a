//! Audit logging middleware.
//!
//! Logs every API request with method, path, subject, response status and
//! elapsed time. The subject comes from the `AuthContext` the auth layer
//! copies onto the response.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let subject = response
        .extensions()
        .get::<AuthContext>()
        .map(|a| a.claims.sub.as_str())
        .unwrap_or("-");
    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status >= 500 {
        tracing::warn!(%method, path = %path, subject, status, elapsed_ms, "API request failed");
    } else {
        tracing::info!(%method, path = %path, subject, status, elapsed_ms, "API request");
    }

    response
}
