//! Authentication endpoints.
//!
//! `POST /auth/login`, `GET /auth/check-email`, `POST /auth/forgot-password`
//! and `POST /auth/reset-password` are public; `PUT /auth/assign-admin` is
//! admin-only.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{run_blocking, ApiContext, AuthContext};
use crate::auth::csrf::set_cookie_header;
use crate::auth::LoginResponse;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginBody {
    pub message: &'static str,
    #[serde(flatten)]
    pub login: LoginResponse,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct EmailCheckResponse {
    pub message: &'static str,
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /auth/login`: issues a session token and sets the anti-forgery
/// cookie that must be echoed on later state-changing calls.
pub async fn login(
    State(ctx): State<ApiContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let core = ctx.core.clone();
    let login = run_blocking(move || core.auth.login(&request.email, &request.password)).await?;

    let cookie = HeaderValue::from_str(&set_cookie_header(&login.csrf_token))
        .map_err(|e| ApiError::Internal(format!("csrf cookie: {e}")))?;
    let mut response = Json(LoginBody {
        message: "Login successful",
        login,
    })
    .into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

/// `GET /auth/check-email?email=`
pub async fn check_email(
    State(ctx): State<ApiContext>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<EmailCheckResponse>, ApiError> {
    let Query(query) = query?;
    let core = ctx.core.clone();
    let exists = run_blocking(move || core.auth.check_email(&query.email)).await?;

    let message = if exists {
        "Patient exists. Please log in."
    } else {
        "Patient not found. You can register now."
    };
    Ok(Json(EmailCheckResponse { message, exists }))
}

/// `POST /auth/forgot-password`: same answer whether or not the account exists.
pub async fn forgot_password(
    State(ctx): State<ApiContext>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let core = ctx.core.clone();
    let message = run_blocking(move || core.auth.forgot_password(&request.email)).await?;
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

/// `POST /auth/reset-password`
pub async fn reset_password(
    State(ctx): State<ApiContext>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let core = ctx.core.clone();
    run_blocking(move || core.auth.reset_password(&request.token, &request.new_password)).await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset successfully".into(),
    }))
}

/// `PUT /auth/assign-admin?email=`
pub async fn assign_admin(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Query(query) = query?;
    let core = ctx.core.clone();
    let email = query.email.trim().to_lowercase();
    let target = email.clone();
    run_blocking(move || core.auth.assign_admin(&auth.claims, &target)).await?;
    Ok(Json(MessageResponse {
        message: format!("{email} is now an admin"),
    }))
}
