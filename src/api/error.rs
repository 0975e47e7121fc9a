//! API error taxonomy with structured JSON responses.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::db::DatabaseError;
use crate::models::PageError;
use crate::patients::PatientError;
use crate::pipeline::interpretation::InterpretationError;
use crate::pipeline::lab_sets::LabSetError;
use crate::registry::RegistryError;

/// Body of every error response: `{"error": {"code", "message"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("No data: {0}")]
    NoData(String),
    #[error("Upstream error ({status:?}): {body}")]
    Upstream { status: Option<u16>, body: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NoData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ApiError::NoData(_) => "NO_DATA",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                "An internal error occurred".to_string()
            }
            ApiError::Upstream { status, body } => {
                tracing::warn!(?status, body = %body, "Upstream service error");
                match status {
                    Some(status) => format!("Upstream service returned {status}: {body}"),
                    None => format!("Upstream service error: {body}"),
                }
            }
            ApiError::InvalidArgument(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::PayloadTooLarge(m)
            | ApiError::UnsupportedFormat(m)
            | ApiError::NoData(m) => m,
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id} not found"))
            }
            DatabaseError::InvalidEnum { field, value } => {
                ApiError::InvalidArgument(format!("Invalid {field}: {value}"))
            }
            DatabaseError::ConstraintViolation(detail) => ApiError::Conflict(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired => ApiError::Unauthorized(err.to_string()),
            AuthError::Forbidden => ApiError::Forbidden(err.to_string()),
            AuthError::InvalidOrExpired
            | AuthError::WeakPassword(_)
            | AuthError::InvalidEmail(_) => ApiError::InvalidArgument(err.to_string()),
            AuthError::AccountNotFound(_) => ApiError::NotFound(err.to_string()),
            AuthError::Signing(detail) => ApiError::Internal(detail),
            AuthError::Database(e) => e.into(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Upstream { status, body } => ApiError::Upstream {
                status: Some(status),
                body,
            },
            RegistryError::InvalidId(_) => ApiError::InvalidArgument(err.to_string()),
            other => ApiError::Upstream {
                status: None,
                body: other.to_string(),
            },
        }
    }
}

impl From<InterpretationError> for ApiError {
    fn from(err: InterpretationError) -> Self {
        match err {
            InterpretationError::Upstream { status, body } => ApiError::Upstream {
                status: Some(status),
                body,
            },
            other => ApiError::Upstream {
                status: None,
                body: other.to_string(),
            },
        }
    }
}

impl From<PageError> for ApiError {
    fn from(err: PageError) -> Self {
        ApiError::InvalidArgument(err.to_string())
    }
}

impl From<LabSetError> for ApiError {
    fn from(err: LabSetError) -> Self {
        match err {
            LabSetError::InvalidArgument(m) => ApiError::InvalidArgument(m),
            LabSetError::UnsupportedFormat(_) => ApiError::UnsupportedFormat(format!(
                "{err}. Accepted: PDF, PNG, JPEG",
            )),
            LabSetError::PayloadTooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            LabSetError::NotFound(_) => ApiError::NotFound(err.to_string()),
            LabSetError::NoData(m) => ApiError::NoData(m),
            LabSetError::Processing { .. } => ApiError::Internal(err.to_string()),
            LabSetError::Auth(e) => e.into(),
            LabSetError::Interpretation(e) => e.into(),
            LabSetError::Database(e) => e.into(),
        }
    }
}

impl From<PatientError> for ApiError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::InvalidArgument(m) => ApiError::InvalidArgument(m),
            PatientError::Conflict(m) => ApiError::Conflict(m),
            PatientError::NotFound(_) => ApiError::NotFound(err.to_string()),
            PatientError::SelfDeletion => ApiError::Forbidden(err.to_string()),
            PatientError::RegistryDeleteRefused(_) => ApiError::Upstream {
                status: None,
                body: err.to_string(),
            },
            PatientError::Auth(e) => e.into(),
            PatientError::Registry(e) => e.into(),
            PatientError::Database(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidArgument(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidArgument(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::InvalidArgument(err.body_text())
        }
    }
}
