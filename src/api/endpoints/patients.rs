//! Patient endpoints: public registration plus admin and self-service
//! profile management.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{run_blocking, ApiContext, AuthContext, PageParams};
use crate::models::{Page, PatientSummary, PatientView};
use crate::patients::{
    PatientDeleteReport, PatientUpdate, RegistrationRequest, RegistrationResponse,
};

/// `POST /patients`: public. Returns the registry id, never a token.
pub async fn register(
    State(ctx): State<ApiContext>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegistrationResponse>), ApiError> {
    let Json(request) = payload?;
    let core = ctx.core.clone();
    let response = run_blocking(move || core.patients.register(request)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /patients?page=&page_size=`: admin.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<PatientSummary>>, ApiError> {
    let Query(params) = params?;
    let request = params.validate()?;
    let core = ctx.core.clone();
    let page = run_blocking(move || core.patients.list(&auth.claims, request)).await?;
    Ok(Json(page))
}

/// `GET /patients/:fhir_id`: self or admin.
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(fhir_id): Path<String>,
) -> Result<Json<PatientView>, ApiError> {
    let core = ctx.core.clone();
    let patient = run_blocking(move || core.patients.get(&auth.claims, &fhir_id)).await?;
    Ok(Json(patient))
}

/// `PUT /patients/:fhir_id`: self or admin; only admins may change `is_admin`.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(fhir_id): Path<String>,
    payload: Result<Json<PatientUpdate>, JsonRejection>,
) -> Result<Json<PatientView>, ApiError> {
    let Json(update) = payload?;
    let core = ctx.core.clone();
    let patient =
        run_blocking(move || core.patients.update(&auth.claims, &fhir_id, update)).await?;
    Ok(Json(patient))
}

/// `DELETE /patients/:fhir_id`: admin; removes observations, lab sets,
/// the registry patient and the account.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(fhir_id): Path<String>,
) -> Result<Json<PatientDeleteReport>, ApiError> {
    let core = ctx.core.clone();
    let report = run_blocking(move || core.patients.delete(&auth.claims, &fhir_id)).await?;
    Ok(Json(report))
}
