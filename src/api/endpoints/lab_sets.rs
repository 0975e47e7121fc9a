//! Lab-set endpoints: multipart upload, listing, interpretation, deletion.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{
    default_page, default_page_size, run_blocking, ApiContext, AuthContext, PageParams,
};
use crate::models::Page;
use crate::pipeline::lab_sets::{
    InterpretationResponse, LabSetDeleteReport, LabSetView, UploadRequest, UploadResponse,
};

#[derive(Debug, Deserialize)]
pub struct LabSetListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub include_observations: bool,
}

fn parse_set_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::InvalidArgument(format!("Invalid lab test set id: {raw}")))
}

/// Pull `patient_fhir_id`, `test_date` and `file` out of the form.
async fn read_upload(mut multipart: Multipart) -> Result<UploadRequest, ApiError> {
    let mut patient_fhir_id = None;
    let mut test_date = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "patient_fhir_id" => patient_fhir_id = Some(field.text().await?),
            "test_date" => test_date = Some(field.text().await?),
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = match field.content_type() {
                    Some(ct) => ct.to_string(),
                    None => mime_guess::from_path(&filename)
                        .first_or_octet_stream()
                        .essence_str()
                        .to_string(),
                };
                let bytes = field.bytes().await?.to_vec();
                file = Some((filename, content_type, bytes));
            }
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    let missing = |name: &str| ApiError::InvalidArgument(format!("Missing form field: {name}"));
    let (filename, content_type, bytes) = file.ok_or_else(|| missing("file"))?;
    Ok(UploadRequest {
        patient_fhir_id: patient_fhir_id.ok_or_else(|| missing("patient_fhir_id"))?,
        test_date: test_date.ok_or_else(|| missing("test_date"))?,
        filename,
        content_type,
        bytes,
    })
}

/// `POST /lab_set`: multipart upload of a PDF or image lab report.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let request = read_upload(multipart).await?;
    tracing::info!(
        patient = %request.patient_fhir_id,
        filename = %request.filename,
        content_type = %request.content_type,
        size = request.bytes.len(),
        "Lab report received"
    );

    let core = ctx.core.clone();
    let response = run_blocking(move || core.lab_sets.upload(&auth.claims, request)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /lab_set/:patient_fhir_id?page=&page_size=&include_observations=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_fhir_id): Path<String>,
    params: Result<Query<LabSetListParams>, QueryRejection>,
) -> Result<Json<Page<LabSetView>>, ApiError> {
    let Query(params) = params?;
    let request = PageParams {
        page: params.page,
        page_size: params.page_size,
    }
    .validate()?;
    let include = params.include_observations;

    let core = ctx.core.clone();
    let page = run_blocking(move || {
        core.lab_sets
            .list_for_patient(&auth.claims, &patient_fhir_id, request, include)
    })
    .await?;
    Ok(Json(page))
}

/// `POST /lab_set/:id/interpret`: regenerates and stores the interpretation.
pub async fn interpret(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<InterpretationResponse>, ApiError> {
    let id = parse_set_id(&id)?;
    let core = ctx.core.clone();
    let response = run_blocking(move || core.lab_sets.interpret(&auth.claims, &id)).await?;
    Ok(Json(response))
}

/// `DELETE /lab_set/:id`: per-observation outcomes; the local record goes
/// regardless.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<LabSetDeleteReport>, ApiError> {
    let id = parse_set_id(&id)?;
    let core = ctx.core.clone();
    let report = run_blocking(move || core.lab_sets.delete(&auth.claims, &id)).await?;
    Ok(Json(report))
}
