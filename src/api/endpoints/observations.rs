//! Admin access to registry observations.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{run_blocking, ApiContext, AuthContext};
use crate::auth::require_admin;
use crate::registry::types::ObservationResource;
use crate::registry::{check_resource_id, BulkDeleteReport, DeleteOutcome};

#[derive(Debug, Serialize)]
pub struct ObservationDeleteResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// `GET /observations/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ObservationResource>, ApiError> {
    require_admin(&auth.claims)?;
    check_resource_id(&id)?;
    let core = ctx.core.clone();
    let lookup_id = id.clone();
    let observation = run_blocking(move || core.registry.get_observation(&lookup_id)).await?;
    observation
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Observation {id} not found")))
}

/// `DELETE /observations/:id`: gone-already counts as deleted.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ObservationDeleteResponse>, ApiError> {
    require_admin(&auth.claims)?;
    check_resource_id(&id)?;
    let core = ctx.core.clone();
    let target = id.clone();
    let outcome =
        run_blocking(move || Ok::<_, ApiError>(core.registry.delete_observation(&target))).await?;

    let message = format!("Observation {id} deleted");
    match outcome {
        DeleteOutcome::Deleted => Ok(Json(ObservationDeleteResponse {
            message,
            warning: None,
        })),
        DeleteOutcome::DeletedWithWarning(warning) => Ok(Json(ObservationDeleteResponse {
            message,
            warning: Some(warning),
        })),
        DeleteOutcome::Failed(body) => Err(ApiError::Upstream { status: None, body }),
    }
}

/// `DELETE /observations/patient/:fhir_id`: every observation filed
/// under the patient; per-item failures become warnings.
pub async fn delete_for_patient(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(fhir_id): Path<String>,
) -> Result<Json<BulkDeleteReport>, ApiError> {
    require_admin(&auth.claims)?;
    check_resource_id(&fhir_id)?;
    let core = ctx.core.clone();
    let report =
        run_blocking(move || core.registry.delete_all_observations_for_patient(&fhir_id)).await?;
    Ok(Json(report))
}
