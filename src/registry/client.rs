use chrono::NaiveDate;
use serde::Serialize;

use super::range::parse_reference_range;
use super::types::*;
use super::RegistryError;
use crate::models::{Demographics, ExtractedTest};

/// Result of creating one observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ObservationOutcome {
    Created { id: String, name: String },
    Failed { name: String, status: Option<u16>, body: String },
}

/// One entry of a batch lookup, in the position of the requested id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObservationLookup {
    Found(Box<ObservationResource>),
    Missing { id: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// Deleted upstream, but the server reported a search-index failure.
    DeletedWithWarning(String),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkDeleteReport {
    pub message: String,
    pub deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Remote clinical registry (FHIR R4) holding Patient and Observation
/// resources.
pub trait ClinicalRegistry: Send + Sync {
    /// Create a Patient and return the server-assigned id.
    fn create_patient(&self, demographics: &Demographics) -> Result<String, RegistryError>;

    fn update_patient(
        &self,
        fhir_id: &str,
        demographics: &Demographics,
    ) -> Result<(), RegistryError>;

    /// True when the patient is gone (including already-deleted and
    /// index-defect responses).
    fn delete_patient(&self, fhir_id: &str) -> Result<bool, RegistryError>;

    /// Create one laboratory Observation and return its id.
    fn create_observation(
        &self,
        test: &ExtractedTest,
        patient_fhir_id: &str,
        date: NaiveDate,
    ) -> Result<String, RegistryError>;

    fn get_observation(&self, id: &str) -> Result<Option<ObservationResource>, RegistryError>;

    fn delete_observation(&self, id: &str) -> DeleteOutcome;

    /// Ids of every Observation whose subject is `Patient/<fhir_id>`.
    fn search_observation_ids(&self, patient_fhir_id: &str) -> Result<Vec<String>, RegistryError>;

    /// One create per test, no batching. Each outcome is independent.
    fn create_observations(
        &self,
        tests: &[ExtractedTest],
        patient_fhir_id: &str,
        date: NaiveDate,
    ) -> Vec<ObservationOutcome> {
        tests
            .iter()
            .map(|test| match self.create_observation(test, patient_fhir_id, date) {
                Ok(id) => ObservationOutcome::Created {
                    id,
                    name: test.name.clone(),
                },
                Err(RegistryError::Upstream { status, body }) => ObservationOutcome::Failed {
                    name: test.name.clone(),
                    status: Some(status),
                    body,
                },
                Err(e) => ObservationOutcome::Failed {
                    name: test.name.clone(),
                    status: None,
                    body: e.to_string(),
                },
            })
            .collect()
    }

    /// Missing or unreachable ids yield a placeholder in their position.
    fn get_observations(&self, ids: &[String]) -> Vec<ObservationLookup> {
        ids.iter()
            .map(|id| match self.get_observation(id) {
                Ok(Some(obs)) => ObservationLookup::Found(Box::new(obs)),
                Ok(None) => ObservationLookup::Missing {
                    id: id.clone(),
                    error: format!("Observation {id} not found in registry"),
                },
                Err(e) => ObservationLookup::Missing {
                    id: id.clone(),
                    error: e.to_string(),
                },
            })
            .collect()
    }

    fn delete_all_observations_for_patient(
        &self,
        patient_fhir_id: &str,
    ) -> Result<BulkDeleteReport, RegistryError> {
        let ids = self.search_observation_ids(patient_fhir_id)?;
        if ids.is_empty() {
            return Ok(BulkDeleteReport {
                message: format!("No Observations found for Patient {patient_fhir_id}."),
                ..Default::default()
            });
        }

        let mut report = BulkDeleteReport::default();
        for id in ids {
            match self.delete_observation(&id) {
                DeleteOutcome::Deleted => report.deleted.push(id),
                DeleteOutcome::DeletedWithWarning(_) => {
                    report
                        .warnings
                        .push(format!("Observation {id} deleted, but registry indexing failed."));
                    report.deleted.push(id);
                }
                DeleteOutcome::Failed(body) => report
                    .warnings
                    .push(format!("Failed to delete Observation {id}. Response: {body}")),
            }
        }
        report.message = format!(
            "Deleted {} observations for Patient {patient_fhir_id}.",
            report.deleted.len()
        );
        Ok(report)
    }
}

/// FHIR logical ids: 1-64 of `[A-Za-z0-9-.]`. Anything else never names a
/// registry resource and must not be spliced into a request path.
pub fn check_resource_id(id: &str) -> Result<&str, RegistryError> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.');
    if valid {
        Ok(id)
    } else {
        Err(RegistryError::InvalidId(id.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════
// Upstream status classification
// ═══════════════════════════════════════════════════════════

/// HAPI's search index occasionally fails after the resource itself was
/// removed; the delete has still happened.
pub(crate) fn is_indexing_defect(body: &str) -> bool {
    body.contains("HSEARCH700124") || body.contains("Indexing failure")
}

/// Patient deletes: 204/410 gone, 200 with a SUCCESSFUL_DELETE outcome
/// (including SUCCESSFUL_DELETE_ALREADY_DELETED), or 500 index defect.
pub(crate) fn classify_patient_delete(status: u16, body: &str) -> DeleteOutcome {
    match status {
        204 | 410 => DeleteOutcome::Deleted,
        200 if body.contains("SUCCESSFUL_DELETE") => DeleteOutcome::Deleted,
        500 if is_indexing_defect(body) => {
            DeleteOutcome::DeletedWithWarning("registry indexing failed".into())
        }
        _ => DeleteOutcome::Failed(format!("{status}: {body}")),
    }
}

/// Observation deletes: any of 200/204/410, or an index defect in any body.
pub(crate) fn classify_observation_delete(status: u16, body: &str) -> DeleteOutcome {
    match status {
        200 | 204 | 410 => DeleteOutcome::Deleted,
        _ if is_indexing_defect(body) => {
            DeleteOutcome::DeletedWithWarning("registry indexing failed".into())
        }
        _ => DeleteOutcome::Failed(body.to_string()),
    }
}

pub(crate) fn patient_resource(demographics: &Demographics, id: Option<&str>) -> PatientResource {
    PatientResource {
        resource_type: "Patient".into(),
        id: id.map(str::to_string),
        name: vec![HumanName {
            name_use: Some("official".into()),
            family: Some(demographics.last_name.clone()),
            given: vec![demographics.first_name.clone()],
        }],
        birth_date: Some(demographics.birth_date.to_string()),
        gender: Some(demographics.gender.as_str().to_string()),
    }
}

pub(crate) fn observation_resource(
    test: &ExtractedTest,
    patient_fhir_id: &str,
    date: NaiveDate,
) -> ObservationResource {
    let reference_range = test
        .reference_range
        .as_deref()
        .and_then(|r| parse_reference_range(r, &test.unit))
        .into_iter()
        .collect();

    ObservationResource {
        resource_type: "Observation".into(),
        id: None,
        status: "final".into(),
        category: vec![CodeableConcept {
            coding: vec![Coding {
                system: Some(OBSERVATION_CATEGORY_SYSTEM.into()),
                code: Some("laboratory".into()),
                display: None,
            }],
            text: None,
        }],
        code: CodeableConcept {
            coding: vec![],
            text: Some(test.name.clone()),
        },
        subject: Some(Reference {
            reference: format!("Patient/{patient_fhir_id}"),
        }),
        effective_date_time: Some(date.to_string()),
        value_quantity: Some(Quantity {
            value: test.value,
            unit: Some(test.unit.clone()),
        }),
        reference_range,
    }
}

// ═══════════════════════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════════════════════

/// Blocking FHIR R4 REST client.
pub struct FhirClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl FhirClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, RegistryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RegistryError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    fn resource_url(&self, kind: &str, id: &str) -> Result<String, RegistryError> {
        Ok(format!("{}/{kind}/{}", self.base_url, check_resource_id(id)?))
    }

    fn map_send_error(&self, e: reqwest::Error) -> RegistryError {
        if e.is_connect() {
            RegistryError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            RegistryError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            RegistryError::HttpClient(e.to_string())
        }
    }

    fn post_resource<T: Serialize>(&self, path: &str, resource: &T) -> Result<String, RegistryError> {
        let url = format!("{}/{path}", self.base_url);
        let body =
            serde_json::to_vec(resource).map_err(|e| RegistryError::ResponseParsing(e.to_string()))?;

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, FHIR_JSON)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .body(body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(RegistryError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        let created: CreatedResource = serde_json::from_str(&text)
            .map_err(|e| RegistryError::ResponseParsing(e.to_string()))?;
        Ok(created.id)
    }

    /// Send a DELETE and return status plus body text.
    fn send_delete(&self, url: &str) -> Result<(u16, String), RegistryError> {
        let response = self
            .client
            .delete(url)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .send()
            .map_err(|e| self.map_send_error(e))?;
        let status = response.status().as_u16();
        Ok((status, response.text().unwrap_or_default()))
    }

    fn fetch_bundle(&self, url: &str) -> Result<Bundle, RegistryError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RegistryError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .map_err(|e| RegistryError::ResponseParsing(e.to_string()))
    }
}

impl ClinicalRegistry for FhirClient {
    fn create_patient(&self, demographics: &Demographics) -> Result<String, RegistryError> {
        let id = self.post_resource("Patient", &patient_resource(demographics, None))?;
        tracing::info!(fhir_id = %id, "Registry patient created");
        Ok(id)
    }

    fn update_patient(
        &self,
        fhir_id: &str,
        demographics: &Demographics,
    ) -> Result<(), RegistryError> {
        let url = self.resource_url("Patient", fhir_id)?;
        let body = serde_json::to_vec(&patient_resource(demographics, Some(fhir_id)))
            .map_err(|e| RegistryError::ResponseParsing(e.to_string()))?;

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, FHIR_JSON)
            .body(body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RegistryError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        tracing::info!(fhir_id, "Registry patient updated");
        Ok(())
    }

    fn delete_patient(&self, fhir_id: &str) -> Result<bool, RegistryError> {
        let url = self.resource_url("Patient", fhir_id)?;
        let (status, body) = self.send_delete(&format!("{url}?_cascade=delete"))?;

        let outcome = if status == 409 {
            tracing::info!(fhir_id, "Cascade delete refused, retrying without cascade");
            let (status, body) = self.send_delete(&url)?;
            classify_patient_delete(status, &body)
        } else {
            classify_patient_delete(status, &body)
        };

        match outcome {
            DeleteOutcome::Deleted => Ok(true),
            DeleteOutcome::DeletedWithWarning(warning) => {
                tracing::warn!(fhir_id, warning, "Registry patient deleted with warning");
                Ok(true)
            }
            DeleteOutcome::Failed(detail) => {
                tracing::warn!(fhir_id, detail, "Registry patient delete failed");
                Ok(false)
            }
        }
    }

    fn create_observation(
        &self,
        test: &ExtractedTest,
        patient_fhir_id: &str,
        date: NaiveDate,
    ) -> Result<String, RegistryError> {
        self.post_resource(
            "Observation",
            &observation_resource(test, patient_fhir_id, date),
        )
    }

    fn get_observation(&self, id: &str) -> Result<Option<ObservationResource>, RegistryError> {
        let url = self.resource_url("Observation", id)?;
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RegistryError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .map(Some)
            .map_err(|e| RegistryError::ResponseParsing(e.to_string()))
    }

    fn delete_observation(&self, id: &str) -> DeleteOutcome {
        let url = match self.resource_url("Observation", id) {
            Ok(url) => url,
            Err(e) => return DeleteOutcome::Failed(e.to_string()),
        };
        match self.send_delete(&url) {
            Ok((status, body)) => {
                let outcome = classify_observation_delete(status, &body);
                if let DeleteOutcome::DeletedWithWarning(warning) = &outcome {
                    tracing::warn!(observation_id = id, warning, "Observation deleted with warning");
                }
                outcome
            }
            Err(e) => DeleteOutcome::Failed(e.to_string()),
        }
    }

    fn search_observation_ids(&self, patient_fhir_id: &str) -> Result<Vec<String>, RegistryError> {
        let mut url = Some(format!(
            "{}/Observation?subject=Patient/{}",
            self.base_url,
            check_resource_id(patient_fhir_id)?
        ));
        let mut ids = Vec::new();

        while let Some(current) = url.take() {
            let bundle = self.fetch_bundle(&current)?;
            ids.extend(bundle.entry.iter().filter_map(|entry| {
                entry
                    .resource
                    .as_ref()
                    .and_then(|r| r.get("id"))
                    .and_then(|id| id.as_str())
                    .map(str::to_string)
            }));
            url = bundle.next_link().map(str::to_string);
        }
        Ok(ids)
    }
}
