//! Lab-set lifecycle: upload (OCR, structuring, registry writes, local
//! index), paginated retrieval, interpretation and deletion.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::extraction::{ExtractionError, TextExtractor};
use super::interpretation::{InterpretationError, Interpreter, ObservationSummary};
use crate::auth::{require_self_or_admin, AuthError, Claims};
use crate::config::{ALLOWED_UPLOAD_TYPES, MAX_UPLOAD_BYTES};
use crate::db::{self, Database, DatabaseError};
use crate::models::{LabTestSet, ObservationRef, Page, PageRequest, Patient};
use crate::registry::{ClinicalRegistry, DeleteOutcome, ObservationLookup, ObservationOutcome};

#[derive(Error, Debug)]
pub enum LabSetError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("File is {size} bytes, limit is {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    NoData(String),

    /// An upload stage failed after validation; details are logged.
    #[error("Lab report processing failed at {stage}: {detail}")]
    Processing { stage: &'static str, detail: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Interpretation(#[from] InterpretationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Multipart upload, already read into memory.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub patient_fhir_id: String,
    pub test_date: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub lab_test_set: LabTestSet,
}

/// A lab set as listed, optionally with its observations resolved.
#[derive(Debug, Clone, Serialize)]
pub struct LabSetView {
    #[serde(flatten)]
    pub set: LabTestSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_details: Option<Vec<ObservationLookup>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterpretationResponse {
    pub lab_test_set_id: Uuid,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDelete {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabSetDeleteReport {
    pub message: String,
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDelete>,
}

/// Content type without parameters, lowercased.
fn base_content_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or_default().trim().to_lowercase()
}

/// File name handed to extraction; the extension follows the validated
/// content type, not whatever the client called the file.
fn extraction_filename(content_type: &str) -> &'static str {
    match content_type {
        "application/pdf" => "upload.pdf",
        "image/png" => "upload.png",
        _ => "upload.jpg",
    }
}

pub(crate) fn parse_test_date(raw: &str) -> Result<NaiveDate, LabSetError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        LabSetError::InvalidArgument(format!("test_date must be YYYY-MM-DD, got '{raw}'"))
    })
}

pub struct LabSetService {
    db: Arc<Database>,
    registry: Arc<dyn ClinicalRegistry>,
    extractor: Arc<TextExtractor>,
    interpreter: Arc<Interpreter>,
}

impl LabSetService {
    pub fn new(
        db: Arc<Database>,
        registry: Arc<dyn ClinicalRegistry>,
        extractor: Arc<TextExtractor>,
        interpreter: Arc<Interpreter>,
    ) -> Self {
        Self {
            db,
            registry,
            extractor,
            interpreter,
        }
    }

    /// Patient record for `fhir_id`, if the caller may act on it.
    fn owned_patient(&self, claims: &Claims, fhir_id: &str) -> Result<Patient, LabSetError> {
        let patient = self
            .db
            .with_conn(|conn| db::get_patient_by_fhir_id(conn, fhir_id))?
            .ok_or_else(|| LabSetError::NotFound(format!("Patient {fhir_id}")))?;
        require_self_or_admin(claims, &patient.email)?;
        Ok(patient)
    }

    /// The set, if the caller owns it or is an admin. Sets whose patient
    /// record is gone are admin-only.
    fn owned_set(&self, claims: &Claims, id: &Uuid) -> Result<LabTestSet, LabSetError> {
        let set = self
            .db
            .with_conn(|conn| db::get_lab_set(conn, id))?
            .ok_or_else(|| LabSetError::NotFound(format!("Lab test set {id}")))?;
        match self.owned_patient(claims, &set.patient_fhir_id) {
            Ok(_) => Ok(set),
            Err(LabSetError::NotFound(_)) => {
                crate::auth::require_admin(claims)?;
                Ok(set)
            }
            Err(e) => Err(e),
        }
    }

    pub fn upload(
        &self,
        claims: &Claims,
        request: UploadRequest,
    ) -> Result<UploadResponse, LabSetError> {
        let content_type = base_content_type(&request.content_type);
        if !ALLOWED_UPLOAD_TYPES.contains(&content_type.as_str()) {
            return Err(LabSetError::UnsupportedFormat(request.content_type));
        }
        if request.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(LabSetError::PayloadTooLarge {
                size: request.bytes.len(),
                max: MAX_UPLOAD_BYTES,
            });
        }
        if request.bytes.is_empty() {
            return Err(LabSetError::InvalidArgument("file is empty".into()));
        }
        let test_date = parse_test_date(&request.test_date)?;
        let patient = self.owned_patient(claims, request.patient_fhir_id.trim())?;

        tracing::info!(
            fhir_id = %patient.fhir_id,
            filename = %request.filename,
            size = request.bytes.len(),
            "Lab report upload started"
        );

        let text = self
            .extractor
            .extract_text(extraction_filename(&content_type), &request.bytes)
            .map_err(|e| match e {
                ExtractionError::UnsupportedFormat(name) => LabSetError::UnsupportedFormat(name),
                other => stage_failure("extraction", other),
            })?;

        let tests = self
            .interpreter
            .extract_structured_results(&text)
            .map_err(|e| stage_failure("structuring", e))?;
        if tests.is_empty() {
            return Err(LabSetError::NoData(
                "No lab results could be read from the document".into(),
            ));
        }

        let outcomes = self
            .registry
            .create_observations(&tests, &patient.fhir_id, test_date);
        let mut created = Vec::with_capacity(outcomes.len());
        let mut first_failure = None;
        for outcome in outcomes {
            match outcome {
                ObservationOutcome::Created { id, name } => created.push(ObservationRef { id, name }),
                ObservationOutcome::Failed { name, status, body } => {
                    tracing::warn!(test = %name, ?status, body = %body, "Observation create failed");
                    first_failure.get_or_insert(format!("{name}: {body}"));
                }
            }
        }
        if let Some(detail) = first_failure {
            self.compensate(&created);
            return Err(stage_failure("registry write", detail));
        }

        let set = LabTestSet {
            id: Uuid::new_v4(),
            patient_fhir_id: patient.fhir_id.clone(),
            test_date,
            patient_birth_date: patient.birth_date,
            patient_gender: patient.gender,
            observations: created,
            interpretation: None,
            created_at: Utc::now(),
        };
        if let Err(e) = self.db.with_conn(|conn| db::insert_lab_set(conn, &set)) {
            self.compensate(&set.observations);
            return Err(stage_failure("local index", e));
        }

        tracing::info!(
            lab_set_id = %set.id,
            observations = set.observations.len(),
            "Lab report stored"
        );
        Ok(UploadResponse {
            message: format!("Stored {} lab results", set.observations.len()),
            lab_test_set: set,
        })
    }

    /// Best-effort removal of observations written by a failed upload.
    fn compensate(&self, created: &[ObservationRef]) {
        for obs in created {
            match self.registry.delete_observation(&obs.id) {
                DeleteOutcome::Failed(body) => tracing::error!(
                    observation_id = %obs.id,
                    body = %body,
                    "Compensating delete failed, observation orphaned"
                ),
                _ => tracing::info!(observation_id = %obs.id, "Compensating delete done"),
            }
        }
    }

    pub fn get(&self, claims: &Claims, id: &Uuid) -> Result<LabTestSet, LabSetError> {
        self.owned_set(claims, id)
    }

    /// Newest test date first, then upload order.
    pub fn list_for_patient(
        &self,
        claims: &Claims,
        patient_fhir_id: &str,
        request: PageRequest,
        include_observations: bool,
    ) -> Result<Page<LabSetView>, LabSetError> {
        self.owned_patient(claims, patient_fhir_id)?;

        let (sets, total) = self.db.with_conn(|conn| {
            let sets = db::list_lab_sets_for_patient(
                conn,
                patient_fhir_id,
                request.page_size,
                request.offset(),
            )?;
            let total = db::count_lab_sets_for_patient(conn, patient_fhir_id)?;
            Ok((sets, total))
        })?;

        let page = Page::new(sets, request, total).map(|set| {
            let observation_details = include_observations.then(|| {
                let ids: Vec<String> = set.observations.iter().map(|o| o.id.clone()).collect();
                self.registry.get_observations(&ids)
            });
            LabSetView {
                set,
                observation_details,
            }
        });
        Ok(page)
    }

    /// Generate and store an interpretation, replacing any previous one.
    pub fn interpret(
        &self,
        claims: &Claims,
        id: &Uuid,
    ) -> Result<InterpretationResponse, LabSetError> {
        let set = self.owned_set(claims, id)?;
        let ids: Vec<String> = set.observations.iter().map(|o| o.id.clone()).collect();

        let summaries: Vec<ObservationSummary> = self
            .registry
            .get_observations(&ids)
            .into_iter()
            .filter_map(|lookup| match lookup {
                ObservationLookup::Found(resource) => ObservationSummary::from_resource(&resource),
                ObservationLookup::Missing { id, error } => {
                    tracing::warn!(observation_id = %id, error = %error, "Observation unavailable");
                    None
                }
            })
            .collect();
        if summaries.is_empty() {
            return Err(LabSetError::NoData(format!(
                "Lab test set {id} has no retrievable observations"
            )));
        }

        let interpretation = self.interpreter.try_interpret_full_set(
            &summaries,
            set.patient_birth_date,
            set.patient_gender,
            set.test_date,
        )?;

        let updated = self
            .db
            .with_conn(|conn| db::update_interpretation(conn, id, &interpretation))?;
        if !updated {
            return Err(LabSetError::NotFound(format!("Lab test set {id}")));
        }
        tracing::info!(lab_set_id = %id, observations = summaries.len(), "Lab set interpreted");

        Ok(InterpretationResponse {
            lab_test_set_id: *id,
            interpretation,
        })
    }

    /// Remove referenced observations best-effort, then the local record
    /// regardless of how many registry deletes failed.
    pub fn delete(&self, claims: &Claims, id: &Uuid) -> Result<LabSetDeleteReport, LabSetError> {
        let set = self.owned_set(claims, id)?;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for obs in &set.observations {
            match self.registry.delete_observation(&obs.id) {
                DeleteOutcome::Failed(error) => failed.push(FailedDelete {
                    id: obs.id.clone(),
                    error,
                }),
                _ => deleted.push(obs.id.clone()),
            }
        }

        self.db.with_conn(|conn| db::delete_lab_set(conn, id))?;
        tracing::info!(
            lab_set_id = %id,
            deleted = deleted.len(),
            failed = failed.len(),
            "Lab set deleted"
        );

        Ok(LabSetDeleteReport {
            message: format!("Lab test set {id} deleted"),
            deleted,
            failed,
        })
    }
}

fn stage_failure(stage: &'static str, detail: impl std::fmt::Display) -> LabSetError {
    tracing::error!(stage, error = %detail, "Lab report upload failed");
    LabSetError::Processing {
        stage,
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::service::fixtures::{claims_for, seed_patient};
    use crate::models::enums::Role;
    use crate::pipeline::extraction::mock::MockOcr;
    use crate::pipeline::extraction::pdfium::MockPdfPageRenderer;
    use crate::pipeline::interpretation::client::mock::MockLlmClient;
    use crate::registry::client::mock::MockRegistry;

    const GLUCOSE_JSON: &str =
        r#"[{"name":"Glucose","value":98,"unit":"mg/dL","reference_range":"70 - 100"}]"#;

    struct Harness {
        service: LabSetService,
        db: Arc<Database>,
        registry: Arc<MockRegistry>,
        llm: Arc<MockLlmClient>,
        ocr: Arc<MockOcr>,
    }

    fn harness(replies: &[&str]) -> Harness {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = Arc::new(MockRegistry::new());
        let llm = Arc::new(MockLlmClient::with_replies(replies));
        let ocr = Arc::new(MockOcr::with_pages(&["GLUCOSE 98 mg/dL 70 - 100"]));
        let extractor = Arc::new(TextExtractor::new(
            ocr.clone(),
            Arc::new(MockPdfPageRenderer::new(1)),
        ));
        let service = LabSetService::new(
            db.clone(),
            registry.clone(),
            extractor,
            Arc::new(Interpreter::new(llm.clone())),
        );
        Harness {
            service,
            db,
            registry,
            llm,
            ocr,
        }
    }

    fn ada() -> Claims {
        claims_for("ada@example.com", Role::Patient)
    }

    fn pdf_upload(size: usize) -> UploadRequest {
        UploadRequest {
            patient_fhir_id: "pat-ada".into(),
            test_date: "2024-03-01".into(),
            filename: "report.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: vec![b'%'; size],
        }
    }

    fn seed_set(db: &Database, fhir_id: &str, date: &str, obs: Vec<ObservationRef>) -> LabTestSet {
        let set = LabTestSet {
            id: Uuid::new_v4(),
            patient_fhir_id: fhir_id.into(),
            test_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            patient_birth_date: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            patient_gender: crate::models::enums::Gender::Female,
            observations: obs,
            interpretation: None,
            created_at: Utc::now(),
        };
        db.with_conn(|conn| db::insert_lab_set(conn, &set)).unwrap();
        set
    }

    #[test]
    fn upload_pdf_end_to_end() {
        let h = harness(&[GLUCOSE_JSON]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);

        let response = h.service.upload(&ada(), pdf_upload(500 * 1024)).unwrap();
        let set = response.lab_test_set;
        assert_eq!(set.observations.len(), 1);
        assert_eq!(set.observations[0].name, "Glucose");
        assert!(set.interpretation.is_none());
        assert_eq!(set.patient_birth_date, NaiveDate::from_ymd_opt(1990, 5, 17).unwrap());

        h.registry.with_state(|s| {
            assert_eq!(s.create_observation_calls, 1);
            let stored = &s.observations[&set.observations[0].id];
            let range = &stored.reference_range[0];
            assert_eq!(range.low.as_ref().unwrap().value, 70.0);
            assert_eq!(range.high.as_ref().unwrap().value, 100.0);
        });
        let stored = h.db.with_conn(|conn| db::get_lab_set(conn, &set.id)).unwrap();
        assert!(stored.is_some());
        assert!(h.llm.calls()[0].prompt.contains("GLUCOSE 98"));
    }

    #[test]
    fn upload_validation_happens_before_external_calls() {
        let h = harness(&[GLUCOSE_JSON]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);

        let mut wrong_type = pdf_upload(10);
        wrong_type.content_type = "text/plain".into();
        assert!(matches!(
            h.service.upload(&ada(), wrong_type),
            Err(LabSetError::UnsupportedFormat(_))
        ));

        assert!(matches!(
            h.service.upload(&ada(), pdf_upload(MAX_UPLOAD_BYTES + 1)),
            Err(LabSetError::PayloadTooLarge { .. })
        ));

        let mut bad_date = pdf_upload(10);
        bad_date.test_date = "01/03/2024".into();
        assert!(matches!(
            h.service.upload(&ada(), bad_date),
            Err(LabSetError::InvalidArgument(_))
        ));

        let mut unknown = pdf_upload(10);
        unknown.patient_fhir_id = "pat-ghost".into();
        assert!(matches!(
            h.service.upload(&ada(), unknown),
            Err(LabSetError::NotFound(_))
        ));

        assert_eq!(h.ocr.call_count(), 0);
        assert!(h.llm.calls().is_empty());
    }

    #[test]
    fn content_type_parameters_ignored() {
        let h = harness(&[GLUCOSE_JSON]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        let mut upload = pdf_upload(10);
        upload.content_type = "image/PNG; name=scan.png".into();
        assert!(h.service.upload(&ada(), upload).is_ok());
    }

    #[test]
    fn upload_for_someone_else_forbidden() {
        let h = harness(&[GLUCOSE_JSON]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        let bob = claims_for("bob@example.com", Role::Patient);
        assert!(matches!(
            h.service.upload(&bob, pdf_upload(10)),
            Err(LabSetError::Auth(AuthError::Forbidden))
        ));
    }

    #[test]
    fn failed_create_rolls_back_earlier_observations() {
        let two_tests = r#"[
            {"name":"Glucose","value":98,"unit":"mg/dL","reference_range":"70 - 100"},
            {"name":"Sodium","value":140,"unit":"mmol/L","reference_range":"135 - 145"}
        ]"#;
        let h = harness(&[two_tests]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        h.registry.with_state(|s| {
            s.fail_create_names.insert("Sodium".into());
        });

        let err = h.service.upload(&ada(), pdf_upload(10)).unwrap_err();
        assert!(matches!(err, LabSetError::Processing { stage: "registry write", .. }));

        h.registry.with_state(|s| {
            assert_eq!(s.create_observation_calls, 2);
            assert_eq!(s.deleted_observations.len(), 1);
            assert!(s.observations.is_empty());
        });
        let count = h
            .db
            .with_conn(|conn| db::count_lab_sets_for_patient(conn, "pat-ada"))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn unreadable_model_output_is_processing_error() {
        let h = harness(&["not json"]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        let err = h.service.upload(&ada(), pdf_upload(10)).unwrap_err();
        assert!(matches!(err, LabSetError::Processing { stage: "structuring", .. }));
        h.registry.with_state(|s| assert_eq!(s.create_observation_calls, 0));
    }

    #[test]
    fn document_without_results_is_no_data() {
        let h = harness(&["[]"]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        assert!(matches!(
            h.service.upload(&ada(), pdf_upload(10)),
            Err(LabSetError::NoData(_))
        ));
    }

    #[test]
    fn list_pages_newest_first() {
        let h = harness(&[]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        for day in 1..=12 {
            seed_set(&h.db, "pat-ada", &format!("2024-01-{day:02}"), vec![]);
        }

        let page = h
            .service
            .list_for_patient(&ada(), "pat-ada", PageRequest::new(2, 5).unwrap(), false)
            .unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 3);
        let dates: Vec<u32> = page
            .items
            .iter()
            .map(|v| chrono::Datelike::day(&v.set.test_date))
            .collect();
        assert_eq!(dates, vec![7, 6, 5, 4, 3]);
        assert!(page.items[0].observation_details.is_none());
    }

    #[test]
    fn list_hydrates_observations_on_request() {
        let h = harness(&[]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        let id = h.registry.seed_observation("Glucose", 98.0, "mg/dL", "pat-ada");
        seed_set(
            &h.db,
            "pat-ada",
            "2024-01-01",
            vec![
                ObservationRef { id, name: "Glucose".into() },
                ObservationRef { id: "gone".into(), name: "Sodium".into() },
            ],
        );

        let page = h
            .service
            .list_for_patient(&ada(), "pat-ada", PageRequest::new(1, 10).unwrap(), true)
            .unwrap();
        let details = page.items[0].observation_details.as_ref().unwrap();
        assert!(matches!(details[0], ObservationLookup::Found(_)));
        assert!(matches!(details[1], ObservationLookup::Missing { .. }));
    }

    #[test]
    fn interpret_twice_overwrites() {
        let h = harness(&["First reading.", "Second reading."]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        let id = h.registry.seed_observation("Glucose", 98.0, "mg/dL", "pat-ada");
        let set = seed_set(
            &h.db,
            "pat-ada",
            "2024-03-01",
            vec![ObservationRef { id, name: "Glucose".into() }],
        );

        h.service.interpret(&ada(), &set.id).unwrap();
        let second = h.service.interpret(&ada(), &set.id).unwrap();
        assert_eq!(second.interpretation, "Second reading.");

        let stored = h.service.get(&ada(), &set.id).unwrap();
        assert_eq!(stored.interpretation.as_deref(), Some("Second reading."));
    }

    #[test]
    fn interpret_without_observations_is_no_data() {
        let h = harness(&["unused"]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        let set = seed_set(
            &h.db,
            "pat-ada",
            "2024-03-01",
            vec![ObservationRef { id: "gone".into(), name: "Glucose".into() }],
        );
        assert!(matches!(
            h.service.interpret(&ada(), &set.id),
            Err(LabSetError::NoData(_))
        ));
        assert!(h.llm.calls().is_empty());
    }

    #[test]
    fn interpret_failure_not_persisted() {
        let h = harness(&[]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        let id = h.registry.seed_observation("Glucose", 98.0, "mg/dL", "pat-ada");
        let set = seed_set(
            &h.db,
            "pat-ada",
            "2024-03-01",
            vec![ObservationRef { id, name: "Glucose".into() }],
        );
        assert!(matches!(
            h.service.interpret(&ada(), &set.id),
            Err(LabSetError::Interpretation(_))
        ));
        assert!(h.service.get(&ada(), &set.id).unwrap().interpretation.is_none());
    }

    #[test]
    fn delete_reports_partial_registry_failure() {
        let h = harness(&[]);
        seed_patient(&h.db, "pat-ada", "ada@example.com", false);
        let ids: Vec<String> = ["Glucose", "Sodium", "Potassium"]
            .iter()
            .map(|name| h.registry.seed_observation(name, 1.0, "u", "pat-ada"))
            .collect();
        h.registry.with_state(|s| {
            s.fail_delete_ids.insert(ids[1].clone());
        });
        let set = seed_set(
            &h.db,
            "pat-ada",
            "2024-03-01",
            ids.iter()
                .map(|id| ObservationRef { id: id.clone(), name: "x".into() })
                .collect(),
        );

        let report = h.service.delete(&ada(), &set.id).unwrap();
        assert_eq!(report.deleted, vec![ids[0].clone(), ids[2].clone()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, ids[1]);
        assert!(matches!(
            h.service.get(&ada(), &set.id),
            Err(LabSetError::NotFound(_))
        ));
    }

    #[test]
    fn orphaned_set_is_admin_only() {
        let h = harness(&[]);
        seed_patient(&h.db, "pat-root", "root@example.com", true);
        let set = seed_set(&h.db, "pat-gone", "2024-03-01", vec![]);

        assert!(matches!(
            h.service.get(&ada(), &set.id),
            Err(LabSetError::Auth(AuthError::Forbidden))
        ));
        let admin = claims_for("root@example.com", Role::Admin);
        assert!(h.service.get(&admin, &set.id).is_ok());
    }
}
