use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;

/// Reference to an Observation stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRef {
    pub id: String,
    pub name: String,
}

/// One uploaded lab report, indexed locally.
///
/// Birth date and gender are a snapshot taken at upload time so that later
/// profile edits do not change how an old report is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabTestSet {
    pub id: Uuid,
    pub patient_fhir_id: String,
    pub test_date: NaiveDate,
    pub patient_birth_date: NaiveDate,
    pub patient_gender: Gender,
    pub observations: Vec<ObservationRef>,
    pub interpretation: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A lab value pulled out of OCR text by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTest {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub reference_range: Option<String>,
}
