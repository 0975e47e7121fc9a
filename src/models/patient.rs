use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Gender, Role};

/// Local account record. Clinical demographics are mirrored in the registry
/// under `fhir_id`.
#[derive(Debug, Clone)]
pub struct Patient {
    pub id: Uuid,
    pub fhir_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub reset_token: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn role(&self) -> Role {
        Role::from_admin_flag(self.is_admin)
    }

    pub fn demographics(&self) -> Demographics {
        Demographics {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date: self.birth_date,
            gender: self.gender,
        }
    }

    pub fn view(&self) -> PatientView {
        PatientView {
            fhir_id: self.fhir_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date: self.birth_date,
            gender: self.gender,
            email: self.email.clone(),
            is_admin: self.is_admin,
            created_at: self.created_at,
        }
    }
}

/// Fields sent to the clinical registry's Patient resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
}

/// Patient as returned to API clients (no credentials).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientView {
    pub fhir_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin listing row with lab-set counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    #[serde(flatten)]
    pub patient: PatientView,
    pub lab_test_count: i64,
    pub interpreted_count: i64,
}
