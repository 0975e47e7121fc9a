//! Patient accounts: registration, profile reads and edits, admin listing
//! and cascading delete across the registry and the local store.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{
    normalize_email, require_admin, require_self_or_admin, validate_password_strength, AuthError,
    Claims, PasswordHasher,
};
use crate::db::{self, Database, DatabaseError};
use crate::models::enums::Gender;
use crate::models::{Demographics, Page, PageRequest, Patient, PatientSummary, PatientView};
use crate::registry::{BulkDeleteReport, ClinicalRegistry, RegistryError};

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Patient {0} not found")]
    NotFound(String),

    #[error("Admins cannot delete their own account")]
    SelfDeletion,

    #[error("Registry refused to delete Patient {0}")]
    RegistryDeleteRefused(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub gender: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    pub message: String,
    pub fhir_id: String,
}

/// Partial profile edit; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDeleteReport {
    pub message: String,
    pub observations: BulkDeleteReport,
    pub lab_sets_deleted: usize,
}

fn required_name(field: &str, raw: &str) -> Result<String, PatientError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(PatientError::InvalidArgument(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn parse_birth_date(raw: &str) -> Result<NaiveDate, PatientError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        PatientError::InvalidArgument(format!("birth_date must be YYYY-MM-DD, got '{raw}'"))
    })?;
    if date > Utc::now().date_naive() {
        return Err(PatientError::InvalidArgument(
            "birth_date cannot be in the future".into(),
        ));
    }
    Ok(date)
}

fn parse_gender(raw: &str) -> Result<Gender, PatientError> {
    Gender::from_input(raw).map_err(|_| {
        PatientError::InvalidArgument(format!(
            "gender must be one of male, female, other, unknown; got '{raw}'"
        ))
    })
}

/// Duplicate email from the UNIQUE index, surfaced as a conflict.
fn map_unique(e: DatabaseError) -> PatientError {
    match e {
        DatabaseError::ConstraintViolation(_) => {
            PatientError::Conflict("An account with this email already exists".into())
        }
        other => PatientError::Database(other),
    }
}

pub struct PatientService {
    db: Arc<Database>,
    registry: Arc<dyn ClinicalRegistry>,
    hasher: PasswordHasher,
}

impl PatientService {
    pub fn new(
        db: Arc<Database>,
        registry: Arc<dyn ClinicalRegistry>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            db,
            registry,
            hasher,
        }
    }

    fn load(&self, fhir_id: &str) -> Result<Patient, PatientError> {
        self.db
            .with_conn(|conn| db::get_patient_by_fhir_id(conn, fhir_id))?
            .ok_or_else(|| PatientError::NotFound(fhir_id.to_string()))
    }

    /// Create the registry Patient, then the local account. Returns no
    /// session token; clients log in separately.
    pub fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationResponse, PatientError> {
        let demographics = Demographics {
            first_name: required_name("first_name", &request.first_name)?,
            last_name: required_name("last_name", &request.last_name)?,
            birth_date: parse_birth_date(&request.birth_date)?,
            gender: parse_gender(&request.gender)?,
        };
        let email = normalize_email(&request.email)?;
        validate_password_strength(&request.password)?;

        if self.db.with_conn(|conn| db::email_exists(conn, &email))? {
            return Err(PatientError::Conflict(
                "An account with this email already exists".into(),
            ));
        }

        let fhir_id = self.registry.create_patient(&demographics)?;
        let patient = Patient {
            id: Uuid::new_v4(),
            fhir_id: fhir_id.clone(),
            first_name: demographics.first_name,
            last_name: demographics.last_name,
            birth_date: demographics.birth_date,
            gender: demographics.gender,
            email,
            password_hash: self.hasher.hash_password(&request.password),
            is_admin: false,
            reset_token: None,
            reset_token_expires: None,
            created_at: Utc::now(),
        };

        if let Err(e) = self.db.with_conn(|conn| db::insert_patient(conn, &patient)) {
            match self.registry.delete_patient(&fhir_id) {
                Ok(true) => tracing::info!(fhir_id = %fhir_id, "Registry patient rolled back"),
                Ok(false) | Err(_) => {
                    tracing::error!(fhir_id = %fhir_id, "Registry patient rollback failed, record orphaned")
                }
            }
            return Err(map_unique(e));
        }

        tracing::info!(fhir_id = %fhir_id, "Patient registered");
        Ok(RegistrationResponse {
            message: "Patient registered successfully".into(),
            fhir_id,
        })
    }

    pub fn list(
        &self,
        claims: &Claims,
        request: PageRequest,
    ) -> Result<Page<PatientSummary>, PatientError> {
        require_admin(claims)?;
        let (items, total) = self.db.with_conn(|conn| {
            let items = db::list_patients(conn, request.page_size, request.offset())?;
            Ok((items, db::count_patients(conn)?))
        })?;
        Ok(Page::new(items, request, total))
    }

    pub fn get(&self, claims: &Claims, fhir_id: &str) -> Result<PatientView, PatientError> {
        let patient = self.load(fhir_id)?;
        require_self_or_admin(claims, &patient.email)?;
        Ok(patient.view())
    }

    /// Apply a profile edit. Demographic changes reach the registry before
    /// the local record; only admins may touch `is_admin`.
    pub fn update(
        &self,
        claims: &Claims,
        fhir_id: &str,
        update: PatientUpdate,
    ) -> Result<PatientView, PatientError> {
        let mut patient = self.load(fhir_id)?;
        require_self_or_admin(claims, &patient.email)?;
        if update.is_admin.is_some() {
            require_admin(claims)?;
        }

        let before = patient.demographics();
        if let Some(first_name) = &update.first_name {
            patient.first_name = required_name("first_name", first_name)?;
        }
        if let Some(last_name) = &update.last_name {
            patient.last_name = required_name("last_name", last_name)?;
        }
        if let Some(birth_date) = &update.birth_date {
            patient.birth_date = parse_birth_date(birth_date)?;
        }
        if let Some(gender) = &update.gender {
            patient.gender = parse_gender(gender)?;
        }
        if let Some(email) = &update.email {
            let email = normalize_email(email)?;
            if email != patient.email {
                if self.db.with_conn(|conn| db::email_exists(conn, &email))? {
                    return Err(PatientError::Conflict(
                        "An account with this email already exists".into(),
                    ));
                }
                patient.email = email;
            }
        }
        if let Some(password) = &update.password {
            validate_password_strength(password)?;
            patient.password_hash = self.hasher.hash_password(password);
        }
        if let Some(is_admin) = update.is_admin {
            patient.is_admin = is_admin;
        }

        let after = patient.demographics();
        if after != before {
            self.registry.update_patient(&patient.fhir_id, &after)?;
        }
        self.db
            .with_conn(|conn| db::update_patient(conn, &patient))
            .map_err(map_unique)?;

        tracing::info!(fhir_id = %patient.fhir_id, by = %claims.sub, "Patient updated");
        Ok(patient.view())
    }

    /// Cascade: registry observations, local lab sets, registry patient,
    /// local account. Stops before the local account when the registry
    /// keeps the patient.
    pub fn delete(
        &self,
        claims: &Claims,
        fhir_id: &str,
    ) -> Result<PatientDeleteReport, PatientError> {
        require_admin(claims)?;
        let patient = self.load(fhir_id)?;
        if claims.sub.eq_ignore_ascii_case(&patient.email) {
            return Err(PatientError::SelfDeletion);
        }

        let observations = self.registry.delete_all_observations_for_patient(fhir_id)?;
        for warning in &observations.warnings {
            tracing::warn!(fhir_id, warning = %warning, "Observation cleanup warning");
        }
        let lab_sets_deleted = self
            .db
            .with_conn(|conn| db::delete_lab_sets_for_patient(conn, fhir_id))?;

        if !self.registry.delete_patient(fhir_id)? {
            return Err(PatientError::RegistryDeleteRefused(fhir_id.to_string()));
        }
        self.db.with_conn(|conn| db::delete_patient(conn, fhir_id))?;

        tracing::info!(
            fhir_id,
            by = %claims.sub,
            observations = observations.deleted.len(),
            lab_sets_deleted,
            "Patient deleted"
        );
        Ok(PatientDeleteReport {
            message: format!("Patient {fhir_id} deleted"),
            observations,
            lab_sets_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::service::fixtures::{claims_for, seed_patient, test_hasher, TEST_PASSWORD};
    use crate::auth::verify_password;
    use crate::models::enums::Role;
    use crate::models::{LabTestSet, ObservationRef};
    use crate::registry::client::mock::MockRegistry;

    fn service() -> (PatientService, Arc<Database>, Arc<MockRegistry>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = Arc::new(MockRegistry::new());
        let service = PatientService::new(db.clone(), registry.clone(), test_hasher());
        (service, db, registry)
    }

    fn registration(email: &str, gender: &str) -> RegistrationRequest {
        RegistrationRequest {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            birth_date: "1985-12-09".into(),
            gender: gender.into(),
            email: email.into(),
            password: TEST_PASSWORD.into(),
        }
    }

    fn admin() -> Claims {
        claims_for("root@example.com", Role::Admin)
    }

    #[test]
    fn register_creates_registry_and_local_records() {
        let (service, db, registry) = service();
        let response = service
            .register(registration("Grace@Example.com", "FEMALE"))
            .unwrap();

        registry.with_state(|s| {
            let demographics = &s.patients[&response.fhir_id];
            assert_eq!(demographics.gender, Gender::Female);
        });
        let stored = db
            .with_conn(|conn| db::get_patient_by_fhir_id(conn, &response.fhir_id))
            .unwrap()
            .unwrap();
        assert_eq!(stored.email, "grace@example.com");
        assert!(!stored.is_admin);
        assert!(verify_password(TEST_PASSWORD, &stored.password_hash));
    }

    #[test]
    fn invalid_gender_rejected_before_registry_call() {
        let (service, _db, registry) = service();
        let err = service
            .register(registration("grace@example.com", "robot"))
            .unwrap_err();
        assert!(matches!(err, PatientError::InvalidArgument(_)));
        registry.with_state(|s| assert_eq!(s.create_patient_calls, 0));
    }

    #[test]
    fn register_validates_fields() {
        let (service, _db, registry) = service();

        let mut weak = registration("grace@example.com", "female");
        weak.password = "password".into();
        assert!(matches!(
            service.register(weak),
            Err(PatientError::Auth(AuthError::WeakPassword(_)))
        ));

        let mut bad_date = registration("grace@example.com", "female");
        bad_date.birth_date = "09/12/1985".into();
        assert!(matches!(
            service.register(bad_date),
            Err(PatientError::InvalidArgument(_))
        ));

        assert!(matches!(
            service.register(registration("not-an-email", "female")),
            Err(PatientError::Auth(AuthError::InvalidEmail(_)))
        ));
        registry.with_state(|s| assert_eq!(s.create_patient_calls, 0));
    }

    #[test]
    fn duplicate_email_is_conflict() {
        let (service, db, _registry) = service();
        seed_patient(&db, "pat-1", "grace@example.com", false);
        assert!(matches!(
            service.register(registration("GRACE@example.com", "female")),
            Err(PatientError::Conflict(_))
        ));
    }

    #[test]
    fn registry_failure_leaves_no_local_record() {
        let (service, db, registry) = service();
        registry.with_state(|s| s.fail_create_patient = true);
        assert!(matches!(
            service.register(registration("grace@example.com", "female")),
            Err(PatientError::Registry(_))
        ));
        assert!(!db
            .with_conn(|conn| db::email_exists(conn, "grace@example.com"))
            .unwrap());
    }

    #[test]
    fn list_is_admin_only_and_paginated() {
        let (service, db, _registry) = service();
        for i in 0..7 {
            seed_patient(&db, &format!("pat-{i}"), &format!("p{i}@example.com"), false);
        }
        let patient = claims_for("p0@example.com", Role::Patient);
        assert!(matches!(
            service.list(&patient, PageRequest::new(1, 5).unwrap()),
            Err(PatientError::Auth(AuthError::Forbidden))
        ));

        let page = service.list(&admin(), PageRequest::new(2, 5).unwrap()).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn get_is_self_or_admin() {
        let (service, db, _registry) = service();
        seed_patient(&db, "pat-1", "ada@example.com", false);

        let own = claims_for("ada@example.com", Role::Patient);
        assert_eq!(service.get(&own, "pat-1").unwrap().email, "ada@example.com");
        assert!(service.get(&admin(), "pat-1").is_ok());

        let other = claims_for("bob@example.com", Role::Patient);
        assert!(matches!(
            service.get(&other, "pat-1"),
            Err(PatientError::Auth(AuthError::Forbidden))
        ));
        assert!(matches!(
            service.get(&admin(), "pat-404"),
            Err(PatientError::NotFound(_))
        ));
    }

    #[test]
    fn update_pushes_demographics_to_registry() {
        let (service, db, registry) = service();
        let fhir_id = service
            .register(registration("grace@example.com", "female"))
            .unwrap()
            .fhir_id;
        let own = claims_for("grace@example.com", Role::Patient);

        let view = service
            .update(
                &own,
                &fhir_id,
                PatientUpdate {
                    last_name: Some("Murray Hopper".into()),
                    password: Some("N3w!password".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(view.last_name, "Murray Hopper");
        registry.with_state(|s| assert_eq!(s.patients[&fhir_id].last_name, "Murray Hopper"));

        let stored = db
            .with_conn(|conn| db::get_patient_by_fhir_id(conn, &fhir_id))
            .unwrap()
            .unwrap();
        assert!(verify_password("N3w!password", &stored.password_hash));
    }

    #[test]
    fn only_admin_changes_admin_flag() {
        let (service, db, _registry) = service();
        seed_patient(&db, "pat-1", "ada@example.com", false);
        let own = claims_for("ada@example.com", Role::Patient);
        let promote = PatientUpdate {
            is_admin: Some(true),
            ..Default::default()
        };

        assert!(matches!(
            service.update(&own, "pat-1", promote.clone()),
            Err(PatientError::Auth(AuthError::Forbidden))
        ));
        assert!(service.update(&admin(), "pat-1", promote).unwrap().is_admin);
    }

    #[test]
    fn email_change_checks_uniqueness() {
        let (service, db, _registry) = service();
        seed_patient(&db, "pat-1", "ada@example.com", false);
        seed_patient(&db, "pat-2", "bob@example.com", false);
        let own = claims_for("ada@example.com", Role::Patient);
        let err = service
            .update(
                &own,
                "pat-1",
                PatientUpdate {
                    email: Some("Bob@example.com".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, PatientError::Conflict(_)));
    }

    #[test]
    fn delete_cascades_across_stores() {
        let (service, db, registry) = service();
        let fhir_id = service
            .register(registration("grace@example.com", "female"))
            .unwrap()
            .fhir_id;
        let obs = registry.seed_observation("Glucose", 98.0, "mg/dL", &fhir_id);
        let set = LabTestSet {
            id: Uuid::new_v4(),
            patient_fhir_id: fhir_id.clone(),
            test_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            patient_birth_date: NaiveDate::from_ymd_opt(1985, 12, 9).unwrap(),
            patient_gender: Gender::Female,
            observations: vec![ObservationRef {
                id: obs.clone(),
                name: "Glucose".into(),
            }],
            interpretation: None,
            created_at: Utc::now(),
        };
        db.with_conn(|conn| db::insert_lab_set(conn, &set)).unwrap();

        let report = service.delete(&admin(), &fhir_id).unwrap();
        assert_eq!(report.observations.deleted, vec![obs]);
        assert_eq!(report.lab_sets_deleted, 1);
        registry.with_state(|s| assert_eq!(s.deleted_patients, vec![fhir_id.clone()]));
        assert!(matches!(
            service.get(&admin(), &fhir_id),
            Err(PatientError::NotFound(_))
        ));
    }

    #[test]
    fn admin_cannot_delete_self() {
        let (service, db, _registry) = service();
        seed_patient(&db, "pat-root", "root@example.com", true);
        assert!(matches!(
            service.delete(&admin(), "pat-root"),
            Err(PatientError::SelfDeletion)
        ));
    }

    #[test]
    fn refused_registry_delete_keeps_account() {
        let (service, db, registry) = service();
        seed_patient(&db, "pat-1", "ada@example.com", false);
        registry.with_state(|s| s.patient_delete_result = Some(false));
        assert!(matches!(
            service.delete(&admin(), "pat-1"),
            Err(PatientError::RegistryDeleteRefused(_))
        ));
        assert!(service.get(&admin(), "pat-1").is_ok());
    }
}
