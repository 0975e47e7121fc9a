use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{map_constraint, DatabaseError};
use crate::models::enums::Gender;
use crate::models::{Patient, PatientSummary};

const PATIENT_COLUMNS: &str = "id, fhir_id, first_name, last_name, birth_date, gender, email,
     password_hash, is_admin, reset_token, reset_token_expires, created_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, fhir_id, first_name, last_name, birth_date, gender, email,
         password_hash, is_admin, reset_token, reset_token_expires, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            patient.id.to_string(),
            patient.fhir_id,
            patient.first_name,
            patient.last_name,
            patient.birth_date.to_string(),
            patient.gender.as_str(),
            patient.email,
            patient.password_hash,
            patient.is_admin,
            patient.reset_token,
            patient.reset_token_expires.map(|t| t.timestamp()),
            patient.created_at.to_rfc3339(),
        ],
    )
    .map_err(map_constraint)?;
    Ok(())
}

pub fn get_patient_by_fhir_id(
    conn: &Connection,
    fhir_id: &str,
) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE fhir_id = ?1");
    let row = conn
        .query_row(&sql, params![fhir_id], patient_row_from_rusqlite)
        .optional()?;
    row.map(patient_from_row).transpose()
}

/// Lookup by login email. Emails are stored lower-cased.
pub fn get_patient_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE email = ?1");
    let row = conn
        .query_row(&sql, params![email.to_lowercase()], patient_row_from_rusqlite)
        .optional()?;
    row.map(patient_from_row).transpose()
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE email = ?1",
        params![email.to_lowercase()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn count_patients(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
    Ok(count)
}

/// Admin listing in registration order, with per-patient lab-set counters.
pub fn list_patients(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<Vec<PatientSummary>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS},
         (SELECT COUNT(*) FROM lab_test_sets l WHERE l.patient_fhir_id = patients.fhir_id),
         (SELECT COUNT(*) FROM lab_test_sets l WHERE l.patient_fhir_id = patients.fhir_id
            AND l.interpretation IS NOT NULL)
         FROM patients ORDER BY created_at ASC, rowid ASC LIMIT ?1 OFFSET ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit, offset], |row| {
        let patient = patient_row_from_rusqlite(row)?;
        let lab_test_count: i64 = row.get(12)?;
        let interpreted_count: i64 = row.get(13)?;
        Ok((patient, lab_test_count, interpreted_count))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (patient, lab_test_count, interpreted_count) = row?;
        summaries.push(PatientSummary {
            patient: patient_from_row(patient)?.view(),
            lab_test_count,
            interpreted_count,
        });
    }
    Ok(summaries)
}

/// Overwrite the editable fields of an existing patient, keyed by `fhir_id`.
pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE patients SET first_name = ?1, last_name = ?2, birth_date = ?3, gender = ?4,
             email = ?5, password_hash = ?6, is_admin = ?7
             WHERE fhir_id = ?8",
            params![
                patient.first_name,
                patient.last_name,
                patient.birth_date.to_string(),
                patient.gender.as_str(),
                patient.email,
                patient.password_hash,
                patient.is_admin,
                patient.fhir_id,
            ],
        )
        .map_err(map_constraint)?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: patient.fhir_id.clone(),
        });
    }
    Ok(())
}

/// Returns false when no account has this email.
pub fn set_admin_flag(conn: &Connection, email: &str, is_admin: bool) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET is_admin = ?1 WHERE email = ?2",
        params![is_admin, email.to_lowercase()],
    )?;
    Ok(changed > 0)
}

/// Store a reset token, replacing any earlier one. Returns false when no
/// account has this email.
pub fn set_reset_token(
    conn: &Connection,
    email: &str,
    token: &str,
    expires: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET reset_token = ?1, reset_token_expires = ?2 WHERE email = ?3",
        params![token, expires.timestamp(), email.to_lowercase()],
    )?;
    Ok(changed > 0)
}

/// Set a new password hash and clear the token in one statement, only if the
/// token matches and has not expired at `now`.
pub fn consume_reset_token(
    conn: &Connection,
    token: &str,
    new_password_hash: &str,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET password_hash = ?1, reset_token = NULL, reset_token_expires = NULL
         WHERE reset_token = ?2 AND reset_token_expires > ?3",
        params![new_password_hash, token, now.timestamp()],
    )?;
    Ok(changed > 0)
}

pub fn delete_patient(conn: &Connection, fhir_id: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM patients WHERE fhir_id = ?1", params![fhir_id])?;
    Ok(changed > 0)
}

// Internal row type for Patient mapping
struct PatientRow {
    id: String,
    fhir_id: String,
    first_name: String,
    last_name: String,
    birth_date: String,
    gender: String,
    email: String,
    password_hash: String,
    is_admin: bool,
    reset_token: Option<String>,
    reset_token_expires: Option<i64>,
    created_at: String,
}

fn patient_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        fhir_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        birth_date: row.get(4)?,
        gender: row.get(5)?,
        email: row.get(6)?,
        password_hash: row.get(7)?,
        is_admin: row.get(8)?,
        reset_token: row.get(9)?,
        reset_token_expires: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        fhir_id: row.fhir_id,
        first_name: row.first_name,
        last_name: row.last_name,
        birth_date: parse_date(&row.birth_date)?,
        gender: Gender::from_str(&row.gender)?,
        email: row.email,
        password_hash: row.password_hash,
        is_admin: row.is_admin,
        reset_token: row.reset_token,
        reset_token_expires: row
            .reset_token_expires
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad date {raw}: {e}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw}: {e}")))
}
