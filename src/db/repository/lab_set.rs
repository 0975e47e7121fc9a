use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::patient::{parse_date, parse_timestamp};
use crate::db::{map_constraint, DatabaseError};
use crate::models::enums::Gender;
use crate::models::{LabTestSet, ObservationRef};

const LAB_SET_COLUMNS: &str = "id, patient_fhir_id, test_date, patient_birth_date, patient_gender,
     observations, interpretation, created_at";

pub fn insert_lab_set(conn: &Connection, set: &LabTestSet) -> Result<(), DatabaseError> {
    let observations = serde_json::to_string(&set.observations)?;
    conn.execute(
        "INSERT INTO lab_test_sets (id, patient_fhir_id, test_date, patient_birth_date,
         patient_gender, observations, interpretation, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            set.id.to_string(),
            set.patient_fhir_id,
            set.test_date.to_string(),
            set.patient_birth_date.to_string(),
            set.patient_gender.as_str(),
            observations,
            set.interpretation,
            set.created_at.to_rfc3339(),
        ],
    )
    .map_err(map_constraint)?;
    Ok(())
}

pub fn get_lab_set(conn: &Connection, id: &Uuid) -> Result<Option<LabTestSet>, DatabaseError> {
    let sql = format!("SELECT {LAB_SET_COLUMNS} FROM lab_test_sets WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], lab_set_row_from_rusqlite)
        .optional()?;
    row.map(lab_set_from_row).transpose()
}

/// Newest test date first; sets sharing a date keep upload order.
pub fn list_lab_sets_for_patient(
    conn: &Connection,
    patient_fhir_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<LabTestSet>, DatabaseError> {
    let sql = format!(
        "SELECT {LAB_SET_COLUMNS} FROM lab_test_sets WHERE patient_fhir_id = ?1
         ORDER BY test_date DESC, created_at ASC, rowid ASC LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![patient_fhir_id, limit, offset],
        lab_set_row_from_rusqlite,
    )?;

    let mut sets = Vec::new();
    for row in rows {
        sets.push(lab_set_from_row(row?)?);
    }
    Ok(sets)
}

pub fn count_lab_sets_for_patient(
    conn: &Connection,
    patient_fhir_id: &str,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM lab_test_sets WHERE patient_fhir_id = ?1",
        params![patient_fhir_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Returns false when the set does not exist.
pub fn update_interpretation(
    conn: &Connection,
    id: &Uuid,
    interpretation: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE lab_test_sets SET interpretation = ?1 WHERE id = ?2",
        params![interpretation, id.to_string()],
    )?;
    Ok(changed > 0)
}

pub fn delete_lab_set(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM lab_test_sets WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(changed > 0)
}

/// Remove every set owned by a patient; returns how many were removed.
pub fn delete_lab_sets_for_patient(
    conn: &Connection,
    patient_fhir_id: &str,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM lab_test_sets WHERE patient_fhir_id = ?1",
        params![patient_fhir_id],
    )?;
    Ok(changed)
}

struct LabSetRow {
    id: String,
    patient_fhir_id: String,
    test_date: String,
    patient_birth_date: String,
    patient_gender: String,
    observations: String,
    interpretation: Option<String>,
    created_at: String,
}

fn lab_set_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<LabSetRow, rusqlite::Error> {
    Ok(LabSetRow {
        id: row.get(0)?,
        patient_fhir_id: row.get(1)?,
        test_date: row.get(2)?,
        patient_birth_date: row.get(3)?,
        patient_gender: row.get(4)?,
        observations: row.get(5)?,
        interpretation: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn lab_set_from_row(row: LabSetRow) -> Result<LabTestSet, DatabaseError> {
    let observations: Vec<ObservationRef> = serde_json::from_str(&row.observations)?;
    Ok(LabTestSet {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        patient_fhir_id: row.patient_fhir_id,
        test_date: parse_date(&row.test_date)?,
        patient_birth_date: parse_date(&row.patient_birth_date)?,
        patient_gender: Gender::from_str(&row.patient_gender)?,
        observations,
        interpretation: row.interpretation,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
