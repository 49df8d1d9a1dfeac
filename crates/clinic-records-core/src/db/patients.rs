//! Patient database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::sessions::insert_session_rows;
use super::{
    categorical_from_sql, categorical_to_sql, date_from_sql, date_to_sql, Database, DbError,
    DbResult,
};
use crate::models::{now_timestamp, NewPatient, NewSession, Patient, PatientUpdate, Session};

const PATIENT_COLUMNS: &str = "id, full_name, national_id, birth_date, gender, diagnosis, \
     insurance, therapy_name, total_sessions_planned, session_count, created_at, updated_at";

impl Database {
    /// Create a patient, optionally with its first session, in one transaction.
    pub fn create_patient(
        &mut self,
        new: &NewPatient,
        first_session: Option<&NewSession>,
    ) -> DbResult<(Patient, Option<Session>)> {
        let now = now_timestamp();
        let mut patient = Patient {
            id: uuid::Uuid::new_v4().to_string(),
            full_name: new.full_name.clone(),
            national_id: new.national_id.clone(),
            birth_date: new.birth_date,
            gender: new.gender,
            diagnosis: new.diagnosis.clone(),
            insurance: new.insurance.clone(),
            therapy_name: new.therapy_name.clone(),
            total_sessions_planned: new.total_sessions_planned,
            session_count: 0,
            created_at: now.clone(),
            updated_at: now,
        };

        let tx = self.conn.transaction()?;
        insert_patient_row(&tx, &patient)?;
        let session = match first_session {
            Some(fields) => {
                let session = insert_session_rows(&tx, &patient, fields)?;
                patient.session_count = 1;
                Some(session)
            }
            None => None,
        };
        tx.commit()?;

        tracing::info!(
            patient_id = %patient.id,
            with_session = session.is_some(),
            "Patient created"
        );
        Ok((patient, session))
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        get_patient_row(&self.conn, id)
    }

    /// Merge `update` into the stored patient.
    ///
    /// A changed name or national ID is propagated to every index entry of the
    /// patient's sessions in the same transaction.
    pub fn update_patient(&mut self, id: &str, update: &PatientUpdate) -> DbResult<Patient> {
        let tx = self.conn.transaction()?;
        let mut patient = get_patient_row(&tx, id)?
            .ok_or_else(|| DbError::NotFound(format!("patient {}", id)))?;

        let snapshot_changed = update.apply_to(&mut patient);
        patient.updated_at = now_timestamp();

        tx.execute(
            r#"
            UPDATE patients SET
                full_name = ?2,
                national_id = ?3,
                birth_date = ?4,
                gender = ?5,
                diagnosis = ?6,
                insurance = ?7,
                therapy_name = ?8,
                total_sessions_planned = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.full_name,
                patient.national_id,
                date_to_sql(patient.birth_date),
                patient.gender.as_str(),
                patient.diagnosis.as_ref().map(categorical_to_sql).transpose()?,
                patient.insurance.as_ref().map(categorical_to_sql).transpose()?,
                patient.therapy_name,
                patient.total_sessions_planned,
                patient.updated_at,
            ],
        )?;

        if snapshot_changed {
            let entries = tx.execute(
                r#"
                UPDATE session_index SET
                    patient_name = ?2,
                    patient_national_id = ?3
                WHERE patient_id = ?1
                "#,
                params![patient.id, patient.full_name, patient.national_id],
            )?;
            tracing::info!(patient_id = %patient.id, entries, "Patient snapshot propagated");
        }

        tx.commit()?;
        Ok(patient)
    }

    /// Delete a patient with all its sessions and index entries.
    ///
    /// Returns the number of sessions removed.
    pub fn delete_patient(&mut self, id: &str) -> DbResult<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM session_index WHERE patient_id = ?", [id])?;
        let sessions = tx.execute("DELETE FROM sessions WHERE patient_id = ?", [id])?;
        let deleted = tx.execute("DELETE FROM patients WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(DbError::NotFound(format!("patient {}", id)));
        }
        tx.commit()?;

        tracing::info!(patient_id = %id, sessions, "Patient deleted");
        Ok(sessions)
    }

    /// List patients, newest first.
    ///
    /// `search` is a case-insensitive substring filter over name and national
    /// ID, applied before `limit`.
    pub fn list_patients(&self, search: Option<&str>, limit: usize) -> DbResult<Vec<Patient>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients ORDER BY created_at DESC, rowid DESC",
            PATIENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], PatientRow::from_row)?;

        let term = search.map(str::trim).filter(|t| !t.is_empty());
        let mut patients = Vec::new();
        for row in rows {
            let patient: Patient = row?.try_into()?;
            if term.map_or(true, |t| patient.matches_search(t)) {
                patients.push(patient);
                if patients.len() == limit {
                    break;
                }
            }
        }
        Ok(patients)
    }
}

pub(super) fn get_patient_row(conn: &Connection, id: &str) -> DbResult<Option<Patient>> {
    conn.query_row(
        &format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS),
        [id],
        PatientRow::from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

fn insert_patient_row(conn: &Connection, patient: &Patient) -> DbResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO patients ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            PATIENT_COLUMNS
        ),
        params![
            patient.id,
            patient.full_name,
            patient.national_id,
            date_to_sql(patient.birth_date),
            patient.gender.as_str(),
            patient.diagnosis.as_ref().map(categorical_to_sql).transpose()?,
            patient.insurance.as_ref().map(categorical_to_sql).transpose()?,
            patient.therapy_name,
            patient.total_sessions_planned,
            patient.session_count,
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(())
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: String,
    full_name: String,
    national_id: String,
    birth_date: String,
    gender: String,
    diagnosis: Option<String>,
    insurance: Option<String>,
    therapy_name: String,
    total_sessions_planned: u32,
    session_count: u32,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(PatientRow {
            id: row.get(0)?,
            full_name: row.get(1)?,
            national_id: row.get(2)?,
            birth_date: row.get(3)?,
            gender: row.get(4)?,
            diagnosis: row.get(5)?,
            insurance: row.get(6)?,
            therapy_name: row.get(7)?,
            total_sessions_planned: row.get(8)?,
            session_count: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            birth_date: date_from_sql(&row.birth_date)?,
            gender: row.gender.parse().map_err(DbError::InvalidData)?,
            diagnosis: row.diagnosis.map(categorical_from_sql),
            insurance: row.insurance.map(categorical_from_sql),
            id: row.id,
            full_name: row.full_name,
            national_id: row.national_id,
            therapy_name: row.therapy_name,
            total_sessions_planned: row.total_sessions_planned,
            session_count: row.session_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BilingualValue, CategoricalValue, Gender};
    use chrono::NaiveDate;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn new_patient(name: &str, national_id: &str) -> NewPatient {
        NewPatient {
            full_name: name.into(),
            national_id: national_id.into(),
            birth_date: NaiveDate::from_ymd_opt(2018, 6, 1).unwrap(),
            gender: Gender::Female,
            diagnosis: Some(BilingualValue::new("ASD", "طيف التوحد").into()),
            insurance: Some(BilingualValue::new("Clalit", "كلاليت").into()),
            therapy_name: "Speech".into(),
            total_sessions_planned: 10,
        }
    }

    fn first_session() -> NewSession {
        NewSession {
            session_type: BilingualValue::new("Assessment", "التقييم").into(),
            session_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            notes: None,
        }
    }

    #[test]
    fn test_create_and_get() {
        let mut db = setup_db();
        let (patient, session) = db
            .create_patient(&new_patient("Lina Haddad", "000000018"), None)
            .unwrap();
        assert!(session.is_none());
        assert_eq!(patient.session_count, 0);

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved, patient);
        assert!(db.get_patient("missing").unwrap().is_none());
    }

    #[test]
    fn test_create_with_first_session() {
        let mut db = setup_db();
        let (patient, session) = db
            .create_patient(&new_patient("Lina Haddad", "000000018"), Some(&first_session()))
            .unwrap();
        let session = session.unwrap();
        assert_eq!(patient.session_count, 1);
        assert_eq!(session.patient_id, patient.id);

        let stored = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(stored.session_count, 1);
        let index = db.list_all_sessions().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].patient_name, "Lina Haddad");
    }

    #[test]
    fn test_update_propagates_snapshot() {
        let mut db = setup_db();
        let (patient, _) = db
            .create_patient(&new_patient("Lina Haddad", "000000018"), Some(&first_session()))
            .unwrap();

        let update = PatientUpdate {
            full_name: Some("Lina H. Haddad".into()),
            ..Default::default()
        };
        let updated = db.update_patient(&patient.id, &update).unwrap();
        assert_eq!(updated.full_name, "Lina H. Haddad");
        assert!(updated.updated_at >= patient.updated_at);

        let index = db.list_all_sessions().unwrap();
        assert_eq!(index[0].patient_name, "Lina H. Haddad");
        assert_eq!(index[0].patient_national_id, "000000018");
    }

    #[test]
    fn test_update_clears_insurance() {
        let mut db = setup_db();
        let (patient, _) = db
            .create_patient(&new_patient("Lina Haddad", "000000018"), None)
            .unwrap();
        let update = PatientUpdate {
            insurance: Some(None),
            ..Default::default()
        };
        db.update_patient(&patient.id, &update).unwrap();
        assert!(db.get_patient(&patient.id).unwrap().unwrap().insurance.is_none());
    }

    #[test]
    fn test_update_missing_patient() {
        let mut db = setup_db();
        let result = db.update_patient("missing", &PatientUpdate::default());
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_delete_cascades() {
        let mut db = setup_db();
        let (patient, _) = db
            .create_patient(&new_patient("Lina Haddad", "000000018"), Some(&first_session()))
            .unwrap();
        db.create_session(&patient.id, &first_session()).unwrap();

        assert_eq!(db.delete_patient(&patient.id).unwrap(), 2);
        assert!(db.get_patient(&patient.id).unwrap().is_none());
        assert!(db.list_all_sessions().unwrap().is_empty());
        assert!(db.list_sessions(&patient.id).unwrap().is_empty());

        assert!(matches!(
            db.delete_patient(&patient.id),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_newest_first_with_search_before_limit() {
        let mut db = setup_db();
        db.create_patient(&new_patient("Omar Saleh", "000000026"), None)
            .unwrap();
        db.create_patient(&new_patient("Lina Haddad", "000000018"), None)
            .unwrap();
        db.create_patient(&new_patient("Layla Omari", "000000034"), None)
            .unwrap();

        let all = db.list_patients(None, 10).unwrap();
        let names: Vec<_> = all.iter().map(|p| p.full_name.as_str()).collect();
        assert_eq!(names, vec!["Layla Omari", "Lina Haddad", "Omar Saleh"]);

        let found = db.list_patients(Some("OMAR"), 10).unwrap();
        assert_eq!(found.len(), 2);

        let limited = db.list_patients(Some("omar"), 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].full_name, "Layla Omari");

        let by_id = db.list_patients(Some("0026"), 10).unwrap();
        assert_eq!(by_id[0].full_name, "Omar Saleh");
    }

    #[test]
    fn test_legacy_text_columns_decode() {
        let mut db = setup_db();
        let (patient, _) = db
            .create_patient(&new_patient("Lina Haddad", "000000018"), None)
            .unwrap();
        db.conn()
            .execute(
                "UPDATE patients SET insurance = 'Maccabi' WHERE id = ?",
                [&patient.id],
            )
            .unwrap();

        let stored = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(
            stored.insurance,
            Some(CategoricalValue::Legacy("Maccabi".into()))
        );
    }
}
