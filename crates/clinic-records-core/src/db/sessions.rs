//! Session and session index database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::patients::get_patient_row;
use super::{
    categorical_from_sql, categorical_to_sql, date_from_sql, date_to_sql, Database, DbError,
    DbResult,
};
use crate::models::{
    now_timestamp, Language, NewSession, Patient, Session, SessionIndexEntry, SessionUpdate,
};

const SESSION_COLUMNS: &str =
    "id, patient_id, session_type, session_date, notes, created_at, updated_at";

const INDEX_COLUMNS: &str = "id, patient_id, patient_name, patient_national_id, session_type, \
     session_date, notes, created_at, updated_at";

impl Database {
    /// Create a session with its index entry and bump the patient's counter.
    pub fn create_session(&mut self, patient_id: &str, new: &NewSession) -> DbResult<Session> {
        let tx = self.conn.transaction()?;
        let patient = get_patient_row(&tx, patient_id)?
            .ok_or_else(|| DbError::NotFound(format!("patient {}", patient_id)))?;
        let session = insert_session_rows(&tx, &patient, new)?;
        tx.commit()?;

        tracing::info!(patient_id = %patient_id, session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Get a session of a patient.
    pub fn get_session(&self, patient_id: &str, id: &str) -> DbResult<Option<Session>> {
        get_session_row(&self.conn, patient_id, id)
    }

    /// Apply `update` to the session and its index entry.
    ///
    /// Patient snapshot fields of the index entry are left untouched. A missing
    /// index entry is recreated from the current patient.
    pub fn update_session(
        &mut self,
        patient_id: &str,
        id: &str,
        update: &SessionUpdate,
    ) -> DbResult<Session> {
        let tx = self.conn.transaction()?;
        let mut session = get_session_row(&tx, patient_id, id)?
            .ok_or_else(|| DbError::NotFound(format!("session {}/{}", patient_id, id)))?;

        update.apply_to(&mut session);
        session.updated_at = now_timestamp();
        let session_type = categorical_to_sql(&session.session_type)?;
        let session_date = date_to_sql(session.session_date);

        tx.execute(
            r#"
            UPDATE sessions SET
                session_type = ?2,
                session_date = ?3,
                notes = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
            params![session.id, session_type, session_date, session.notes, session.updated_at],
        )?;

        let mirrored = tx.execute(
            r#"
            UPDATE session_index SET
                session_type = ?2,
                session_date = ?3,
                notes = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
            params![session.id, session_type, session_date, session.notes, session.updated_at],
        )?;
        if mirrored == 0 {
            let patient = get_patient_row(&tx, patient_id)?
                .ok_or_else(|| DbError::NotFound(format!("patient {}", patient_id)))?;
            insert_index_row(&tx, &SessionIndexEntry::from_session(&session, &patient))?;
            tracing::warn!(session_id = %session.id, "Recreated missing session index entry");
        }

        tx.commit()?;
        Ok(session)
    }

    /// Delete a session and its index entry, decrementing the patient's
    /// counter (floored at zero).
    pub fn delete_session(&mut self, patient_id: &str, id: &str) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM sessions WHERE id = ?1 AND patient_id = ?2",
            params![id, patient_id],
        )?;
        if deleted == 0 {
            return Err(DbError::NotFound(format!("session {}/{}", patient_id, id)));
        }
        tx.execute("DELETE FROM session_index WHERE id = ?", [id])?;

        let previous: u32 = tx.query_row(
            "SELECT session_count FROM patients WHERE id = ?",
            [patient_id],
            |row| row.get(0),
        )?;
        if previous == 0 {
            tracing::warn!(patient_id = %patient_id, "Session count already zero on delete");
        }
        tx.execute(
            "UPDATE patients SET session_count = MAX(session_count - 1, 0) WHERE id = ?",
            [patient_id],
        )?;
        tx.commit()?;

        tracing::info!(patient_id = %patient_id, session_id = %id, "Session deleted");
        Ok(())
    }

    /// Sessions of one patient, latest session date first.
    pub fn list_sessions(&self, patient_id: &str) -> DbResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sessions WHERE patient_id = ? \
             ORDER BY session_date DESC, created_at DESC, rowid DESC",
            SESSION_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], SessionRow::from_row)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.try_into()?);
        }
        Ok(sessions)
    }

    /// All sessions across patients, read from the index only.
    pub fn list_all_sessions(&self) -> DbResult<Vec<SessionIndexEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM session_index ORDER BY session_date DESC, created_at DESC, rowid DESC",
            INDEX_COLUMNS
        ))?;
        let rows = stmt.query_map([], IndexRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Index entries matching `term` over patient name, national ID, notes and
    /// the session type as displayed in `language`.
    pub fn search_all_sessions(
        &self,
        term: &str,
        language: Language,
    ) -> DbResult<Vec<SessionIndexEntry>> {
        let entries = self.list_all_sessions()?;
        let term = term.trim();
        if term.is_empty() {
            return Ok(entries);
        }
        Ok(entries
            .into_iter()
            .filter(|entry| entry.matches_search(term, language))
            .collect())
    }
}

/// Insert a session, its index entry and the counter bump for `patient`.
pub(super) fn insert_session_rows(
    conn: &Connection,
    patient: &Patient,
    new: &NewSession,
) -> DbResult<Session> {
    let now = now_timestamp();
    let session = Session {
        id: uuid::Uuid::new_v4().to_string(),
        patient_id: patient.id.clone(),
        session_type: new.session_type.clone(),
        session_date: new.session_date,
        notes: new.notes.clone(),
        created_at: now.clone(),
        updated_at: now,
    };

    conn.execute(
        &format!(
            "INSERT INTO sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            SESSION_COLUMNS
        ),
        params![
            session.id,
            session.patient_id,
            categorical_to_sql(&session.session_type)?,
            date_to_sql(session.session_date),
            session.notes,
            session.created_at,
            session.updated_at,
        ],
    )?;
    insert_index_row(conn, &SessionIndexEntry::from_session(&session, patient))?;
    conn.execute(
        "UPDATE patients SET session_count = session_count + 1 WHERE id = ?",
        [&patient.id],
    )?;

    Ok(session)
}

fn insert_index_row(conn: &Connection, entry: &SessionIndexEntry) -> DbResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO session_index ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            INDEX_COLUMNS
        ),
        params![
            entry.id,
            entry.patient_id,
            entry.patient_name,
            entry.patient_national_id,
            categorical_to_sql(&entry.session_type)?,
            date_to_sql(entry.session_date),
            entry.notes,
            entry.created_at,
            entry.updated_at,
        ],
    )?;
    Ok(())
}

fn get_session_row(conn: &Connection, patient_id: &str, id: &str) -> DbResult<Option<Session>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM sessions WHERE id = ?1 AND patient_id = ?2",
            SESSION_COLUMNS
        ),
        params![id, patient_id],
        SessionRow::from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Intermediate row struct for database mapping.
struct SessionRow {
    id: String,
    patient_id: String,
    session_type: String,
    session_date: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(SessionRow {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            session_type: row.get(2)?,
            session_date: row.get(3)?,
            notes: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = DbError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            session_date: date_from_sql(&row.session_date)?,
            session_type: categorical_from_sql(row.session_type),
            id: row.id,
            patient_id: row.patient_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

struct IndexRow {
    id: String,
    patient_id: String,
    patient_name: String,
    patient_national_id: String,
    session_type: String,
    session_date: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl IndexRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(IndexRow {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            patient_name: row.get(2)?,
            patient_national_id: row.get(3)?,
            session_type: row.get(4)?,
            session_date: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl TryFrom<IndexRow> for SessionIndexEntry {
    type Error = DbError;

    fn try_from(row: IndexRow) -> Result<Self, Self::Error> {
        Ok(SessionIndexEntry {
            session_date: date_from_sql(&row.session_date)?,
            session_type: categorical_from_sql(row.session_type),
            id: row.id,
            patient_id: row.patient_id,
            patient_name: row.patient_name,
            patient_national_id: row.patient_national_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
