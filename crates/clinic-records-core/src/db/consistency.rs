//! Consistency check and repair for the session index and counters.

use rusqlite::Connection;
use serde::Serialize;

use super::{Database, DbResult};

/// Kind of drift between primary records and derived data.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// Index entry without a live session
    OrphanedIndexEntry,
    /// Session without an index entry
    MissingIndexEntry,
    /// Index entry's patient name or national ID differs from the patient
    SnapshotDrift,
    /// Index entry's session fields differ from the session
    FieldDrift,
    /// Patient's cached session count differs from its live sessions
    SessionCountDrift,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A single consistency issue detected by the checker.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyIssue {
    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
    pub patient_id: Option<String>,
    pub session_id: Option<String>,
}

/// Result of a consistency check.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    pub issues: Vec<ConsistencyIssue>,
    pub patients_checked: i64,
    pub sessions_checked: i64,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, category: IssueCategory) -> usize {
        self.issues.iter().filter(|i| i.category == category).count()
    }
}

const FIELD_DRIFT: &str = "si.patient_id != s.patient_id \
     OR si.session_type != s.session_type \
     OR si.session_date != s.session_date \
     OR si.notes IS NOT s.notes \
     OR si.created_at != s.created_at \
     OR si.updated_at != s.updated_at";

/// Run a full consistency check.
///
/// Detects:
/// - Index entries whose session no longer exists
/// - Sessions with no index entry
/// - Stale patient snapshots in index entries
/// - Index entries whose session fields disagree with the session
/// - Session counters that differ from the number of live sessions
pub fn check_consistency(conn: &Connection) -> DbResult<ConsistencyReport> {
    let mut issues = Vec::new();

    // 1. Orphaned index entries
    let mut stmt = conn.prepare(
        "SELECT si.id, si.patient_id FROM session_index si
         WHERE NOT EXISTS (SELECT 1 FROM sessions s WHERE s.id = si.id)",
    )?;
    let orphaned: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    drop(stmt);
    for (session_id, patient_id) in orphaned {
        issues.push(ConsistencyIssue {
            category: IssueCategory::OrphanedIndexEntry,
            severity: Severity::Medium,
            description: "Index entry has no session".into(),
            patient_id: Some(patient_id),
            session_id: Some(session_id),
        });
    }

    // 2. Sessions missing from the index
    let mut stmt = conn.prepare(
        "SELECT s.id, s.patient_id FROM sessions s
         WHERE NOT EXISTS (SELECT 1 FROM session_index si WHERE si.id = s.id)",
    )?;
    let missing: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    drop(stmt);
    for (session_id, patient_id) in missing {
        issues.push(ConsistencyIssue {
            category: IssueCategory::MissingIndexEntry,
            severity: Severity::High,
            description: "Session is missing from the index".into(),
            patient_id: Some(patient_id),
            session_id: Some(session_id),
        });
    }

    // 3. Stale patient snapshots
    let mut stmt = conn.prepare(
        "SELECT si.id, si.patient_id, si.patient_name, p.full_name FROM session_index si
         JOIN patients p ON p.id = si.patient_id
         WHERE si.patient_name != p.full_name OR si.patient_national_id != p.national_id",
    )?;
    let stale: Vec<(String, String, String, String)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<Result<_, _>>()?;
    drop(stmt);
    for (session_id, patient_id, indexed, current) in stale {
        issues.push(ConsistencyIssue {
            category: IssueCategory::SnapshotDrift,
            severity: Severity::Medium,
            description: format!("Index snapshot '{indexed}' is stale (patient is '{current}')"),
            patient_id: Some(patient_id),
            session_id: Some(session_id),
        });
    }

    // 4. Session field drift
    let mut stmt = conn.prepare(&format!(
        "SELECT s.id, s.patient_id FROM session_index si
         JOIN sessions s ON s.id = si.id
         WHERE {FIELD_DRIFT}"
    ))?;
    let drifted: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    drop(stmt);
    for (session_id, patient_id) in drifted {
        issues.push(ConsistencyIssue {
            category: IssueCategory::FieldDrift,
            severity: Severity::Medium,
            description: "Index entry fields differ from the session".into(),
            patient_id: Some(patient_id),
            session_id: Some(session_id),
        });
    }

    // 5. Session count drift
    let mut stmt = conn.prepare(
        "SELECT p.id, p.session_count,
                (SELECT COUNT(*) FROM sessions s WHERE s.patient_id = p.id) AS actual
         FROM patients p
         WHERE p.session_count != actual",
    )?;
    let counts: Vec<(String, i64, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<_, _>>()?;
    drop(stmt);
    for (patient_id, stored, actual) in counts {
        issues.push(ConsistencyIssue {
            category: IssueCategory::SessionCountDrift,
            severity: Severity::High,
            description: format!("Session count drifted: stored={stored}, actual={actual}"),
            patient_id: Some(patient_id),
            session_id: None,
        });
    }

    let patients_checked: i64 =
        conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
    let sessions_checked: i64 =
        conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;

    Ok(ConsistencyReport {
        issues,
        patients_checked,
        sessions_checked,
    })
}

/// Rebuild the index and counters from the primary sessions.
///
/// Returns the number of rows repaired.
pub fn repair_consistency(conn: &Connection) -> DbResult<usize> {
    let mut repaired = 0;

    let orphaned = conn.execute(
        "DELETE FROM session_index
         WHERE NOT EXISTS (SELECT 1 FROM sessions s WHERE s.id = session_index.id)",
        [],
    )?;
    if orphaned > 0 {
        tracing::info!(count = orphaned, "Removed orphaned index entries");
        repaired += orphaned;
    }

    let drifted = conn.execute(
        &format!(
            "UPDATE session_index SET
                patient_id = s.patient_id,
                session_type = s.session_type,
                session_date = s.session_date,
                notes = s.notes,
                created_at = s.created_at,
                updated_at = s.updated_at
             FROM sessions s
             WHERE s.id = session_index.id AND ({})",
            FIELD_DRIFT.replace("si.", "session_index.")
        ),
        [],
    )?;
    if drifted > 0 {
        tracing::info!(count = drifted, "Repaired index field drift");
        repaired += drifted;
    }

    let stale = conn.execute(
        "UPDATE session_index SET
            patient_name = p.full_name,
            patient_national_id = p.national_id
         FROM patients p
         WHERE p.id = session_index.patient_id
           AND (session_index.patient_name != p.full_name
                OR session_index.patient_national_id != p.national_id)",
        [],
    )?;
    if stale > 0 {
        tracing::info!(count = stale, "Refreshed stale patient snapshots");
        repaired += stale;
    }

    let missing = conn.execute(
        "INSERT INTO session_index (
            id, patient_id, patient_name, patient_national_id, session_type,
            session_date, notes, created_at, updated_at
         )
         SELECT s.id, s.patient_id, p.full_name, p.national_id, s.session_type,
                s.session_date, s.notes, s.created_at, s.updated_at
         FROM sessions s
         JOIN patients p ON p.id = s.patient_id
         WHERE NOT EXISTS (SELECT 1 FROM session_index si WHERE si.id = s.id)",
        [],
    )?;
    if missing > 0 {
        tracing::info!(count = missing, "Rebuilt missing index entries");
        repaired += missing;
    }

    let counts = conn.execute(
        "UPDATE patients SET session_count =
            (SELECT COUNT(*) FROM sessions s WHERE s.patient_id = patients.id)
         WHERE session_count != (SELECT COUNT(*) FROM sessions s WHERE s.patient_id = patients.id)",
        [],
    )?;
    if counts > 0 {
        tracing::info!(count = counts, "Recalculated session counts");
        repaired += counts;
    }

    Ok(repaired)
}

impl Database {
    pub fn check_consistency(&self) -> DbResult<ConsistencyReport> {
        check_consistency(&self.conn)
    }

    /// Run [`repair_consistency`] in one transaction.
    pub fn repair_consistency(&mut self) -> DbResult<usize> {
        let tx = self.conn.transaction()?;
        let repaired = repair_consistency(&tx)?;
        tx.commit()?;
        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BilingualValue, Gender, NewPatient, NewSession, Patient};
    use chrono::NaiveDate;

    fn setup_db() -> (Database, Patient) {
        let mut db = Database::open_in_memory().unwrap();
        let (patient, _) = db
            .create_patient(
                &NewPatient {
                    full_name: "Sara Nassar".into(),
                    national_id: "000000034".into(),
                    birth_date: NaiveDate::from_ymd_opt(2016, 11, 30).unwrap(),
                    gender: Gender::Female,
                    diagnosis: None,
                    insurance: None,
                    therapy_name: "OT".into(),
                    total_sessions_planned: 6,
                },
                Some(&NewSession {
                    session_type: BilingualValue::new("CBT", "العلاج المعرفي السلوكي").into(),
                    session_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                    notes: Some("first".into()),
                }),
            )
            .unwrap();
        (db, patient)
    }

    #[test]
    fn test_clean_database_is_consistent() {
        let (db, _) = setup_db();
        let report = db.check_consistency().unwrap();
        assert!(report.is_consistent(), "{:?}", report.issues);
        assert_eq!(report.patients_checked, 1);
        assert_eq!(report.sessions_checked, 1);
    }

    #[test]
    fn test_detects_and_repairs_drift() {
        let (mut db, patient) = setup_db();
        let conn = db.conn();

        conn.execute(
            "INSERT INTO session_index (id, patient_id, patient_name, patient_national_id,
                                        session_type, session_date, notes, created_at, updated_at)
             VALUES ('ghost', ?1, 'Sara Nassar', '000000034', '\"CBT\"', '2024-01-01', NULL, 'x', 'x')",
            [&patient.id],
        )
        .unwrap();
        conn.execute("UPDATE session_index SET patient_name = 'Old Name' WHERE id != 'ghost'", [])
            .unwrap();
        conn.execute("UPDATE session_index SET notes = 'edited elsewhere' WHERE id != 'ghost'", [])
            .unwrap();
        conn.execute("UPDATE patients SET session_count = 5", []).unwrap();

        let report = db.check_consistency().unwrap();
        assert_eq!(report.count(IssueCategory::OrphanedIndexEntry), 1);
        assert_eq!(report.count(IssueCategory::SnapshotDrift), 1);
        assert_eq!(report.count(IssueCategory::FieldDrift), 1);
        assert_eq!(report.count(IssueCategory::SessionCountDrift), 1);

        let repaired = db.repair_consistency().unwrap();
        assert_eq!(repaired, 4);
        assert!(db.check_consistency().unwrap().is_consistent());

        let entries = db.list_all_sessions().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].patient_name, "Sara Nassar");
        assert_eq!(entries[0].notes.as_deref(), Some("first"));
        assert_eq!(db.get_patient(&patient.id).unwrap().unwrap().session_count, 1);
    }

    #[test]
    fn test_rebuilds_missing_entry() {
        let (mut db, _) = setup_db();
        db.conn().execute("DELETE FROM session_index", []).unwrap();

        let report = db.check_consistency().unwrap();
        assert_eq!(report.count(IssueCategory::MissingIndexEntry), 1);

        assert_eq!(db.repair_consistency().unwrap(), 1);
        assert_eq!(db.list_all_sessions().unwrap().len(), 1);
    }
}
