//! Local draft key-value operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::now_timestamp;

impl Database {
    /// Raw draft payload stored under `key`.
    pub fn get_local_draft(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM local_drafts WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert or replace the draft payload under `key`.
    pub fn set_local_draft(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO local_drafts (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, now_timestamp()],
        )?;
        Ok(())
    }

    /// Delete the draft under `key`. Returns whether one existed.
    pub fn remove_local_draft(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM local_drafts WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }

    /// Keys of all stored drafts.
    pub fn list_local_draft_keys(&self) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM local_drafts ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
