//! Database layer for clinic records.

mod schema;
mod patients;
mod sessions;
mod drafts;
mod consistency;

pub use schema::*;
pub use consistency::*;

use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::models::CategoricalValue;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        tracing::debug!("Database schema initialized");
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn date_from_sql(raw: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| DbError::InvalidData(format!("bad date '{}': {}", raw, e)))
}

pub(crate) fn categorical_to_sql(value: &CategoricalValue) -> DbResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a categorical column. Text that is not JSON predates the bilingual
/// format and is kept as a legacy string.
pub(crate) fn categorical_from_sql(raw: String) -> CategoricalValue {
    serde_json::from_str(&raw).unwrap_or(CategoricalValue::Legacy(raw))
}
