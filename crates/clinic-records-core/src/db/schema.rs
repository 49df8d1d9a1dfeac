//! SQLite schema definition.

/// Complete database schema for clinic records.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    national_id TEXT NOT NULL,                   -- 9 digits, zero padded
    birth_date TEXT NOT NULL,                    -- YYYY-MM-DD
    gender TEXT NOT NULL CHECK (gender IN ('Male', 'Female')),
    diagnosis TEXT,                              -- JSON {en, ar} or legacy JSON string
    insurance TEXT,                              -- JSON {en, ar} or legacy JSON string
    therapy_name TEXT NOT NULL,
    total_sessions_planned INTEGER NOT NULL DEFAULT 1,
    session_count INTEGER NOT NULL DEFAULT 0 CHECK (session_count >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_created_at ON patients(created_at);

-- ============================================================================
-- Sessions (primary, per patient)
-- ============================================================================

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    session_type TEXT NOT NULL,                  -- JSON {en, ar} or legacy JSON string
    session_date TEXT NOT NULL,                  -- YYYY-MM-DD
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_patient ON sessions(patient_id, session_date);

-- ============================================================================
-- Session Index (denormalized, all patients)
-- ============================================================================

-- No foreign keys: orphans must stay detectable by the consistency sweep.
CREATE TABLE IF NOT EXISTS session_index (
    id TEXT PRIMARY KEY,                         -- same as sessions.id
    patient_id TEXT NOT NULL,
    patient_name TEXT NOT NULL,                  -- snapshot of patients.full_name
    patient_national_id TEXT NOT NULL,           -- snapshot of patients.national_id
    session_type TEXT NOT NULL,
    session_date TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_index_patient ON session_index(patient_id);
CREATE INDEX IF NOT EXISTS idx_session_index_date ON session_index(session_date);

-- ============================================================================
-- Local Drafts (key-value, never synced)
-- ============================================================================

CREATE TABLE IF NOT EXISTS local_drafts (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
