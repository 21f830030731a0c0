//! SQL schema for the child-insight SQLite store.
//!
//! Executed at every connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- `data` holds the full JSON entity; the other columns are the query path.
CREATE TABLE IF NOT EXISTS profiles (
    id           TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    age          INTEGER NOT NULL,
    age_group    TEXT NOT NULL,     -- '1-5' | '6-12' | '13-18'
    profile_pic  TEXT,
    created_at   TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    data         TEXT NOT NULL
);

-- Insights are removed explicitly by the store before their profile, so the
-- reference carries no ON DELETE action.
CREATE TABLE IF NOT EXISTS insights (
    id               TEXT PRIMARY KEY,
    user_id          TEXT NOT NULL REFERENCES profiles(id),
    category         TEXT NOT NULL,
    timestamp        TEXT NOT NULL, -- fixed-width RFC 3339, UTC
    confidence_score REAL NOT NULL,
    data             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Append-only; written once per export.
CREATE TABLE IF NOT EXISTS backups (
    id        TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    file_path TEXT NOT NULL,
    size      INTEGER NOT NULL,
    encrypted INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS retention_policy (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    data_type      TEXT NOT NULL UNIQUE,
    retention_days INTEGER NOT NULL,
    last_cleanup   TEXT
);

INSERT OR IGNORE INTO retention_policy (data_type, retention_days)
VALUES ('insights', 365);

CREATE INDEX IF NOT EXISTS profiles_name_idx      ON profiles(name);
CREATE INDEX IF NOT EXISTS insights_user_idx      ON insights(user_id);
CREATE INDEX IF NOT EXISTS insights_category_idx  ON insights(category);
CREATE INDEX IF NOT EXISTS insights_timestamp_idx ON insights(timestamp);
CREATE INDEX IF NOT EXISTS backups_timestamp_idx  ON backups(timestamp);

PRAGMA user_version = 1;
";
