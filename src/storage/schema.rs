//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Media-Ripple database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Pages that have been rendered (write-once)
CREATE TABLE IF NOT EXISTS visited (
    url TEXT PRIMARY KEY,
    depth INTEGER NOT NULL,
    visited_at TEXT NOT NULL
);

-- Download ledger
CREATE TABLE IF NOT EXISTS downloads (
    resource_url TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_downloads_status ON downloads(status);

-- Pages discovered but not yet rendered, in dequeue order
CREATE TABLE IF NOT EXISTS frontier (
    position INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
