//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{CrawlState, DownloadRecord, DownloadStatus, FrontierEntry, VisitedRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::RippleError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and initializes the schema
    pub fn new(path: &Path) -> Result<Self, RippleError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, RippleError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
    })
}

fn parse_timestamp(table: &'static str, value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            table,
            message: format!("bad timestamp '{}': {}", value, e),
        })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Crawl State =====

    fn load_state(&self) -> StorageResult<CrawlState> {
        let mut state = CrawlState::new();

        let mut stmt = self
            .conn
            .prepare("SELECT url, depth, visited_at FROM visited")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (url, depth, visited_at) = row?;
            let record = VisitedRecord {
                url: url.clone(),
                first_seen_depth: depth,
                visited_at: parse_timestamp("visited", &visited_at)?,
            };
            state.visited.insert(url, record);
        }

        let mut stmt = self.conn.prepare(
            "SELECT resource_url, status, attempts, last_error, completed_at FROM downloads",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        for row in rows {
            let (resource_url, status, attempts, last_error, completed_at) = row?;
            let status =
                DownloadStatus::from_db_string(&status).ok_or_else(|| StorageError::Corrupt {
                    table: "downloads",
                    message: format!("unknown status '{}' for {}", status, resource_url),
                })?;
            let completed_at = completed_at
                .map(|ts| parse_timestamp("downloads", &ts))
                .transpose()?;
            state.downloads.insert(
                resource_url.clone(),
                DownloadRecord {
                    resource_url,
                    status,
                    attempts,
                    last_error,
                    completed_at,
                },
            );
        }

        let mut stmt = self
            .conn
            .prepare("SELECT url, depth FROM frontier ORDER BY position ASC")?;
        let rows = stmt.query_map([], |row| Ok(FrontierEntry::new(row.get::<_, String>(0)?, row.get(1)?)))?;
        for row in rows {
            state.frontier.push_back(row?);
        }

        Ok(state)
    }

    fn save_state(&mut self, state: &CrawlState) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        {
            // Visited records are write-once, so existing rows are left alone
            let mut insert_visited = tx.prepare(
                "INSERT OR IGNORE INTO visited (url, depth, visited_at) VALUES (?1, ?2, ?3)",
            )?;
            for record in state.visited.values() {
                insert_visited.execute(params![
                    record.url,
                    record.first_seen_depth,
                    record.visited_at.to_rfc3339()
                ])?;
            }

            let mut upsert_download = tx.prepare(
                "INSERT OR REPLACE INTO downloads
                 (resource_url, status, attempts, last_error, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in state.downloads.values() {
                upsert_download.execute(params![
                    record.resource_url,
                    record.status.to_db_string(),
                    record.attempts,
                    record.last_error,
                    record.completed_at.map(|ts| ts.to_rfc3339()),
                ])?;
            }

            tx.execute("DELETE FROM frontier", [])?;
            let mut insert_frontier =
                tx.prepare("INSERT INTO frontier (position, url, depth) VALUES (?1, ?2, ?3)")?;
            for (position, entry) in state.frontier.iter().enumerate() {
                insert_frontier.execute(params![position as i64, entry.url, entry.depth])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn clear_state(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            DELETE FROM visited;
            DELETE FROM downloads;
            DELETE FROM frontier;
        ",
        )?;
        Ok(())
    }
}
