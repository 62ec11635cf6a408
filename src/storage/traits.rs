//! Storage traits and error types
//!
//! This module defines the trait interface for the durable medium behind the
//! state store, and the errors it can raise.

use crate::state::CrawlState;
use crate::storage::{RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// Every variant is fatal to a crawl run: without a consistent checkpoint
/// there is no safe way to continue.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt record in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for durable storage backends
///
/// A backend only needs point-in-time consistency: `save_state` replaces the
/// persisted snapshot as one unit, and `load_state` returns the last snapshot
/// that was saved.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the effective configuration
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Crawl State =====

    /// Loads the last persisted crawl state (empty if none was saved)
    fn load_state(&self) -> StorageResult<CrawlState>;

    /// Persists a full crawl state snapshot atomically
    fn save_state(&mut self, state: &CrawlState) -> StorageResult<()>;

    /// Removes all persisted crawl state (runs are kept)
    fn clear_state(&mut self) -> StorageResult<()>;
}
