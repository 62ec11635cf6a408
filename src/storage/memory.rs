//! In-memory storage backend
//!
//! Keeps checkpoints in process memory. Used by tests that need a backend
//! without a database file, or one whose saves fail on demand.

use crate::state::CrawlState;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: CrawlState,
    runs: Vec<RunRecord>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a previously checkpointed state
    pub fn with_state(state: CrawlState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Makes every subsequent `save_state` fail
    pub fn fail_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// Number of successful checkpoints written
    pub fn save_count(&self) -> usize {
        self.saves
    }

    /// The last checkpointed state
    pub fn saved_state(&self) -> &CrawlState {
        &self.state
    }
}

impl Storage for MemoryStorage {
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let id = self.runs.len() as i64 + 1;
        self.runs.push(RunRecord {
            id,
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            config_hash: config_hash.to_string(),
            status: RunStatus::Running,
        });
        Ok(id)
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.runs
            .iter()
            .find(|run| run.id == run_id)
            .cloned()
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        Ok(self.runs.last().cloned())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let run = self
            .runs
            .iter_mut()
            .find(|run| run.id == run_id)
            .ok_or(StorageError::RunNotFound(run_id))?;
        run.status = status;
        run.finished_at = Some(Utc::now().to_rfc3339());
        Ok(())
    }

    fn load_state(&self) -> StorageResult<CrawlState> {
        Ok(self.state.clone())
    }

    fn save_state(&mut self, state: &CrawlState) -> StorageResult<()> {
        if self.fail_saves {
            return Err(StorageError::Database("disk full".to_string()));
        }
        self.state = state.clone();
        self.saves += 1;
        Ok(())
    }

    fn clear_state(&mut self) -> StorageResult<()> {
        self.state = CrawlState::new();
        Ok(())
    }
}
