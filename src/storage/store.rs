//! The state store shared by the scheduler and the download workers
//!
//! The store owns the only live copy of the [`CrawlState`]. Every lookup goes
//! through URL normalization first, and every mutation happens under one lock,
//! so check-and-set operations such as [`StateStore::mark_visited`] are atomic
//! per key. The durable backend is only touched by [`StateStore::checkpoint`]
//! and the run bookkeeping methods.
//!
//! A checkpoint can be taken at any moment. The page being rendered and
//! downloads waiting out a retry backoff are written so that the next run
//! picks them up again.

use crate::state::{CrawlState, DownloadRecord, DownloadStatus, FrontierEntry, VisitedRecord};
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::url::normalized_key;
use crate::{Result, RippleError};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Knobs that change how the store treats download records
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Attempt cap for a resource within one run
    pub max_attempts: u32,

    /// Leave resources that failed in a previous run alone
    pub skip_known_failures: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            skip_known_failures: false,
        }
    }
}

/// Result of [`StateStore::mark_visited`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    Marked,
    AlreadyVisited,
}

/// Counts over the live state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub visited: usize,
    pub frontier: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Inner {
    state: CrawlState,

    /// Pages that were ever placed in the frontier during this run
    queued_pages: HashSet<String>,

    /// Resources already handed to the dispatcher during this run
    claimed: HashSet<String>,

    /// Resources seen on a page during this run
    discovered: HashSet<String>,

    /// Resources that were `Failed` in the restored state
    prior_failures: HashSet<String>,

    /// Page taken off the frontier and not yet visited or given up on
    in_flight: Option<FrontierEntry>,

    /// Fetch attempts made per resource during this run
    run_attempts: HashMap<String, u32>,

    /// `Failed` resources that a worker is about to retry
    retrying: HashSet<String>,
}

/// Thread-safe owner of the crawl state
pub struct StateStore {
    inner: Mutex<Inner>,
    backend: Mutex<Box<dyn Storage>>,
    options: StoreOptions,
}

impl StateStore {
    /// Creates a store with empty state over the given backend
    pub fn new(backend: Box<dyn Storage>, options: StoreOptions) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            backend: Mutex::new(backend),
            options,
        }
    }

    /// Creates a store and restores whatever the backend last checkpointed
    pub fn open(backend: Box<dyn Storage>, options: StoreOptions) -> Result<Self> {
        let persisted = backend.load_state()?;
        let store = Self::new(backend, options);
        if !persisted.is_empty() {
            info!(
                "Restoring crawl state: {} visited, {} queued, {} download records",
                persisted.visited.len(),
                persisted.frontier.len(),
                persisted.downloads.len()
            );
        }
        store.restore(persisted);
        Ok(store)
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_backend(&self) -> MutexGuard<'_, Box<dyn Storage>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Pages =====

    /// Returns true if the page has been rendered in this or a prior run
    ///
    /// Unparsable URLs are reported as not visited.
    pub fn has_visited(&self, url: &str) -> bool {
        match normalized_key(url) {
            Ok(key) => self.lock().state.visited.contains_key(&key),
            Err(_) => false,
        }
    }

    /// Records a page as visited unless it already was
    pub fn mark_visited(&self, url: &str, depth: u32) -> Result<VisitOutcome> {
        let key = normalized_key(url)?;
        let mut inner = self.lock();
        if inner.state.visited.contains_key(&key) {
            return Ok(VisitOutcome::AlreadyVisited);
        }
        inner.state.visited.insert(
            key.clone(),
            VisitedRecord {
                url: key,
                first_seen_depth: depth,
                visited_at: Utc::now(),
            },
        );
        Ok(VisitOutcome::Marked)
    }

    /// Appends a page to the frontier
    ///
    /// Returns `false` without queueing if the page was visited or has
    /// already been queued during this run.
    pub fn push_frontier(&self, entry: FrontierEntry) -> Result<bool> {
        let key = normalized_key(&entry.url)?;
        let mut inner = self.lock();
        if inner.state.visited.contains_key(&key) || !inner.queued_pages.insert(key.clone()) {
            return Ok(false);
        }
        inner.state.frontier.push_back(FrontierEntry::new(key, entry.depth));
        Ok(true)
    }

    /// Takes the next page off the frontier
    ///
    /// The page stays in flight until [`StateStore::complete_page`],
    /// [`StateStore::release_page`] or [`StateStore::return_to_frontier`],
    /// and checkpoints taken meanwhile keep it at the head of the frontier.
    pub fn pop_frontier(&self) -> Option<FrontierEntry> {
        let mut inner = self.lock();
        let entry = inner.state.frontier.pop_front();
        inner.in_flight = entry.clone();
        entry
    }

    /// Puts a popped page back at the head of the frontier
    ///
    /// Used when a run stops before the page could be rendered.
    pub fn return_to_frontier(&self, entry: FrontierEntry) {
        let mut inner = self.lock();
        inner.in_flight = None;
        if !inner.state.visited.contains_key(&entry.url) {
            inner.state.frontier.push_front(entry);
        }
    }

    /// Drops the in-flight page without visiting it
    ///
    /// Used for pages that are skipped or failed to render.
    pub fn release_page(&self) {
        self.lock().in_flight = None;
    }

    /// Records a rendered page and everything found on it in one step
    ///
    /// The page is marked visited, `page_links` are queued one level deeper,
    /// and every resource gets a download record. Nothing changes if the page
    /// was already visited. Either way the page is no longer in flight.
    pub fn complete_page(
        &self,
        entry: &FrontierEntry,
        page_links: &[String],
        resource_links: &[String],
    ) -> Result<VisitOutcome> {
        let key = normalized_key(&entry.url)?;
        let page_keys = page_links
            .iter()
            .map(|url| normalized_key(url))
            .collect::<crate::UrlResult<Vec<_>>>()?;
        let resource_keys = resource_links
            .iter()
            .map(|url| normalized_key(url))
            .collect::<crate::UrlResult<Vec<_>>>()?;

        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.in_flight = None;
        if inner.state.visited.contains_key(&key) {
            return Ok(VisitOutcome::AlreadyVisited);
        }
        inner.state.visited.insert(
            key.clone(),
            VisitedRecord {
                url: key,
                first_seen_depth: entry.depth,
                visited_at: Utc::now(),
            },
        );

        let next_depth = entry.depth + 1;
        for page in page_keys {
            if !inner.state.visited.contains_key(&page) && inner.queued_pages.insert(page.clone()) {
                inner.state.frontier.push_back(FrontierEntry::new(page, next_depth));
            }
        }
        for resource in resource_keys {
            inner.discovered.insert(resource.clone());
            inner
                .state
                .downloads
                .entry(resource.clone())
                .or_insert_with(|| DownloadRecord::pending(resource));
        }
        Ok(VisitOutcome::Marked)
    }

    pub fn frontier_len(&self) -> usize {
        self.lock().state.frontier.len()
    }

    // ===== Downloads =====

    /// Returns the record for a resource, creating a `Pending` one if needed
    pub fn record_download_attempt(&self, url: &str) -> Result<DownloadRecord> {
        let key = normalized_key(url)?;
        let mut inner = self.lock();
        let record = inner
            .state
            .downloads
            .entry(key.clone())
            .or_insert_with(|| DownloadRecord::pending(key));
        Ok(record.clone())
    }

    /// Claims a resource for the dispatcher
    ///
    /// Returns `true` the first time a resource is claimed in this run. A
    /// second claim means a task for it already exists.
    pub fn claim_download(&self, url: &str) -> bool {
        let key = normalized_key(url).unwrap_or_else(|_| url.to_string());
        self.lock().claimed.insert(key)
    }

    /// Returns true if the resource was already `Failed` when the state was restored
    pub fn is_prior_failure(&self, url: &str) -> bool {
        let key = normalized_key(url).unwrap_or_else(|_| url.to_string());
        self.lock().prior_failures.contains(&key)
    }

    /// Number of fetch attempts a task for this resource may make in this run
    pub fn attempt_budget(&self, url: &str) -> u32 {
        if self.is_prior_failure(url) {
            1
        } else {
            self.options.max_attempts
        }
    }

    /// Moves a download record to a new status
    ///
    /// Entering `InProgress` counts one attempt, both on the record and
    /// towards the per-run cap. `Succeeded` and `Failed` stamp the completion
    /// time, and `Failed` keeps the error message.
    pub fn update_download_status(
        &self,
        url: &str,
        status: DownloadStatus,
        error: Option<&str>,
    ) -> Result<DownloadRecord> {
        let key = normalized_key(url)?;
        let max_attempts = self.options.max_attempts;
        let mut guard = self.lock();
        let inner = &mut *guard;
        let record = inner
            .state
            .downloads
            .get_mut(&key)
            .ok_or_else(|| RippleError::UnknownDownload(key.clone()))?;
        let attempts_this_run = inner.run_attempts.entry(key.clone()).or_insert(0);

        if !record
            .status
            .can_transition(status, *attempts_this_run, max_attempts)
        {
            return Err(RippleError::InvalidTransition {
                url: key,
                from: record.status,
                to: status,
            });
        }

        match status {
            DownloadStatus::InProgress => {
                record.attempts += 1;
                *attempts_this_run += 1;
            }
            DownloadStatus::Succeeded => {
                record.last_error = None;
                record.completed_at = Some(Utc::now());
            }
            DownloadStatus::Failed => {
                record.last_error = error.map(str::to_string);
                record.completed_at = Some(Utc::now());
            }
            DownloadStatus::Pending => {}
        }
        record.status = status;
        inner.retrying.remove(&key);
        debug!("{} -> {} (attempt {})", key, status, record.attempts);
        Ok(record.clone())
    }

    /// Notes that a `Failed` resource will be retried in this run
    ///
    /// Until its next status change the resource is checkpointed as `Pending`,
    /// so a crash during the backoff does not turn it into a prior failure.
    pub fn mark_retrying(&self, url: &str) {
        let key = normalized_key(url).unwrap_or_else(|_| url.to_string());
        self.lock().retrying.insert(key);
    }

    /// Resources still waiting for a download, in key order
    pub fn pending_downloads(&self) -> Vec<String> {
        self.lock()
            .state
            .downloads
            .values()
            .filter(|record| record.status == DownloadStatus::Pending)
            .map(|record| record.resource_url.clone())
            .collect()
    }

    pub fn download_record(&self, url: &str) -> Option<DownloadRecord> {
        let key = normalized_key(url).ok()?;
        self.lock().state.downloads.get(&key).cloned()
    }

    /// Number of distinct resources seen on pages during this run
    pub fn resources_discovered(&self) -> usize {
        self.lock().discovered.len()
    }

    // ===== Snapshots =====

    /// Copy of the live state
    pub fn snapshot(&self) -> CrawlState {
        self.lock().state.clone()
    }

    /// The state as it would be written by [`StateStore::checkpoint`]
    ///
    /// `InProgress` records and records awaiting a retry are written as
    /// `Pending`. An in-flight page that is not yet visited is written at
    /// the head of the frontier.
    pub fn checkpoint_state(&self) -> CrawlState {
        let inner = self.lock();
        let mut state = inner.state.for_checkpoint();

        for url in &inner.retrying {
            if let Some(record) = state.downloads.get_mut(url) {
                if record.status == DownloadStatus::Failed {
                    record.status = DownloadStatus::Pending;
                }
            }
        }

        if let Some(entry) = &inner.in_flight {
            let queued = state.frontier.iter().any(|e| e.url == entry.url);
            if !queued && !state.visited.contains_key(&entry.url) {
                state.frontier.push_front(entry.clone());
            }
        }
        state
    }

    /// Replaces the live state with a previously saved one
    ///
    /// Records left `InProgress` by a crash go back to `Pending`. Records that
    /// `Failed` become `Pending` again with a single attempt left, or stay
    /// `Failed` when known failures are skipped. Run-local bookkeeping starts
    /// over, with the restored frontier counted as already queued.
    pub fn restore(&self, mut state: CrawlState) {
        let mut prior_failures = HashSet::new();
        for record in state.downloads.values_mut() {
            match record.status {
                DownloadStatus::InProgress => record.status = DownloadStatus::Pending,
                DownloadStatus::Failed if !self.options.skip_known_failures => {
                    record.status = DownloadStatus::Pending;
                    prior_failures.insert(record.resource_url.clone());
                }
                _ => {}
            }
        }

        let queued_pages = state.frontier.iter().map(|e| e.url.clone()).collect();

        let mut inner = self.lock();
        *inner = Inner {
            state,
            queued_pages,
            prior_failures,
            ..Inner::default()
        };
    }

    /// Writes the current state through the backend
    pub fn checkpoint(&self) -> StorageResult<()> {
        let snapshot = self.checkpoint_state();
        self.lock_backend().save_state(&snapshot)?;
        debug!(
            "Checkpoint saved: {} visited, {} queued, {} download records",
            snapshot.visited.len(),
            snapshot.frontier.len(),
            snapshot.downloads.len()
        );
        Ok(())
    }

    /// Wipes both the live state and the persisted one
    pub fn clear(&self) -> StorageResult<()> {
        self.lock_backend().clear_state()?;
        *self.lock() = Inner::default();
        Ok(())
    }

    // ===== Runs =====

    pub fn start_run(&self, config_hash: &str) -> StorageResult<i64> {
        self.lock_backend().create_run(config_hash)
    }

    pub fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.lock_backend().finish_run(run_id, status)
    }

    pub fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.lock_backend().get_latest_run()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.lock();
        let state = &inner.state;
        StoreStats {
            visited: state.visited.len(),
            frontier: state.frontier.len(),
            pending: state.count_downloads(DownloadStatus::Pending),
            in_progress: state.count_downloads(DownloadStatus::InProgress),
            succeeded: state.count_downloads(DownloadStatus::Succeeded),
            failed: state.count_downloads(DownloadStatus::Failed),
        }
    }
}
