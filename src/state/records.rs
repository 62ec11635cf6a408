use crate::state::DownloadStatus;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};

/// A page waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized page URL
    pub url: String,

    /// Link distance from the seed (seeds are depth 0)
    pub depth: u32,
}

impl FrontierEntry {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

/// A page that has been rendered in this or a previous run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitedRecord {
    pub url: String,
    pub first_seen_depth: u32,
    pub visited_at: DateTime<Utc>,
}

/// A resource handed to the download dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Normalized resource URL, shared with its [`DownloadRecord`]
    pub resource_url: String,

    /// The page the resource was found on
    pub source_page_url: String,

    pub discovered_at: DateTime<Utc>,

    /// Number of fetch attempts this task may make in the current run
    pub attempt_budget: u32,
}

/// Persistent outcome of a resource download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub resource_url: String,
    pub status: DownloadStatus,

    /// Total fetch attempts across all runs
    pub attempts: u32,

    pub last_error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DownloadRecord {
    /// Creates a fresh record for a newly discovered resource
    pub fn pending(resource_url: impl Into<String>) -> Self {
        Self {
            resource_url: resource_url.into(),
            status: DownloadStatus::Pending,
            attempts: 0,
            last_error: None,
            completed_at: None,
        }
    }
}

/// Everything needed to resume a crawl
///
/// Maps are ordered so snapshots compare and persist deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlState {
    pub visited: BTreeMap<String, VisitedRecord>,
    pub frontier: VecDeque<FrontierEntry>,
    pub downloads: BTreeMap<String, DownloadRecord>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing has been crawled or queued yet
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty() && self.frontier.is_empty() && self.downloads.is_empty()
    }

    /// Copy of this state suitable for persisting
    ///
    /// A record cannot be in progress across a checkpoint: anything still
    /// `InProgress` is written as `Pending` so the next run fetches it again.
    pub fn for_checkpoint(&self) -> CrawlState {
        let mut state = self.clone();
        for record in state.downloads.values_mut() {
            if record.status == DownloadStatus::InProgress {
                record.status = DownloadStatus::Pending;
            }
        }
        state
    }

    /// Counts download records by status
    pub fn count_downloads(&self, status: DownloadStatus) -> usize {
        self.downloads
            .values()
            .filter(|record| record.status == status)
            .count()
    }
}
