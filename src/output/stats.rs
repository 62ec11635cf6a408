//! Statistics from the persisted crawl state
//!
//! Used by `--stats` to describe a database without starting a crawl.

use crate::state::DownloadStatus;
use crate::storage::{RunRecord, Storage};
use crate::RippleError;

/// Persisted crawl statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Pages waiting in the frontier
    pub queue_size: usize,

    pub pages_visited: usize,

    /// Resources ever discovered
    pub total_downloads: usize,

    pub downloaded: usize,
    pub pending: usize,
    pub failed: usize,

    /// Most recent failures, newest first
    pub recent_failures: Vec<(String, String)>,

    pub latest_run: Option<RunSummary>,
}

/// The parts of a run row worth showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
}

impl From<RunRecord> for RunSummary {
    fn from(run: RunRecord) -> Self {
        Self {
            id: run.id,
            started_at: run.started_at,
            finished_at: run.finished_at,
            status: run.status.to_db_string().to_string(),
        }
    }
}

const RECENT_FAILURES: usize = 10;

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(RippleError)` - Failed to read the persisted state
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, RippleError> {
    let state = storage.load_state()?;
    let latest_run = storage.get_latest_run()?.map(RunSummary::from);

    let mut failures: Vec<_> = state
        .downloads
        .values()
        .filter(|record| record.status == DownloadStatus::Failed)
        .collect();
    failures.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    let recent_failures = failures
        .into_iter()
        .take(RECENT_FAILURES)
        .map(|record| {
            (
                record.resource_url.clone(),
                record
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            )
        })
        .collect();

    Ok(CrawlStatistics {
        queue_size: state.frontier.len(),
        pages_visited: state.visited.len(),
        total_downloads: state.downloads.len(),
        downloaded: state.count_downloads(DownloadStatus::Succeeded),
        // In-progress records are checkpointed as pending, so this only
        // matters for a state that was never checkpointed
        pending: state.count_downloads(DownloadStatus::Pending)
            + state.count_downloads(DownloadStatus::InProgress),
        failed: state.count_downloads(DownloadStatus::Failed),
        recent_failures,
        latest_run,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Pages:");
    println!("  Visited: {}", stats.pages_visited);
    println!("  Queued: {}", stats.queue_size);
    println!();

    println!("Downloads:");
    println!("  Downloaded: {}", stats.downloaded);
    println!("  Pending: {}", stats.pending);
    println!("  Failed: {}", stats.failed);
    println!();

    if !stats.recent_failures.is_empty() {
        println!("Recent Failures:");
        for (url, error) in &stats.recent_failures {
            println!("  - {}: {}", url, error);
        }
        println!();
    }

    if let Some(run) = &stats.latest_run {
        println!(
            "Last Run: #{} started {} ({})",
            run.id, run.started_at, run.status
        );
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!();
    }

    let success_rate = if stats.total_downloads > 0 {
        (stats.downloaded as f64 / stats.total_downloads as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} resources downloaded)",
        success_rate, stats.downloaded, stats.total_downloads
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CrawlState, DownloadRecord, FrontierEntry};
    use crate::storage::{MemoryStorage, RunStatus};
    use chrono::{Duration, Utc};

    fn make_record(url: &str, status: DownloadStatus, error: Option<&str>) -> DownloadRecord {
        DownloadRecord {
            resource_url: url.to_string(),
            status,
            attempts: 1,
            last_error: error.map(str::to_string),
            completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_empty_database() {
        let stats = load_statistics(&MemoryStorage::new()).unwrap();
        assert_eq!(stats, CrawlStatistics::default());
    }

    #[test]
    fn test_counts() {
        let mut state = CrawlState::new();
        state
            .frontier
            .push_back(FrontierEntry::new("https://soundcloud.com/a", 1));
        for record in [
            make_record("https://soundcloud.com/a/1", DownloadStatus::Succeeded, None),
            make_record("https://soundcloud.com/a/2", DownloadStatus::Succeeded, None),
            DownloadRecord::pending("https://soundcloud.com/a/3"),
            make_record("https://soundcloud.com/a/4", DownloadStatus::Failed, Some("gone")),
        ] {
            state.downloads.insert(record.resource_url.clone(), record);
        }

        let mut storage = MemoryStorage::with_state(state);
        let run = storage.create_run("hash").unwrap();
        storage.finish_run(run, RunStatus::Interrupted).unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.queue_size, 1);
        assert_eq!(stats.total_downloads, 4);
        assert_eq!(stats.downloaded, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(
            stats.recent_failures,
            vec![("https://soundcloud.com/a/4".to_string(), "gone".to_string())]
        );
        assert_eq!(stats.latest_run.unwrap().status, "interrupted");
    }

    #[test]
    fn test_recent_failures_newest_first() {
        let mut state = CrawlState::new();
        let mut old = make_record("https://youtube.com/watch?v=old", DownloadStatus::Failed, Some("a"));
        old.completed_at = Some(Utc::now() - Duration::hours(1));
        let new = make_record("https://youtube.com/watch?v=new", DownloadStatus::Failed, Some("b"));
        state.downloads.insert(old.resource_url.clone(), old);
        state.downloads.insert(new.resource_url.clone(), new);

        let stats = load_statistics(&MemoryStorage::with_state(state)).unwrap();
        assert_eq!(stats.recent_failures[0].0, "https://youtube.com/watch?v=new");
    }
}
