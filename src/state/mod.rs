//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `DownloadStatus`: the per-resource download state machine
//! - `RunPhase`: lifecycle of a single crawl run
//! - Records (`FrontierEntry`, `VisitedRecord`, `DownloadTask`,
//!   `DownloadRecord`) and the `CrawlState` snapshot that bundles them

mod download_status;
mod records;
mod run_phase;

pub use download_status::DownloadStatus;
pub use records::{CrawlState, DownloadRecord, DownloadTask, FrontierEntry, VisitedRecord};
pub use run_phase::RunPhase;
