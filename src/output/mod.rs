//! Output module for run reports and statistics
//!
//! This module handles:
//! - The [`RunReport`] produced at the end of every crawl
//! - Statistics read back from a crawl database

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics, RunSummary};

use std::time::Duration;

/// A page or resource that could not be processed, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub url: String,
    pub reason: String,
}

impl FailedItem {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Summary of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Pages rendered and extracted during this run
    pub pages_visited: usize,

    /// Distinct resources seen on pages during this run
    pub resources_discovered: usize,

    pub downloads_succeeded: usize,
    pub downloads_failed: usize,
    pub duration: Duration,
    pub failed_pages: Vec<FailedItem>,
    pub failed_downloads: Vec<FailedItem>,

    /// The run stopped early; unstarted work stays pending for the next run
    pub cancelled: bool,
}

/// Prints a run report to stdout
pub fn print_report(report: &RunReport) {
    println!("=== Crawl Report ===\n");

    if report.cancelled {
        println!("Run was interrupted; progress has been saved.\n");
    }

    println!("Pages visited: {}", report.pages_visited);
    println!("Resources discovered: {}", report.resources_discovered);
    println!("Downloads succeeded: {}", report.downloads_succeeded);
    println!("Downloads failed: {}", report.downloads_failed);
    println!("Duration: {:.1}s", report.duration.as_secs_f64());

    if !report.failed_pages.is_empty() {
        println!("\nFailed Pages ({}):", report.failed_pages.len());
        for item in &report.failed_pages {
            println!("  - {}: {}", item.url, item.reason);
        }
    }

    if !report.failed_downloads.is_empty() {
        println!("\nFailed Downloads ({}):", report.failed_downloads.len());
        for item in &report.failed_downloads {
            println!("  - {}: {}", item.url, item.reason);
        }
    }
}
