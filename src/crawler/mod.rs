//! Crawler module for page traversal and media downloads
//!
//! This module contains the core crawling logic, including:
//! - Page rendering and media fetching behind swappable traits
//! - Retry backoff and error classification
//! - The breadth-first traversal scheduler
//! - The download worker pool
//! - Overall run coordination

mod backoff;
mod coordinator;
mod dispatcher;
mod fetcher;
mod renderer;
mod scheduler;

pub use backoff::{ExponentialBackoff, IsRetryable};
pub use coordinator::{run_crawl, Coordinator};
pub use dispatcher::{DispatchSummary, DispatcherHandle, DownloadDispatcher};
pub use fetcher::{classify_failure, FetchError, FetchOptions, FetchResult, MediaFetcher, YtDlpFetcher};
pub use renderer::{build_http_client, HttpRenderer, PageRenderer, RenderError, RenderOptions};
pub use scheduler::{TraversalScheduler, TraversalSettings, TraversalSummary};
