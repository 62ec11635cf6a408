//! Breadth-first traversal of the page graph
//!
//! The scheduler is a single task: it takes one page off the frontier at a
//! time, renders it, and records it as visited together with its links: pages
//! for the frontier and resources as pending downloads. Only then are the
//! resources sent into the bounded queue, which is the only place it waits on
//! the workers, so a checkpoint taken while it waits has the whole page.

use crate::crawler::backoff::{ExponentialBackoff, IsRetryable};
use crate::crawler::renderer::{PageRenderer, RenderError, RenderOptions};
use crate::extract::{Document, Platform};
use crate::output::FailedItem;
use crate::state::{DownloadStatus, DownloadTask, FrontierEntry, RunPhase};
use crate::storage::{StateStore, VisitOutcome};
use crate::{Result, RippleError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Traversal limits
#[derive(Debug, Clone)]
pub struct TraversalSettings {
    pub max_depth: u32,
    pub render_max_attempts: u32,
    pub backoff: ExponentialBackoff,
    pub render_options: RenderOptions,
}

/// What the scheduler did during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalSummary {
    pub pages_visited: usize,
    pub tasks_enqueued: usize,
    pub failed_pages: Vec<FailedItem>,
    pub cancelled: bool,
}

enum Flow {
    Continue,
    Cancelled,
}

/// Drives the frontier and feeds the download queue
pub struct TraversalScheduler {
    store: Arc<StateStore>,
    renderer: Arc<dyn PageRenderer>,
    platform: Platform,
    settings: TraversalSettings,
    cancel: CancellationToken,
    phase: RunPhase,
    summary: TraversalSummary,
}

impl TraversalScheduler {
    pub fn new(
        store: Arc<StateStore>,
        renderer: Arc<dyn PageRenderer>,
        platform: Platform,
        settings: TraversalSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            renderer,
            platform,
            settings,
            cancel,
            phase: RunPhase::Idle,
            summary: TraversalSummary::default(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn transition(&mut self, to: RunPhase) -> Result<()> {
        if !self.phase.can_transition(to) {
            return Err(RippleError::InvalidPhase {
                from: self.phase,
                to,
            });
        }
        debug!("Scheduler phase {} -> {}", self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Places seed pages in the frontier at depth 0
    ///
    /// Seeds already visited in a prior run are skipped. Returns how many
    /// were queued.
    pub fn seed(&self, seeds: &[String]) -> Result<usize> {
        let mut queued = 0;
        for seed in seeds {
            if self.store.push_frontier(FrontierEntry::new(seed.as_str(), 0))? {
                queued += 1;
            } else {
                debug!("Seed {} already visited or queued", seed);
            }
        }
        Ok(queued)
    }

    /// Runs the traversal until the frontier is empty or the run is cancelled
    ///
    /// The sender is dropped on return, which lets the workers drain the queue
    /// and stop.
    pub async fn run(&mut self, sender: mpsc::Sender<DownloadTask>) -> Result<TraversalSummary> {
        self.transition(RunPhase::Running)?;
        let start_time = Instant::now();

        let mut flow = self.enqueue_restored_downloads(&sender).await?;

        while matches!(flow, Flow::Continue) {
            if self.cancel.is_cancelled() {
                flow = Flow::Cancelled;
                break;
            }

            let Some(entry) = self.store.pop_frontier() else {
                break;
            };

            let visited_before = self.summary.pages_visited;
            flow = self.process_entry(entry, &sender).await?;

            let visited = self.summary.pages_visited;
            if visited != visited_before && visited % 10 == 0 {
                let elapsed = start_time.elapsed();
                info!(
                    "Progress: {} pages visited, {} in frontier, {} downloads queued, {:.2} pages/sec",
                    self.summary.pages_visited,
                    self.store.frontier_len(),
                    self.summary.tasks_enqueued,
                    self.summary.pages_visited as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
                );
            }
        }

        drop(sender);

        match flow {
            Flow::Continue => {
                info!(
                    "Frontier exhausted after {} pages, draining downloads",
                    self.summary.pages_visited
                );
                self.transition(RunPhase::Draining)?;
            }
            Flow::Cancelled => {
                info!("Traversal cancelled with {} pages left", self.store.frontier_len());
                self.summary.cancelled = true;
                self.transition(RunPhase::Cancelled)?;
            }
        }

        Ok(self.summary.clone())
    }

    /// Finishes the run once the workers have stopped
    ///
    /// A cancellation that arrived while draining is recorded first.
    pub fn terminate(&mut self, cancelled: bool) -> Result<()> {
        if cancelled && self.phase == RunPhase::Draining {
            self.transition(RunPhase::Cancelled)?;
        }
        self.transition(RunPhase::Terminated)
    }

    /// Re-queues downloads that were still pending when the state was restored
    async fn enqueue_restored_downloads(
        &mut self,
        sender: &mpsc::Sender<DownloadTask>,
    ) -> Result<Flow> {
        let pending = self.store.pending_downloads();
        if !pending.is_empty() {
            info!("Resuming {} pending downloads", pending.len());
        }
        for resource_url in pending {
            if let Flow::Cancelled = self.enqueue_download(&resource_url, "", sender).await? {
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Continue)
    }

    async fn process_entry(
        &mut self,
        entry: FrontierEntry,
        sender: &mpsc::Sender<DownloadTask>,
    ) -> Result<Flow> {
        if entry.depth > self.settings.max_depth {
            debug!("Skipping {} beyond max depth", entry.url);
            self.store.release_page();
            return Ok(Flow::Continue);
        }

        if self.store.has_visited(&entry.url) {
            debug!("Skipping {}: already visited", entry.url);
            self.store.release_page();
            return Ok(Flow::Continue);
        }

        debug!("Rendering {} (depth {})", entry.url, entry.depth);
        let document = match self.render_with_retry(&entry.url).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                self.store.return_to_frontier(entry);
                return Ok(Flow::Cancelled);
            }
            Err(e) => {
                warn!("Giving up on {}: {}", entry.url, e);
                self.store.release_page();
                self.summary
                    .failed_pages
                    .push(FailedItem::new(&entry.url, e.to_string()));
                return Ok(Flow::Continue);
            }
        };

        let links = self
            .platform
            .extract_links(&document, &entry.url, entry.depth);
        let page_links: &[String] = if entry.depth < self.settings.max_depth {
            &links.page_links
        } else {
            &[]
        };

        let outcome = self
            .store
            .complete_page(&entry, page_links, &links.resource_links)?;
        if outcome == VisitOutcome::AlreadyVisited {
            return Ok(Flow::Continue);
        }
        self.summary.pages_visited += 1;

        for resource in &links.resource_links {
            if let Flow::Cancelled = self.enqueue_download(resource, &entry.url, sender).await? {
                return Ok(Flow::Cancelled);
            }
        }

        Ok(Flow::Continue)
    }

    /// Hands a resource to the dispatcher unless it is done or already queued
    async fn enqueue_download(
        &mut self,
        resource_url: &str,
        source_page_url: &str,
        sender: &mpsc::Sender<DownloadTask>,
    ) -> Result<Flow> {
        let record = self.store.record_download_attempt(resource_url)?;
        if record.status != DownloadStatus::Pending {
            debug!("Not queueing {}: {}", record.resource_url, record.status);
            return Ok(Flow::Continue);
        }
        if !self.store.claim_download(&record.resource_url) {
            return Ok(Flow::Continue);
        }

        let task = DownloadTask {
            attempt_budget: self.store.attempt_budget(&record.resource_url),
            resource_url: record.resource_url,
            source_page_url: source_page_url.to_string(),
            discovered_at: Utc::now(),
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(Flow::Cancelled),
            sent = sender.send(task) => {
                sent.map_err(|_| RippleError::Worker("download queue closed".to_string()))?;
                self.summary.tasks_enqueued += 1;
                Ok(Flow::Continue)
            }
        }
    }

    /// Renders a page, retrying transient failures
    ///
    /// Returns `Ok(None)` if the run was cancelled while waiting to retry.
    async fn render_with_retry(
        &self,
        url: &str,
    ) -> std::result::Result<Option<Document>, RenderError> {
        let max_attempts = self.settings.render_max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self
                .renderer
                .render(url, &self.settings.render_options)
                .await
            {
                Ok(document) => return Ok(Some(document)),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.settings.backoff.delay(attempt);
                    attempt += 1;
                    warn!(
                        "Render of {} failed ({}), retry {}/{} in {:?}",
                        url,
                        e,
                        attempt,
                        max_attempts - 1,
                        delay
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
