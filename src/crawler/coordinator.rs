//! Crawler coordinator - wires one run together
//!
//! The coordinator owns the pieces of a run and their lifetimes:
//! - Recording the run row and the effective config hash
//! - Spawning the download workers and the periodic checkpointer
//! - Running the traversal until the frontier is empty or the run is cancelled
//! - Waiting for in-flight downloads, writing the final checkpoint
//! - Building the [`RunReport`]

use crate::config::{compute_effective_hash, Config};
use crate::crawler::backoff::ExponentialBackoff;
use crate::crawler::dispatcher::{DispatchSummary, DownloadDispatcher};
use crate::crawler::fetcher::{FetchOptions, MediaFetcher, YtDlpFetcher};
use crate::crawler::renderer::{HttpRenderer, PageRenderer, RenderOptions};
use crate::crawler::scheduler::{TraversalScheduler, TraversalSettings, TraversalSummary};
use crate::output::RunReport;
use crate::storage::{open_storage, RunStatus, StateStore, StorageResult, StoreOptions};
use crate::{Result, RippleError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    store: Arc<StateStore>,
    renderer: Arc<dyn PageRenderer>,
    fetcher: Arc<dyn MediaFetcher>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawler configuration
    /// * `store` - The state store, already restored from its backend
    /// * `renderer` - Produces documents for pages
    /// * `fetcher` - Saves resources to disk
    pub fn new(
        config: Config,
        store: Arc<StateStore>,
        renderer: Arc<dyn PageRenderer>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        Self {
            config,
            store,
            renderer,
            fetcher,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops the run when the given token is cancelled
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Runs one crawl from the given seed URLs
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run finished or was cancelled; progress is checkpointed
    /// * `Err(RippleError)` - A fatal error stopped the run
    pub async fn run(&self, seeds: &[String]) -> Result<RunReport> {
        let start_time = Instant::now();
        let config_hash = compute_effective_hash(&self.config)?;
        let run_id = self.store.start_run(&config_hash)?;
        info!(
            "Starting run {} on {} with {} seeds (config {})",
            run_id,
            self.config.platform,
            seeds.len(),
            config_hash.get(..12).unwrap_or(config_hash.as_str())
        );

        let outcome = self.execute(seeds).await;

        let status = match &outcome {
            Ok(report) if report.cancelled => RunStatus::Interrupted,
            Ok(_) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        };
        if let Err(e) = self.store.finish_run(run_id, status) {
            error!("Failed to record the end of run {}: {}", run_id, e);
            if outcome.is_ok() {
                return Err(e.into());
            }
        }

        let mut report = outcome?;
        report.duration = start_time.elapsed();
        info!(
            "Run {} {}: {} pages, {} downloaded, {} failed in {:.1}s",
            run_id,
            status.to_db_string(),
            report.pages_visited,
            report.downloads_succeeded,
            report.downloads_failed,
            report.duration.as_secs_f64()
        );
        Ok(report)
    }

    async fn execute(&self, seeds: &[String]) -> Result<RunReport> {
        let crawler = &self.config.crawler;
        let backoff = ExponentialBackoff::from_config(&self.config.retry);

        let (sender, receiver) = mpsc::channel(crawler.queue_capacity.max(1));
        let dispatcher = DownloadDispatcher::new(
            self.store.clone(),
            self.fetcher.clone(),
            FetchOptions::from_config(&self.config.download),
            backoff,
            crawler.workers,
            self.cancel.clone(),
        )
        .spawn(receiver);

        let stop_checkpoints = CancellationToken::new();
        let checkpointer = spawn_checkpointer(
            self.store.clone(),
            crawler.checkpoint_interval(),
            stop_checkpoints.clone(),
            self.cancel.clone(),
        );

        let mut scheduler = TraversalScheduler::new(
            self.store.clone(),
            self.renderer.clone(),
            self.config.platform,
            TraversalSettings {
                max_depth: crawler.max_depth,
                render_max_attempts: self.config.retry.render_max_attempts,
                backoff,
                render_options: RenderOptions::from_config(&self.config.renderer),
            },
            self.cancel.clone(),
        );

        let traversal = match scheduler.seed(seeds) {
            Ok(queued) => {
                info!(
                    "{} seeds queued, {} pages in frontier",
                    queued,
                    self.store.frontier_len()
                );
                scheduler.run(sender).await
            }
            Err(e) => {
                drop(sender);
                Err(e)
            }
        };
        if let Err(e) = &traversal {
            error!("Traversal failed: {}", e);
            self.cancel.cancel();
        }

        let dispatch = dispatcher.join().await;

        stop_checkpoints.cancel();
        let periodic = checkpointer
            .await
            .map_err(|e| RippleError::Worker(e.to_string()))
            .and_then(|result| result.map_err(RippleError::from));

        let cancelled = self.cancel.is_cancelled();
        let terminated = match &traversal {
            Ok(_) => scheduler.terminate(cancelled),
            Err(_) => Ok(()),
        };

        // Always attempted, even when something above failed
        let final_checkpoint = self.store.checkpoint();
        if let Err(e) = &final_checkpoint {
            error!("Final checkpoint failed: {}", e);
        }

        let traversal = traversal?;
        let dispatch = dispatch?;
        terminated?;
        periodic?;
        final_checkpoint?;

        Ok(self.build_report(traversal, dispatch, cancelled))
    }

    fn build_report(
        &self,
        traversal: TraversalSummary,
        dispatch: DispatchSummary,
        cancelled: bool,
    ) -> RunReport {
        RunReport {
            pages_visited: traversal.pages_visited,
            resources_discovered: self.store.resources_discovered(),
            downloads_succeeded: dispatch.succeeded,
            downloads_failed: dispatch.failed,
            duration: Duration::ZERO,
            failed_pages: traversal.failed_pages,
            failed_downloads: dispatch.failed_downloads,
            cancelled: traversal.cancelled || cancelled,
        }
    }
}

/// Saves the state on a fixed interval until stopped
///
/// A failed save cancels the run.
fn spawn_checkpointer(
    store: Arc<StateStore>,
    period: Duration,
    stop: CancellationToken,
    cancel: CancellationToken,
) -> JoinHandle<StorageResult<()>> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    if let Err(e) = store.checkpoint() {
                        error!("Periodic checkpoint failed, stopping the run: {}", e);
                        cancel.cancel();
                        return Err(e);
                    }
                    debug!("Periodic checkpoint written");
                }
            }
        }
    })
}

/// Builds the production renderer, fetcher and store, then runs a crawl
///
/// # Arguments
///
/// * `config` - The validated crawler configuration
/// * `seeds` - Seed page URLs, already resolved from URLs and keywords
/// * `clear_state` - Wipe the persisted state before starting
/// * `cancel` - Cancelled on Ctrl-C
pub async fn run_crawl(
    config: Config,
    seeds: Vec<String>,
    clear_state: bool,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let fetcher =
        YtDlpFetcher::from_path().ok_or_else(|| RippleError::ToolNotFound("yt-dlp".into()))?;
    let renderer = HttpRenderer::new(&config.renderer)?;

    let database_path = config.database_path();
    info!("Using database {}", database_path.display());
    let storage = open_storage(&database_path)?;
    let store = StateStore::open(
        Box::new(storage),
        StoreOptions {
            max_attempts: config.retry.download_max_attempts,
            skip_known_failures: config.crawler.skip_known_failures,
        },
    )?;
    if clear_state {
        info!("Clearing persisted crawl state");
        store.clear()?;
    }

    let coordinator = Coordinator::new(
        config,
        Arc::new(store),
        Arc::new(renderer),
        Arc::new(fetcher),
    )
    .with_cancellation_token(cancel);

    coordinator.run(&seeds).await
}
