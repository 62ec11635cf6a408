//! Download worker pool
//!
//! A fixed number of identical workers share the receiving end of the
//! download queue. Each worker takes one task at a time and keeps it until it
//! ends `Succeeded` or `Failed`: retries back off and happen on the same
//! worker, so a retry never has to wait for room in a full queue. A retry cut
//! short by cancellation leaves the record `Pending` for the next run.

use crate::crawler::backoff::{ExponentialBackoff, IsRetryable};
use crate::crawler::fetcher::{FetchOptions, MediaFetcher};
use crate::output::FailedItem;
use crate::state::{DownloadStatus, DownloadTask};
use crate::storage::StateStore;
use crate::{Result, RippleError};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome counts for a set of downloads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub failed_downloads: Vec<FailedItem>,
}

impl DispatchSummary {
    fn merge(&mut self, other: DispatchSummary) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.failed_downloads.extend(other.failed_downloads);
    }
}

/// Configures and starts the worker pool
pub struct DownloadDispatcher {
    store: Arc<StateStore>,
    fetcher: Arc<dyn MediaFetcher>,
    options: FetchOptions,
    backoff: ExponentialBackoff,
    workers: usize,
    cancel: CancellationToken,
}

impl DownloadDispatcher {
    pub fn new(
        store: Arc<StateStore>,
        fetcher: Arc<dyn MediaFetcher>,
        options: FetchOptions,
        backoff: ExponentialBackoff,
        workers: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            fetcher,
            options,
            backoff,
            workers: workers.max(1),
            cancel,
        }
    }

    /// Spawns the workers on the current runtime
    pub fn spawn(self, receiver: mpsc::Receiver<DownloadTask>) -> DispatcherHandle {
        let receiver = Arc::new(Mutex::new(receiver));
        let worker = Arc::new(Worker {
            store: self.store,
            fetcher: self.fetcher,
            options: self.options,
            backoff: self.backoff,
            cancel: self.cancel.clone(),
        });

        info!("Starting {} download workers", self.workers);
        let handles = (0..self.workers)
            .map(|id| {
                let worker = worker.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move { worker.run(id, receiver).await })
            })
            .collect();

        DispatcherHandle {
            handles,
            cancel: self.cancel,
        }
    }
}

/// Running worker pool
pub struct DispatcherHandle {
    handles: Vec<JoinHandle<Result<DispatchSummary>>>,
    cancel: CancellationToken,
}

impl DispatcherHandle {
    /// Waits for every worker to stop
    ///
    /// Workers stop once the queue is closed and empty, or as soon as the run
    /// is cancelled. If any worker hits a fatal error the rest are cancelled
    /// and the first error is returned.
    pub async fn join(self) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();
        let mut first_error = None;

        for handle in self.handles {
            let outcome = handle
                .await
                .map_err(|e| RippleError::Worker(e.to_string()))
                .and_then(|result| result);
            match outcome {
                Ok(worker_summary) => summary.merge(worker_summary),
                Err(e) => {
                    error!("Download worker failed: {}", e);
                    self.cancel.cancel();
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

struct Worker {
    store: Arc<StateStore>,
    fetcher: Arc<dyn MediaFetcher>,
    options: FetchOptions,
    backoff: ExponentialBackoff,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(
        &self,
        id: usize,
        receiver: Arc<Mutex<mpsc::Receiver<DownloadTask>>>,
    ) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();

        loop {
            let task = {
                let mut receiver = receiver.lock().await;
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    task = receiver.recv() => task,
                }
            };
            let Some(task) = task else {
                break;
            };

            debug!("Worker {} took {}", id, task.resource_url);
            self.process(task, &mut summary).await?;
        }

        debug!(
            "Worker {} finished: {} succeeded, {} failed",
            id, summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    /// Drives one task to a terminal status
    async fn process(&self, task: DownloadTask, summary: &mut DispatchSummary) -> Result<()> {
        let url = task.resource_url.as_str();
        let budget = task.attempt_budget.max(1);
        let mut attempts_this_run = 0;

        loop {
            self.store
                .update_download_status(url, DownloadStatus::InProgress, None)?;
            attempts_this_run += 1;

            let error = match self.fetcher.fetch(url, &self.options).await {
                Ok(result) => {
                    self.store
                        .update_download_status(url, DownloadStatus::Succeeded, None)?;
                    info!(
                        "Downloaded {} ({} bytes) to {}",
                        url,
                        result.bytes_written,
                        result.path.display()
                    );
                    summary.succeeded += 1;
                    return Ok(());
                }
                Err(e) => e,
            };

            let message = error.to_string();
            let record =
                self.store
                    .update_download_status(url, DownloadStatus::Failed, Some(&message))?;

            if !error.is_retryable() || attempts_this_run >= budget {
                warn!(
                    "Download of {} failed after {} attempts: {}",
                    url, record.attempts, message
                );
                summary.failed += 1;
                summary.failed_downloads.push(FailedItem::new(url, message));
                return Ok(());
            }

            if self.cancel.is_cancelled() {
                return self.leave_for_next_run(url);
            }

            self.store.mark_retrying(url);
            let delay = self.backoff.delay(attempts_this_run - 1);
            warn!(
                "Download of {} failed ({}), retrying in {:?}",
                url, message, delay
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return self.leave_for_next_run(url),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn leave_for_next_run(&self, url: &str) -> Result<()> {
        self.store
            .update_download_status(url, DownloadStatus::Pending, None)?;
        info!("Retry of {} left pending for the next run", url);
        Ok(())
    }
}
