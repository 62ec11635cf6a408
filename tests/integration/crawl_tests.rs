//! Integration tests for the crawler
//!
//! These tests drive full runs through the [`Coordinator`] with in-process
//! page and media fakes, and use on-disk SQLite databases to check that an
//! interrupted crawl picks up where it stopped.

use async_trait::async_trait;
use media_ripple::config::Config;
use media_ripple::crawler::{
    Coordinator, FetchError, FetchOptions, FetchResult, MediaFetcher, PageRenderer, RenderError,
    RenderOptions,
};
use media_ripple::extract::Document;
use media_ripple::storage::{MemoryStorage, RunStatus, SqliteStorage, StateStore, StoreOptions};
use media_ripple::{DownloadStatus, Platform};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Serves canned HTML, records renders, and can cancel the run on a given page
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl FakeSite {
    fn page(mut self, url: &str, links: &[&str]) -> Self {
        let html: String = links
            .iter()
            .map(|link| format!(r#"<a href="{}">link</a>"#, link))
            .collect();
        self.pages
            .insert(url.to_string(), format!("<html><body>{}</body></html>", html));
        self
    }

    fn cancel_on(mut self, url: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((url.to_string(), token));
        self
    }

    fn renders(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn render_count(&self, url: &str) -> usize {
        self.renders().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageRenderer for FakeSite {
    async fn render(&self, url: &str, _options: &RenderOptions) -> Result<Document, RenderError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == url {
                token.cancel();
            }
        }
        self.pages
            .get(url)
            .map(|html| Document::new(url, html.as_str()))
            .ok_or(RenderError::NotFound)
    }
}

/// Replays scripted failures per resource, then succeeds
#[derive(Default)]
struct FakeDownloader {
    failures: Mutex<HashMap<String, Vec<FetchError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    fn failing(self, url: &str, errors: Vec<FetchError>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), errors);
        self
    }

    fn fetch_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn total_fetches(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaFetcher for FakeDownloader {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchResult, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(errors) = self.failures.lock().unwrap().get_mut(url) {
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
        }
        Ok(FetchResult {
            bytes_written: 1024,
            path: options.output_dir.join("track.mp3"),
        })
    }
}

/// Creates a test configuration with fast retries
fn create_test_config(platform: Platform, max_depth: u32) -> Config {
    let mut config = Config::for_platform(platform);
    config.crawler.max_depth = max_depth;
    config.crawler.workers = 2;
    config.crawler.queue_capacity = 4;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 4;
    config.retry.jitter_percent = 0;
    config.download.output_dir = "/tmp/media-ripple-tests".to_string();
    config
}

fn memory_store() -> Arc<StateStore> {
    Arc::new(StateStore::new(
        Box::new(MemoryStorage::new()),
        StoreOptions::default(),
    ))
}

fn sqlite_store(path: &Path, options: StoreOptions) -> Arc<StateStore> {
    let storage = SqliteStorage::new(path).expect("Failed to open database");
    Arc::new(StateStore::open(Box::new(storage), options).expect("Failed to restore state"))
}

fn seeds(urls: &[&str]) -> Vec<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

const LABEL: &str = "https://soundcloud.com/label";
const ALPHA: &str = "https://soundcloud.com/alpha";
const BETA: &str = "https://soundcloud.com/beta";
const GAMMA: &str = "https://soundcloud.com/gamma";

#[tokio::test]
async fn test_seed_fanout_one_level() {
    let site = Arc::new(
        FakeSite::default()
            .page(
                LABEL,
                &["/alpha", "/beta", "/gamma", "/label/first", "/label/second"],
            )
            .page(ALPHA, &["/delta"])
            .page(BETA, &["/epsilon"])
            .page(GAMMA, &[]),
    );
    let downloader = Arc::new(FakeDownloader::default());
    let coordinator = Coordinator::new(
        create_test_config(Platform::SoundCloud, 1),
        memory_store(),
        site.clone(),
        downloader.clone(),
    );

    let report = coordinator.run(&seeds(&[LABEL])).await.unwrap();

    assert_eq!(site.renders().len(), 4);
    assert_eq!(report.pages_visited, 4);
    assert_eq!(report.resources_discovered, 2);
    assert_eq!(report.downloads_succeeded, 2);
    assert_eq!(downloader.total_fetches(), 2);
    assert!(!report.cancelled);

    // Depth 2 pages are never queued
    assert_eq!(site.render_count("https://soundcloud.com/delta"), 0);
    assert_eq!(coordinator.store().frontier_len(), 0);
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let track = "https://soundcloud.com/label/first";
    let site = Arc::new(FakeSite::default().page(LABEL, &["/label/first"]));
    let downloader = Arc::new(FakeDownloader::default().failing(
        track,
        vec![
            FetchError::NetworkError("connection reset".to_string()),
            FetchError::NetworkError("connection reset".to_string()),
        ],
    ));
    let coordinator = Coordinator::new(
        create_test_config(Platform::SoundCloud, 0),
        memory_store(),
        site,
        downloader.clone(),
    );

    let report = coordinator.run(&seeds(&[LABEL])).await.unwrap();

    let record = coordinator.store().download_record(track).unwrap();
    assert_eq!(record.status, DownloadStatus::Succeeded);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.last_error, None);
    assert_eq!(report.downloads_succeeded, 1);
    assert_eq!(report.downloads_failed, 0);
    assert_eq!(downloader.fetch_count(track), 3);
}

#[tokio::test]
async fn test_unavailable_resource_is_not_retried() {
    let track = "https://soundcloud.com/label/first";
    let site = Arc::new(FakeSite::default().page(LABEL, &["/label/first"]));
    let downloader = Arc::new(
        FakeDownloader::default()
            .failing(track, vec![FetchError::NotAvailable("track removed".to_string())]),
    );
    let coordinator = Coordinator::new(
        create_test_config(Platform::SoundCloud, 0),
        memory_store(),
        site,
        downloader.clone(),
    );

    let report = coordinator.run(&seeds(&[LABEL])).await.unwrap();

    let record = coordinator.store().download_record(track).unwrap();
    assert_eq!(record.status, DownloadStatus::Failed);
    assert_eq!(record.attempts, 1);
    assert!(record.last_error.unwrap().contains("track removed"));
    assert_eq!(downloader.fetch_count(track), 1);
    assert_eq!(report.downloads_failed, 1);
    assert_eq!(report.failed_downloads[0].url, track);
}

#[tokio::test]
async fn test_shared_resource_downloaded_once() {
    let site = Arc::new(
        FakeSite::default()
            .page(
                "https://youtube.com/@first",
                &["/@second", "/watch?v=shared"],
            )
            .page(
                "https://youtube.com/@second",
                &["https://youtu.be/shared", "/watch?v=shared&si=abc"],
            ),
    );
    let downloader = Arc::new(FakeDownloader::default());
    let coordinator = Coordinator::new(
        create_test_config(Platform::YouTube, 1),
        memory_store(),
        site,
        downloader.clone(),
    );

    let report = coordinator
        .run(&seeds(&["https://youtube.com/@first"]))
        .await
        .unwrap();

    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.resources_discovered, 1);
    assert_eq!(downloader.fetch_count("https://youtube.com/watch?v=shared"), 1);
    assert_eq!(downloader.total_fetches(), 1);
}

#[tokio::test]
async fn test_cycles_are_visited_once() {
    let site = Arc::new(
        FakeSite::default()
            .page(ALPHA, &["/beta", "/alpha"])
            .page(BETA, &["/alpha", "https://www.soundcloud.com/beta/"]),
    );
    let coordinator = Coordinator::new(
        create_test_config(Platform::SoundCloud, 5),
        memory_store(),
        site.clone(),
        Arc::new(FakeDownloader::default()),
    );

    let report = coordinator.run(&seeds(&[ALPHA])).await.unwrap();

    assert_eq!(report.pages_visited, 2);
    assert_eq!(site.render_count(ALPHA), 1);
    assert_eq!(site.render_count(BETA), 1);
}

#[tokio::test]
async fn test_missing_page_is_reported() {
    let site = Arc::new(FakeSite::default().page(LABEL, &["/alpha"]));
    let coordinator = Coordinator::new(
        create_test_config(Platform::SoundCloud, 1),
        memory_store(),
        site.clone(),
        Arc::new(FakeDownloader::default()),
    );

    let report = coordinator.run(&seeds(&[LABEL])).await.unwrap();

    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.failed_pages.len(), 1);
    assert_eq!(report.failed_pages[0].url, ALPHA);
    // Not found is permanent, so there is exactly one attempt
    assert_eq!(site.render_count(ALPHA), 1);
}

#[tokio::test]
async fn test_interrupted_crawl_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("soundcloud.db");
    let downloader = Arc::new(FakeDownloader::default());

    // First run stops while visiting alpha; beta is still queued
    let cancel = CancellationToken::new();
    let first_site = Arc::new(
        FakeSite::default()
            .page(LABEL, &["/alpha", "/beta", "/label/one"])
            .page(ALPHA, &["/alpha/two"])
            .page(BETA, &["/beta/three"])
            .cancel_on(ALPHA, cancel.clone()),
    );
    let first = Coordinator::new(
        create_test_config(Platform::SoundCloud, 2),
        sqlite_store(&db_path, StoreOptions::default()),
        first_site.clone(),
        downloader.clone(),
    )
    .with_cancellation_token(cancel);

    let report = first.run(&seeds(&[LABEL])).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.pages_visited, 2);
    assert_eq!(first_site.render_count(BETA), 0);
    assert_eq!(
        first.store().latest_run().unwrap().unwrap().status,
        RunStatus::Interrupted
    );
    drop(first);

    // Second run over the same database with the same seed
    let second_site = Arc::new(
        FakeSite::default()
            .page(LABEL, &["/alpha", "/beta", "/label/one"])
            .page(ALPHA, &["/alpha/two"])
            .page(BETA, &["/beta/three"]),
    );
    let second = Coordinator::new(
        create_test_config(Platform::SoundCloud, 2),
        sqlite_store(&db_path, StoreOptions::default()),
        second_site.clone(),
        downloader.clone(),
    );

    let report = second.run(&seeds(&[LABEL])).await.unwrap();
    assert!(!report.cancelled);
    assert_eq!(second_site.renders(), vec![BETA.to_string()]);
    // Downloads carried over from the first run are not rediscovered
    assert_eq!(report.resources_discovered, 1);

    for track in [
        "https://soundcloud.com/label/one",
        "https://soundcloud.com/alpha/two",
        "https://soundcloud.com/beta/three",
    ] {
        assert_eq!(downloader.fetch_count(track), 1, "{}", track);
        assert_eq!(
            second.store().download_record(track).unwrap().status,
            DownloadStatus::Succeeded
        );
    }
    assert_eq!(second.store().stats().frontier, 0);
    assert_eq!(second.store().stats().visited, 3);
}

#[tokio::test]
async fn test_completed_crawl_is_not_repeated() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("soundcloud.db");
    let downloader = Arc::new(FakeDownloader::default());
    let site = Arc::new(FakeSite::default().page(LABEL, &["/label/one"]));

    for _ in 0..2 {
        let coordinator = Coordinator::new(
            create_test_config(Platform::SoundCloud, 1),
            sqlite_store(&db_path, StoreOptions::default()),
            site.clone(),
            downloader.clone(),
        );
        coordinator.run(&seeds(&[LABEL])).await.unwrap();
    }

    assert_eq!(site.render_count(LABEL), 1);
    assert_eq!(downloader.total_fetches(), 1);
}

async fn run_with_prior_failure(skip_known_failures: bool) -> Arc<FakeDownloader> {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("soundcloud.db");
    let track = "https://soundcloud.com/label/one";
    let options = StoreOptions {
        max_attempts: 3,
        skip_known_failures,
    };

    let site = Arc::new(FakeSite::default().page(LABEL, &["/label/one"]));

    let first = Coordinator::new(
        create_test_config(Platform::SoundCloud, 1),
        sqlite_store(&db_path, options),
        site.clone(),
        Arc::new(
            FakeDownloader::default()
                .failing(track, vec![FetchError::NotAvailable("private".to_string())]),
        ),
    );
    first.run(&seeds(&[LABEL])).await.unwrap();
    drop(first);

    // Only the restored record can bring the track back into this run
    let downloader = Arc::new(FakeDownloader::default().failing(
        track,
        vec![FetchError::NetworkError("timeout".to_string()); 3],
    ));
    let second = Coordinator::new(
        create_test_config(Platform::SoundCloud, 1),
        sqlite_store(&db_path, options),
        site,
        downloader.clone(),
    );
    second.run(&seeds(&[LABEL])).await.unwrap();
    downloader
}

#[tokio::test]
async fn test_prior_failure_gets_single_attempt() {
    let downloader = run_with_prior_failure(false).await;
    assert_eq!(downloader.fetch_count("https://soundcloud.com/label/one"), 1);
}

#[tokio::test]
async fn test_known_failures_can_be_skipped() {
    let downloader = run_with_prior_failure(true).await;
    assert_eq!(downloader.total_fetches(), 0);
}

#[tokio::test]
async fn test_storage_failure_aborts_run() {
    let store = Arc::new(StateStore::new(
        Box::new(MemoryStorage::new().fail_saves()),
        StoreOptions::default(),
    ));
    let coordinator = Coordinator::new(
        create_test_config(Platform::SoundCloud, 0),
        store,
        Arc::new(FakeSite::default().page(LABEL, &[])),
        Arc::new(FakeDownloader::default()),
    );

    let result = coordinator.run(&seeds(&[LABEL])).await;

    assert!(result.is_err());
    assert_eq!(
        coordinator.store().latest_run().unwrap().unwrap().status,
        RunStatus::Failed
    );
}

#[test]
fn test_output_dir_reaches_fetcher() {
    let config = create_test_config(Platform::YouTube, 0);
    let options = FetchOptions::from_config(&config.download);
    assert_eq!(options.output_dir, PathBuf::from("/tmp/media-ripple-tests"));
}
