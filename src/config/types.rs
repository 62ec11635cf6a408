use crate::extract::Platform;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Audio formats the downloader may be asked to produce
pub const SUPPORTED_FORMATS: &[&str] = &["mp3", "wav", "flac", "m4a"];

/// Main configuration structure for Media-Ripple
///
/// Every section has defaults, so a file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub platform: Platform,

    #[serde(default)]
    pub seeds: SeedConfig,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub renderer: RendererConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Default configuration for a platform, with no seeds
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            seeds: SeedConfig::default(),
            crawler: CrawlerConfig::default(),
            retry: RetryConfig::default(),
            download: DownloadConfig::default(),
            renderer: RendererConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Database file, defaulting to `<platform>.db`
    pub fn database_path(&self) -> PathBuf {
        match &self.output.database_path {
            Some(path) if !path.is_empty() => expand_home(path),
            _ => PathBuf::from(self.platform.default_database()),
        }
    }
}

/// Where the crawl starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Seed page URLs
    #[serde(default)]
    pub urls: Vec<String>,

    /// Search keywords, each turned into a search results page
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from seed URLs
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of download workers
    pub workers: usize,

    /// Capacity of the queue between the scheduler and the workers
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// Seconds between periodic checkpoints
    #[serde(rename = "checkpoint-interval-secs")]
    pub checkpoint_interval_secs: u64,

    /// Do not retry resources that failed in a previous run
    #[serde(rename = "skip-known-failures")]
    pub skip_known_failures: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            workers: 8,
            queue_capacity: 64,
            checkpoint_interval_secs: 30,
            skip_known_failures: false,
        }
    }
}

impl CrawlerConfig {
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs)
    }
}

/// Retry and backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry (milliseconds)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound on the exponential delay (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Random jitter added on top, as a percentage of the delay (0 disables)
    #[serde(rename = "jitter-percent")]
    pub jitter_percent: u64,

    /// Fetch attempts per resource
    #[serde(rename = "download-max-attempts")]
    pub download_max_attempts: u32,

    /// Render attempts per page
    #[serde(rename = "render-max-attempts")]
    pub render_max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_percent: 10,
            download_max_attempts: 3,
            render_max_attempts: 2,
        }
    }
}

/// Media download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory downloaded files are written to (`~` expands to $HOME)
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Audio quality passed to the downloader (e.g. "192")
    pub quality: String,

    /// Audio container/codec, one of [`SUPPORTED_FORMATS`]
    pub format: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: "~/Music/Downloads".to_string(),
            quality: "192".to_string(),
            format: "mp3".to_string(),
        }
    }
}

impl DownloadConfig {
    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_home(&self.output_dir)
    }
}

/// Page renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-page timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    #[serde(rename = "wait-for-dynamic-content")]
    pub wait_for_dynamic_content: bool,

    /// Scroll passes to trigger lazy loading
    #[serde(rename = "scroll-count")]
    pub scroll_count: u32,

    pub headless: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("media-ripple/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            wait_for_dynamic_content: true,
            scroll_count: 10,
            headless: true,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file (defaults to `<platform>.db`)
    #[serde(rename = "database-path", skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

/// Expands a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(rest.trim_start_matches('/'));
            }
        }
    }
    PathBuf::from(path)
}
