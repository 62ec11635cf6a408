//! Media fetching
//!
//! Downloads go through the external `yt-dlp` binary, which knows how to pull
//! audio from both supported platforms. The fetcher only has to build its
//! command line and make sense of how it failed.

use crate::config::DownloadConfig;
use crate::crawler::backoff::IsRetryable;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;

/// Where and how a resource should be saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub quality: String,
    pub format: String,
    pub output_dir: PathBuf,
}

impl FetchOptions {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            quality: config.quality.clone(),
            format: config.format.clone(),
            output_dir: config.resolved_output_dir(),
        }
    }
}

/// A completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub bytes_written: u64,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The resource is gone, private or region-locked
    #[error("not available: {0}")]
    NotAvailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    NetworkError(String),
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotAvailable(_))
    }
}

/// Saves a resource URL to disk
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchResult, FetchError>;
}

/// Fetcher that shells out to yt-dlp
pub struct YtDlpFetcher {
    binary_path: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Looks for `yt-dlp` on the PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    fn command(&self, url: &str, options: &FetchOptions) -> Command {
        let template = options.output_dir.join("%(title)s.%(ext)s");
        let mut command = Command::new(&self.binary_path);
        command
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg(&options.format)
            .arg("--audio-quality")
            .arg(&options.quality)
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--output")
            .arg(template)
            .arg(url)
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchResult, FetchError> {
        tokio::fs::create_dir_all(&options.output_dir)
            .await
            .map_err(|e| {
                FetchError::NetworkError(format!(
                    "cannot create {}: {}",
                    options.output_dir.display(),
                    e
                ))
            })?;

        let output = self
            .command(url, options)
            .output()
            .await
            .map_err(|e| FetchError::NetworkError(format!("failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| FetchError::NetworkError("yt-dlp reported no output file".to_string()))?;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            FetchError::NetworkError(format!("output file {} missing: {}", path.display(), e))
        })?;

        Ok(FetchResult {
            bytes_written: metadata.len(),
            path,
        })
    }
}

/// Maps yt-dlp's stderr to a fetch error
pub fn classify_failure(stderr: &str) -> FetchError {
    let message = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| line.starts_with("ERROR"))
        .or_else(|| stderr.lines().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or("yt-dlp exited with an error")
        .to_string();

    let lowered = message.to_lowercase();
    if lowered.contains("429") || lowered.contains("too many requests") {
        FetchError::RateLimited(message)
    } else if [
        "unavailable",
        "private video",
        "not available",
        "404",
        "has been removed",
        "does not exist",
        "unsupported url",
    ]
    .iter()
    .any(|needle| lowered.contains(needle))
    {
        FetchError::NotAvailable(message)
    } else {
        FetchError::NetworkError(message)
    }
}
