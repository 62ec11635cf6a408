//! Media-Ripple: a resumable media crawler
//!
//! This crate walks the page graph of a media platform breadth-first from a set
//! of seed URLs, classifies every link as either a navigable page or a
//! downloadable resource, and downloads the resources through a bounded worker
//! pool. All crawl state lives in a single store that is checkpointed to SQLite
//! so an interrupted run picks up where it left off.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Media-Ripple operations
#[derive(Debug, Error)]
pub enum RippleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid download transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: state::DownloadStatus,
        to: state::DownloadStatus,
    },

    #[error("Invalid run phase transition: {from:?} -> {to:?}")]
    InvalidPhase {
        from: state::RunPhase,
        to: state::RunPhase,
    },

    #[error("Unknown download record: {0}")]
    UnknownDownload(String),

    #[error("Download worker failed: {0}")]
    Worker(String),

    #[error("Required tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Media-Ripple operations
pub type Result<T> = std::result::Result<T, RippleError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::Platform;
pub use state::{CrawlState, DownloadRecord, DownloadStatus, FrontierEntry, RunPhase};
pub use storage::StateStore;
pub use url::{extract_domain, normalize_url};
