//! Configuration module for Media-Ripple
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key has a default, so a run can also be configured entirely
//! from the command line starting at [`Config::for_platform`].
//!
//! # Example
//!
//! ```no_run
//! use media_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ripple.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    expand_home, Config, CrawlerConfig, DownloadConfig, OutputConfig, RendererConfig,
    RetryConfig, SeedConfig, SUPPORTED_FORMATS,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, compute_effective_hash, load_config, load_config_with_hash, parse_config,
};
pub use validation::{resolve_seeds, validate};
