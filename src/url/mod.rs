//! URL handling module for Media-Ripple
//!
//! This module provides URL normalization (the dedup key for every visited
//! page and download record) and host matching used to pick a platform.

mod domain;
mod normalize;

pub use domain::{extract_domain, host_matches, host_matches_any};
pub use normalize::normalize_url;

use crate::UrlError;

/// Normalizes a URL and returns it as the string key used by the state store
pub fn normalized_key(url_str: &str) -> Result<String, UrlError> {
    normalize_url(url_str).map(String::from)
}
