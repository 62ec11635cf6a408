//! Link extraction module
//!
//! Turns a rendered document into two lists: pages the scheduler should visit
//! next and resources the dispatcher should download. Each supported platform
//! knows which URL shapes are which; everything off-platform is dropped.
//!
//! # Platforms
//!
//! - `YouTube`: videos (`/watch?v=`, `youtu.be/<id>`, `/shorts/<id>`) are
//!   resources; channels, playlists and search results are pages
//! - `SoundCloud`: `/<artist>/<track>` is a resource; artist profiles, sets
//!   and the discover/search/charts sections are pages

mod anchors;
mod soundcloud;
mod youtube;

pub use anchors::collect_anchors;

use crate::url::host_matches_any;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// A rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// URL the content was served from (after redirects)
    pub url: String,

    pub html: String,
}

impl Document {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Links found on one page, in document order with duplicates removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkExtraction {
    pub page_links: Vec<String>,
    pub resource_links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkKind {
    Page(String),
    Resource(String),
}

/// Media platforms the crawler understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    SoundCloud,
}

impl Platform {
    pub fn all() -> [Self; 2] {
        [Self::YouTube, Self::SoundCloud]
    }

    /// Lowercase name used on the command line and for the default database
    pub fn name(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::SoundCloud => "soundcloud",
        }
    }

    fn hosts(&self) -> &'static [&'static str] {
        match self {
            Self::YouTube => youtube::HOSTS,
            Self::SoundCloud => soundcloud::HOSTS,
        }
    }

    /// Picks the platform a URL belongs to, if any
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url.trim()).ok()?;
        Self::all().into_iter().find(|platform| platform.owns(&parsed))
    }

    /// Returns true if the URL is hosted on this platform
    pub fn owns(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| host_matches_any(self.hosts(), &host.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    /// Whether seeds can be generated from search keywords
    pub fn supports_keywords(&self) -> bool {
        matches!(self, Self::YouTube)
    }

    /// Search results page for a keyword, on platforms that support it
    pub fn search_url(&self, keyword: &str) -> Option<String> {
        match self {
            Self::YouTube => Some(youtube::search_url(keyword)),
            Self::SoundCloud => None,
        }
    }

    /// Default SQLite file for this platform's crawl state
    pub fn default_database(&self) -> String {
        format!("{}.db", self.name())
    }

    pub(crate) fn classify(&self, url: &Url) -> Option<LinkKind> {
        if !self.owns(url) {
            return None;
        }
        match self {
            Self::YouTube => youtube::classify(url),
            Self::SoundCloud => soundcloud::classify(url),
        }
    }

    /// Splits a document's links into pages and resources
    ///
    /// Relative links resolve against the document URL, falling back to
    /// `current_url` if the document does not carry a usable one.
    pub fn extract_links(
        &self,
        document: &Document,
        current_url: &str,
        current_depth: u32,
    ) -> LinkExtraction {
        let base = match Url::parse(&document.url).or_else(|_| Url::parse(current_url)) {
            Ok(base) => base,
            Err(_) => return LinkExtraction::default(),
        };

        let mut extraction = LinkExtraction::default();
        let mut seen_pages = HashSet::new();
        let mut seen_resources = HashSet::new();

        for link in collect_anchors(&document.html, &base) {
            match self.classify(&link) {
                Some(LinkKind::Page(url)) => {
                    if seen_pages.insert(url.clone()) {
                        extraction.page_links.push(url);
                    }
                }
                Some(LinkKind::Resource(url)) => {
                    if seen_resources.insert(url.clone()) {
                        extraction.resource_links.push(url);
                    }
                }
                None => {}
            }
        }

        debug!(
            "Extracted {} pages and {} resources from {} (depth {})",
            extraction.page_links.len(),
            extraction.resource_links.len(),
            current_url,
            current_depth
        );

        extraction
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Ok(Self::YouTube),
            "soundcloud" => Ok(Self::SoundCloud),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}
