//! SoundCloud URL shapes

use super::LinkKind;
use crate::url::normalize_url;
use url::Url;

pub(super) const HOSTS: &[&str] = &["soundcloud.com", "m.soundcloud.com", "www.soundcloud.com"];

/// Top-level sections that are browsable pages
const SITE_PAGES: &[&str] = &["discover", "search", "charts"];

/// Top-level paths that are not artist profiles
const RESERVED_ROOTS: &[&str] = &[
    "discover",
    "search",
    "charts",
    "stream",
    "you",
    "upload",
    "pages",
    "settings",
    "terms-of-use",
    "imprint",
    "jobs",
    "mobile",
    "pro",
    "signin",
    "logout",
    "notifications",
    "messages",
    "people",
    "tags",
];

/// Artist sub-pages worth crawling
const ARTIST_PAGES: &[&str] = &[
    "tracks",
    "likes",
    "reposts",
    "albums",
    "popular-tracks",
    "sets",
    "playlists",
];

/// Artist sub-paths that are never tracks
const ARTIST_RESERVED: &[&str] = &[
    "tracks",
    "likes",
    "reposts",
    "albums",
    "popular-tracks",
    "sets",
    "playlists",
    "followers",
    "following",
    "comments",
    "spotlight",
];

pub(super) fn classify(url: &Url) -> Option<LinkKind> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [root, ..] if SITE_PAGES.contains(root) => page(url),
        [root, ..] if RESERVED_ROOTS.contains(root) => None,
        [_artist] => page(url),
        [_artist, "sets", _set] => page(url),
        [_artist, section] if ARTIST_PAGES.contains(section) => page(url),
        [_artist, section] if ARTIST_RESERVED.contains(section) => None,
        [artist, track] => Some(LinkKind::Resource(format!(
            "https://soundcloud.com/{}/{}",
            artist, track
        ))),
        _ => None,
    }
}

fn page(url: &Url) -> Option<LinkKind> {
    normalize_url(url.as_str())
        .ok()
        .map(|normalized| LinkKind::Page(normalized.into()))
}
