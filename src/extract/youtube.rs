//! YouTube URL shapes

use super::LinkKind;
use crate::url::normalize_url;
use url::Url;

pub(super) const HOSTS: &[&str] = &["*.youtube.com", "youtu.be"];

/// Path prefixes whose next segment names a channel
const CHANNEL_PREFIXES: &[&str] = &["channel", "c", "user"];

pub(super) fn classify(url: &Url) -> Option<LinkKind> {
    let host = url.host_str()?.to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if host == "youtu.be" {
        return segments
            .first()
            .filter(|id| is_video_id(id))
            .map(|id| LinkKind::Resource(watch_url(id)));
    }

    match segments.as_slice() {
        ["watch", ..] => query_value(url, "v")
            .filter(|id| is_video_id(id))
            .map(|id| LinkKind::Resource(watch_url(&id))),
        ["shorts", id, ..] if is_video_id(id) => Some(LinkKind::Resource(watch_url(id))),
        [handle, ..] if handle.starts_with('@') && handle.len() > 1 => page(url),
        [prefix, _, ..] if CHANNEL_PREFIXES.contains(prefix) => page(url),
        ["playlist"] if query_value(url, "list").is_some() => page(url),
        ["results"] if query_value(url, "search_query").is_some() => page(url),
        _ => None,
    }
}

/// Builds the search results page for a keyword
pub(super) fn search_url(keyword: &str) -> String {
    format!(
        "https://youtube.com/results?search_query={}",
        urlencoding::encode(keyword.trim())
    )
}

fn watch_url(id: &str) -> String {
    format!("https://youtube.com/watch?v={}", id)
}

fn page(url: &Url) -> Option<LinkKind> {
    normalize_url(url.as_str())
        .ok()
        .map(|normalized| LinkKind::Page(normalized.into()))
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

fn is_video_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
