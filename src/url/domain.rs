use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use media_ripple::url::extract_domain;
///
/// let url = Url::parse("https://M.YouTube.com/watch?v=abc").unwrap();
/// assert_eq!(extract_domain(&url), Some("m.youtube.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks if a host belongs to a platform domain
///
/// A pattern written as `*.example.com` matches the bare domain and any
/// subdomain of it; any other pattern must match exactly.
pub fn host_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            host == base
                || (host.len() > base.len()
                    && host.ends_with(base)
                    && host.as_bytes()[host.len() - base.len() - 1] == b'.')
        }
        None => host == pattern,
    }
}

/// Returns true if the host matches any of the patterns
pub fn host_matches_any(patterns: &[&str], host: &str) -> bool {
    patterns.iter().any(|pattern| host_matches(pattern, host))
}
