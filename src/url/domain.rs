use url::Url;

/// Extracts the lowercase host from a URL
///
/// Returns `None` for URLs without a host. Ports are not part of the result.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_trawler::url::extract_domain;
///
/// let url = Url::parse("https://Docs.Example.TEST:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("docs.example.test".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the host without a leading `www.` label
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
