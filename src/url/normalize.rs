use crate::UrlError;
use url::Url;

/// Normalizes a URL into the form used as the visited-set key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Only `http` and `https` are accepted
/// 3. Lowercase the host
/// 4. Drop the port when it is the scheme default
/// 5. Empty path becomes `/`
/// 6. Remove the fragment
///
/// The query string is kept verbatim, so `?b=2&a=1` and `?a=1&b=2` are
/// different pages.
///
/// # Examples
///
/// ```
/// use site_trawler::url::normalize_url;
///
/// let url = normalize_url("http://EXAMPLE.test:80#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.test/");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return Err(UrlError::MissingDomain),
    };
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    if url.path().is_empty() {
        url.set_path("/");
    }

    url.set_fragment(None);

    Ok(url)
}
