use super::domain::strip_www;

/// Checks if a host matches a domain pattern
///
/// 1. Exact match: `example.test` matches only `example.test`
/// 2. Wildcard match: `*.example.test` matches the bare domain and every
///    subdomain at any depth
///
/// Both arguments are expected to be lowercase already.
///
/// ```
/// use site_trawler::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.test", "example.test"));
/// assert!(matches_wildcard("*.example.test", "a.b.example.test"));
/// assert!(!matches_wildcard("example.test", "a.example.test"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}

/// Checks a host against an allowed-domain pattern, honouring the `www.` alias
///
/// An exact pattern also admits its `www.` twin: `example.test` allows
/// `www.example.test` and `www.example.test` allows `example.test`.
pub fn matches_allowed(pattern: &str, host: &str) -> bool {
    if matches_wildcard(pattern, host) {
        return true;
    }
    if pattern.starts_with("*.") {
        return false;
    }
    strip_www(pattern) == strip_www(host)
}
