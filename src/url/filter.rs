use super::matcher::matches_allowed;
use super::normalize::normalize_url;
use crate::config::ScopeConfig;
use crate::ConfigError;
use regex::Regex;
use std::fmt;
use url::Url;

/// Outcome of checking a URL against the crawl scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// In scope and not excluded
    Admitted,
    /// Host is not covered by any allowed domain
    OutOfScope,
    /// URL matches the exclusion pattern
    Excluded,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Admitted => "admitted",
            Self::OutOfScope => "out of scope",
            Self::Excluded => "excluded by pattern",
        };
        write!(f, "{}", s)
    }
}

/// Resolves discovered references and decides whether they belong to the crawl
///
/// The filter depends only on the static scope configuration, so a single
/// instance is shared by every worker without locking.
#[derive(Debug, Clone)]
pub struct UrlFilter {
    allowed_domains: Vec<String>,
    exclude: Option<Regex>,
}

impl UrlFilter {
    /// Builds a filter from the scope section of the configuration
    pub fn new(scope: &ScopeConfig) -> Result<Self, ConfigError> {
        let exclude = scope
            .exclude_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ConfigError::InvalidPattern(format!("Invalid exclude pattern: {}", e)))?;

        Ok(Self {
            allowed_domains: scope
                .allowed_domains
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
            exclude,
        })
    }

    /// Resolves an `href` value against the page it was found on
    ///
    /// Returns `None` for empty references, fragment-only references,
    /// `javascript:`, `mailto:`, `tel:` and `data:` targets, and anything that
    /// does not resolve to a valid http(s) URL.
    pub fn resolve(base: &Url, href: &str) -> Option<Url> {
        let href = href.trim();

        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let lower = href.to_ascii_lowercase();
        if ["javascript:", "mailto:", "tel:", "data:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
        {
            return None;
        }

        let joined = base.join(href).ok()?;
        normalize_url(joined.as_str()).ok()
    }

    /// Classifies a URL against the allowed domains and the exclusion pattern
    pub fn check(&self, url: &Url) -> Admission {
        let host = match url.host_str() {
            Some(host) => host.to_lowercase(),
            None => return Admission::OutOfScope,
        };

        if !self
            .allowed_domains
            .iter()
            .any(|pattern| matches_allowed(pattern, &host))
        {
            return Admission::OutOfScope;
        }

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(url.as_str()) {
                return Admission::Excluded;
            }
        }

        Admission::Admitted
    }

    /// Returns true if the URL may be crawled
    pub fn admit(&self, url: &Url) -> bool {
        self.check(url).is_admitted()
    }
}
