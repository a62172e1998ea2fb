//! HTML parser for extracting page metadata and links
//!
//! This module handles parsing HTML content to extract:
//! - The page title
//! - The meta description
//! - Image sources
//! - Links to follow (from `<a href>` tags)

use crate::storage::PageRecord;
use crate::url::UrlFilter;
use chrono::Utc;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

/// How many leading bytes are inspected when deciding whether a body is binary
const SNIFF_LEN: usize = 1024;

/// Reasons a fetched body could not be treated as markup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unsupported content type: {0}")]
    NotMarkup(String),

    #[error("body looks binary")]
    Binary,
}

/// Extracted information from a page
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// The record to persist
    pub record: PageRecord,

    /// Resolved link targets, in document order, ready to be submitted
    pub links: Vec<Url>,

    /// Set when the page could not be parsed and the record is degraded
    pub parse_error: Option<ParseError>,
}

impl ExtractedPage {
    fn degraded(url: &Url, error: ParseError) -> Self {
        Self {
            record: PageRecord::degraded(url.as_str()),
            links: Vec::new(),
            parse_error: Some(error),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.parse_error.is_some()
    }
}

/// Extracts metadata and links from a fetched page
///
/// Relative references are resolved against `url`. A body that is not
/// markup yields a degraded record carrying only the URL.
///
/// # Example
///
/// ```
/// use site_trawler::crawler::extract;
/// use url::Url;
///
/// let html = br#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let url = Url::parse("https://example.test/").unwrap();
/// let page = extract(&url, "text/html", html);
/// assert_eq!(page.record.title, "Test");
/// assert_eq!(page.links[0].as_str(), "https://example.test/page");
/// ```
pub fn extract(url: &Url, content_type: &str, body: &[u8]) -> ExtractedPage {
    extract_with_base(url, url, content_type, body)
}

/// Like [`extract`], but resolves references against `base`
///
/// Used after redirects: the record keeps the requested URL while links are
/// resolved against the URL that actually served the content.
pub fn extract_with_base(url: &Url, base: &Url, content_type: &str, body: &[u8]) -> ExtractedPage {
    match parse_page(url, base, content_type, body) {
        Ok(page) => page,
        Err(e) => ExtractedPage::degraded(url, e),
    }
}

fn parse_page(
    url: &Url,
    base: &Url,
    content_type: &str,
    body: &[u8],
) -> Result<ExtractedPage, ParseError> {
    check_markup(content_type, body)?;

    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let links = resolve_all(&document, "a[href]", "href", base, UrlFilter::resolve);
    let images = resolve_all(&document, "img[src]", "src", base, resolve_image);

    let record = PageRecord {
        url: url.as_str().to_string(),
        title: extract_title(&document),
        description: extract_description(&document),
        images: images.iter().map(|u| u.as_str().to_string()).collect(),
        links: links.iter().map(|u| u.as_str().to_string()).collect(),
        fetched_at: Utc::now(),
    };

    Ok(ExtractedPage {
        record,
        links,
        parse_error: None,
    })
}

/// Accepts HTML/XHTML (or an unlabelled body) that does not look binary
fn check_markup(content_type: &str, body: &[u8]) -> Result<(), ParseError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if !mime.is_empty() && !mime.contains("html") {
        return Err(ParseError::NotMarkup(mime));
    }

    if body[..body.len().min(SNIFF_LEN)].contains(&0) {
        return Err(ParseError::Binary);
    }

    Ok(())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Extracts `content` of the first `<meta name="description">`
fn extract_description(document: &Html) -> String {
    let Ok(selector) = Selector::parse("meta[name]") else {
        return String::new();
    };

    document
        .select(&selector)
        .find(|element| {
            element
                .value()
                .attr("name")
                .is_some_and(|name| name.trim().eq_ignore_ascii_case("description"))
        })
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .unwrap_or_default()
}

/// Resolves `attr` of every element matching `selector`, in document order
fn resolve_all(
    document: &Html,
    selector: &str,
    attr: &str,
    base: &Url,
    resolve: fn(&Url, &str) -> Option<Url>,
) -> Vec<Url> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .filter_map(|value| resolve(base, value))
        .collect()
}

/// Image sources are kept whatever their scheme; only empty ones are skipped
fn resolve_image(base: &Url, src: &str) -> Option<Url> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    base.join(src).ok()
}
