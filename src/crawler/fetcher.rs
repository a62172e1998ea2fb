//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Keeping redirects inside the crawl scope
//! - GET requests to fetch page content
//! - Error classification
//! - Optional retries for transient failures

use crate::config::UserAgentConfig;
use crate::url::UrlFilter;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Upper bound on the connect phase of a request
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Pause between retry attempts
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value (empty if absent)
    pub content_type: String,
    /// Raw body bytes
    pub body: Vec<u8>,
}

/// Reasons a fetch did not produce a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("redirect to {0} leaves the crawl scope")]
    OffsiteRedirect(String),

    #[error("failed to read body: {0}")]
    Body(String),
}

impl FetchError {
    /// Timeouts, network errors and 5xx responses may succeed on a retry
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status(code) => (500..600).contains(code),
            Self::OffsiteRedirect(_) | Self::Body(_) => false,
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed only while every hop is admitted by `scope`. A hop
/// that leaves the scope stops the redirect chain, and [`fetch_url`] reports
/// it as [`FetchError::OffsiteRedirect`].
///
/// # Example
///
/// ```no_run
/// use site_trawler::config::{ScopeConfig, UserAgentConfig};
/// use site_trawler::crawler::build_http_client;
/// use site_trawler::UrlFilter;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "SiteTrawler".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.test/about".to_string(),
///     contact_email: "ops@example.test".to_string(),
/// };
/// let scope = UrlFilter::new(&ScopeConfig {
///     allowed_domains: vec!["example.test".to_string()],
///     exclude_pattern: None,
/// })
/// .unwrap();
///
/// let client = build_http_client(&config, Duration::from_secs(15), scope).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    request_timeout: Duration,
    scope: UrlFilter,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(request_timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
        .redirect(scoped_redirects(scope))
        .gzip(true)
        .brotli(true)
        .build()
}

fn scoped_redirects(scope: UrlFilter) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if scope.admit(attempt.url()) {
            attempt.follow()
        } else {
            tracing::debug!("Not following redirect to {}", attempt.url());
            attempt.stop()
        }
    })
}

/// Fetches a URL once
///
/// A redirect that was not followed is reported as
/// [`FetchError::OffsiteRedirect`]; any other non-2xx final status is
/// reported as [`FetchError::Status`].
pub async fn fetch_url(client: &Client, url: &Url) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(FetchError::from_reqwest)?;

    let status = response.status();
    if status.is_redirection() {
        let target = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        return Err(FetchError::OffsiteRedirect(target));
    }
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Body(e.to_string())
        }
    })?;

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        content_type,
        body: body.to_vec(),
    })
}

/// Fetches a URL, retrying retryable failures up to `max_retries` times
pub async fn fetch_with_retries(
    client: &Client,
    url: &Url,
    max_retries: u32,
    backoff: Duration,
) -> Result<FetchedPage, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_url(client, url).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    "Fetch of {} failed ({}), retry {}/{}",
                    url,
                    e,
                    attempt,
                    max_retries
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.test/about".to_string(),
            contact_email: "admin@example.test".to_string(),
        }
    }

    fn scope(domains: &[&str]) -> UrlFilter {
        UrlFilter::new(&ScopeConfig {
            allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
            exclude_pattern: None,
        })
        .unwrap()
    }

    fn client() -> Client {
        build_http_client(
            &create_test_config(),
            Duration::from_secs(5),
            scope(&["127.0.0.1"]),
        )
        .unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Network("refused".into()).is_retryable());
        assert!(FetchError::Status(503).is_retryable());
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::Body("eof".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header(
                "user-agent",
                "TestCrawler/1.0 (+https://example.test/about; admin@example.test)",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html></html>", "text/html; charset=utf-8"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let page = fetch_url(&client(), &url(&server, "/")).await.unwrap();

        assert_eq!(page.status_code, 200);
        assert_eq!(page.content_type, "text/html; charset=utf-8");
        assert_eq!(page.body, b"<html></html>");
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetch_url(&client(), &url(&server, "/missing")).await;
        assert_eq!(result.unwrap_err(), FetchError::Status(404));
    }

    #[tokio::test]
    async fn test_fetch_follows_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", "/new"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let page = fetch_url(&client(), &url(&server, "/old")).await.unwrap();
        assert_eq!(page.final_url, url(&server, "/new"));
    }

    #[tokio::test]
    async fn test_redirect_out_of_scope_is_not_followed() {
        let server = MockServer::start().await;
        let port = server.address().port();
        Mock::given(method("GET"))
            .and(path("/go"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "location",
                format!("http://127.0.0.1:{}/offsite", port).as_str(),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/offsite"))
            .respond_with(ResponseTemplate::new(200).set_body_string("offsite"))
            .expect(0)
            .mount(&server)
            .await;

        let client = build_http_client(
            &create_test_config(),
            Duration::from_secs(5),
            scope(&["localhost"]),
        )
        .unwrap();
        let start = Url::parse(&format!("http://localhost:{}/go", port)).unwrap();
        let result = fetch_with_retries(&client, &start, 2, Duration::ZERO).await;

        assert_eq!(
            result.unwrap_err(),
            FetchError::OffsiteRedirect(format!("http://127.0.0.1:{}/offsite", port))
        );
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = build_http_client(
            &create_test_config(),
            Duration::from_secs(1),
            scope(&["127.0.0.1"]),
        )
        .unwrap();
        let result = fetch_url(&client, &url(&server, "/slow")).await;
        assert_eq!(result.unwrap_err(), FetchError::Timeout);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetch_with_retries(&client(), &url(&server, "/"), 0, Duration::ZERO).await;
        assert_eq!(result.unwrap_err(), FetchError::Status(500));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = fetch_with_retries(&client(), &url(&server, "/"), 2, Duration::ZERO).await;
        assert_eq!(result.unwrap_err(), FetchError::Status(503));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetch_with_retries(&client(), &url(&server, "/"), 3, Duration::ZERO).await;
        assert_eq!(result.unwrap_err(), FetchError::Status(404));
    }
}
