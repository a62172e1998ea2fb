use crate::storage::WritePolicy;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Site-Trawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub scope: ScopeConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// URL the crawl starts from (depth 0)
    pub seed: String,

    /// Maximum depth to crawl from the seed URL
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of concurrent workers pulling from the frontier
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Maximum number of in-flight requests per domain
    #[serde(rename = "per-domain-parallelism", default = "default_parallelism")]
    pub per_domain_parallelism: u32,

    /// Lower bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "min-delay-ms", default)]
    pub min_delay_ms: u64,

    /// Upper bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Timeout applied to each individual request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Deadline for opening the store and probing the export path (seconds)
    #[serde(rename = "setup-timeout-secs", default = "default_setup_timeout")]
    pub setup_timeout_secs: u64,

    /// Retries for timeouts, network errors and 5xx responses
    #[serde(rename = "max-retries", default)]
    pub max_retries: u32,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.setup_timeout_secs)
    }
}

/// Which URLs the crawl may visit
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Domain patterns (e.g., "example.com" or "*.example.com")
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Regular expression; matching URLs are never admitted
    #[serde(rename = "exclude-pattern", default)]
    pub exclude_pattern: Option<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path of the JSON snapshot written after the crawl
    #[serde(rename = "export-path")]
    pub export_path: String,

    /// How a page that is already stored gets written
    #[serde(rename = "write-policy", default)]
    pub write_policy: WritePolicy,
}

fn default_workers() -> u32 {
    8
}

fn default_parallelism() -> u32 {
    4
}

fn default_max_delay_ms() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    15
}

fn default_setup_timeout() -> u64 {
    10
}
