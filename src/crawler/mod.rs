//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The frontier: pending work, visited set and drain detection
//! - Per-domain politeness scheduling
//! - HTTP fetching
//! - HTML parsing and metadata extraction
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
pub mod frontier;
mod parser;
mod scheduler;

pub use coordinator::{Coordinator, CrawlReport};
pub use fetcher::{
    build_http_client, fetch_url, fetch_with_retries, FetchError, FetchedPage, RETRY_BACKOFF,
};
pub use frontier::{Dispatch, Frontier, FrontierStats, VisitedSet, WorkItem};
pub use parser::{extract, extract_with_base, ExtractedPage, ParseError};
pub use scheduler::{DomainPermit, Scheduler};

use crate::config::Config;
use crate::TrawlError;

/// Runs a complete crawl operation
///
/// Convenience entry point equivalent to `Coordinator::new(config, fresh)`
/// followed by `run()`.
pub async fn crawl(config: Config, fresh: bool) -> Result<CrawlReport, TrawlError> {
    Coordinator::new(config, fresh).await?.run().await
}
