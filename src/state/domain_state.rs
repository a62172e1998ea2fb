use std::sync::Arc;
use tokio::sync::Semaphore;

/// Tracks the state of a domain during crawling
///
/// Each domain owns its own semaphore, so a slow domain never holds back
/// requests to another one.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Caps the number of in-flight requests to this domain
    pub permits: Arc<Semaphore>,

    /// Number of requests dispatched to this domain in the current crawl
    pub request_count: u32,
}

impl DomainState {
    /// Creates a new DomainState allowing `parallelism` concurrent requests
    pub fn new(parallelism: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(parallelism.max(1))),
            request_count: 0,
        }
    }

    /// Records that a request was dispatched to this domain
    pub fn record_request(&mut self) {
        self.request_count += 1;
    }
}
