//! Per-domain politeness gate
//!
//! This module handles:
//! - Capping the number of in-flight requests per domain
//! - A uniformly random delay before every dispatch
//! - Per-domain request counting
//!
//! Each domain gets its own [`DomainState`], so two domains never wait on
//! each other.

use crate::config::CrawlerConfig;
use crate::state::DomainState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Permission to send one request to a domain
///
/// The domain's concurrency slot is released when the permit is dropped.
#[derive(Debug)]
pub struct DomainPermit {
    domain: String,
    delay: Duration,
    _permit: OwnedSemaphorePermit,
}

impl DomainPermit {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The politeness delay that was slept before this permit was granted
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Scheduler owns the per-domain gates
pub struct Scheduler {
    /// Per-domain state tracking
    domain_states: Mutex<HashMap<String, DomainState>>,

    /// Concurrent requests allowed per domain
    parallelism: usize,

    /// Bounds of the randomized delay, in milliseconds
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl Scheduler {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            domain_states: Mutex::new(HashMap::new()),
            parallelism: config.per_domain_parallelism as usize,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms.max(config.min_delay_ms),
        }
    }

    /// Waits until a request to `domain` is allowed
    ///
    /// 1. Acquires one of the domain's concurrency slots
    /// 2. Sleeps a random delay in `[min_delay, max_delay]`
    /// 3. Records the request against the domain
    pub async fn acquire(&self, domain: &str) -> Result<DomainPermit, AcquireError> {
        let semaphore = self.semaphore_for(domain);
        let permit = semaphore.acquire_owned().await?;

        let delay = self.politeness_delay();
        if !delay.is_zero() {
            tracing::trace!("Waiting {:?} before requesting {}", delay, domain);
            tokio::time::sleep(delay).await;
        }

        self.record_request(domain);

        Ok(DomainPermit {
            domain: domain.to_string(),
            delay,
            _permit: permit,
        })
    }

    fn semaphore_for(&self, domain: &str) -> Arc<Semaphore> {
        let mut states = self.lock_states();
        let state = states
            .entry(domain.to_string())
            .or_insert_with(|| DomainState::new(self.parallelism));
        Arc::clone(&state.permits)
    }

    /// Draws the delay to sleep before the next dispatch
    pub fn politeness_delay(&self) -> Duration {
        if self.max_delay_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::random_range(self.min_delay_ms..=self.max_delay_ms);
        Duration::from_millis(ms)
    }

    fn record_request(&self, domain: &str) {
        let mut states = self.lock_states();
        if let Some(state) = states.get_mut(domain) {
            state.record_request();
        }
    }

    /// Number of requests dispatched to a domain so far
    pub fn request_count(&self, domain: &str) -> u32 {
        self.lock_states()
            .get(domain)
            .map(|s| s.request_count)
            .unwrap_or(0)
    }

    /// Number of distinct domains seen by the scheduler
    pub fn domain_count(&self) -> usize {
        self.lock_states().len()
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, DomainState>> {
        self.domain_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
