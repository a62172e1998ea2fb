//! Crawl frontier: pending work, the visited set and drain detection
//!
//! Every discovered URL goes through [`Frontier::submit`], which applies the
//! depth bound, the scope filter and the visited-set check in that order.
//! Workers pull admitted items with [`Frontier::next_work`] and must report
//! back through [`Dispatch::complete`]. The frontier is drained once nothing
//! is pending and nothing is in flight.

use crate::state::WorkState;
use crate::url::{Admission, UrlFilter};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, warn};
use url::Url;

/// A URL admitted for crawling, with its distance from the seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub url: Url,
    pub depth: u32,
}

/// Normalized URLs seen during this run
///
/// Grows monotonically. [`VisitedSet::insert`] is the single linearization
/// point that guarantees a URL is dispatched at most once.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically marks `url` as seen; returns false if it already was
    pub fn insert(&self, url: &Url) -> bool {
        self.lock().insert(url.as_str().to_string())
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.lock().contains(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
struct Queue {
    pending: VecDeque<WorkItem>,
    in_flight: usize,
}

#[derive(Debug, Default)]
struct Counters {
    admitted: AtomicU64,
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    depth_exceeded: AtomicU64,
    out_of_scope: AtomicU64,
    excluded: AtomicU64,
    already_visited: AtomicU64,
}

/// Point-in-time view of the frontier counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub admitted: u64,
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub depth_exceeded: u64,
    pub out_of_scope: u64,
    pub excluded: u64,
    pub already_visited: u64,
}

impl FrontierStats {
    /// Total number of URLs the frontier refused
    pub fn dropped(&self) -> u64 {
        self.depth_exceeded + self.out_of_scope + self.excluded + self.already_visited
    }

    /// Dispatches that have reported back
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}

/// Pending work plus the bookkeeping needed to detect termination
pub struct Frontier {
    queue: Mutex<Queue>,
    visited: VisitedSet,
    filter: UrlFilter,
    max_depth: u32,
    changed: Notify,
    counters: Counters,
}

impl Frontier {
    pub fn new(filter: UrlFilter, max_depth: u32) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            visited: VisitedSet::new(),
            filter,
            max_depth,
            changed: Notify::new(),
            counters: Counters::default(),
        }
    }

    /// Offers a discovered URL at the given depth
    ///
    /// Returns [`WorkState::Admitted`] if the URL was queued, otherwise the
    /// reason it was dropped.
    pub fn submit(&self, url: Url, depth: u32) -> WorkState {
        let state = self.admit(&url, depth);

        match state {
            WorkState::Admitted => {
                self.counters.admitted.fetch_add(1, Ordering::Relaxed);
                self.lock_queue()
                    .pending
                    .push_back(WorkItem { url, depth });
                self.changed.notify_waiters();
            }
            dropped => {
                self.count_drop(dropped);
                debug!("Dropped {} [depth {}]: {}", url, depth, dropped);
            }
        }

        state
    }

    fn admit(&self, url: &Url, depth: u32) -> WorkState {
        if depth > self.max_depth {
            return WorkState::DepthExceeded;
        }

        match self.filter.check(url) {
            Admission::Admitted => {}
            Admission::OutOfScope => return WorkState::OutOfScope,
            Admission::Excluded => return WorkState::Excluded,
        }

        if !self.visited.insert(url) {
            return WorkState::AlreadyVisited;
        }

        WorkState::Admitted
    }

    fn count_drop(&self, state: WorkState) {
        let counter = match state {
            WorkState::DepthExceeded => &self.counters.depth_exceeded,
            WorkState::OutOfScope => &self.counters.out_of_scope,
            WorkState::Excluded => &self.counters.excluded,
            WorkState::AlreadyVisited => &self.counters.already_visited,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Waits for the next item, or returns `None` once the frontier is drained
    pub async fn next_work(self: &Arc<Self>) -> Option<Dispatch> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut queue = self.lock_queue();
                if let Some(item) = queue.pending.pop_front() {
                    queue.in_flight += 1;
                    self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
                    return Some(Dispatch {
                        frontier: Arc::clone(self),
                        item,
                        finished: false,
                    });
                }
                if queue.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    fn finish(&self, outcome: WorkState) -> u64 {
        let counter = match outcome {
            WorkState::Completed => &self.counters.completed,
            _ => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        {
            let mut queue = self.lock_queue();
            queue.in_flight = queue.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();

        self.stats().finished()
    }

    /// Number of items waiting to be dispatched
    pub fn pending(&self) -> usize {
        self.lock_queue().pending.len()
    }

    /// Number of dispatched items that have not completed yet
    pub fn in_flight(&self) -> usize {
        self.lock_queue().in_flight
    }

    /// True when nothing is pending and nothing is in flight
    pub fn is_drained(&self) -> bool {
        let queue = self.lock_queue();
        queue.pending.is_empty() && queue.in_flight == 0
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    pub fn stats(&self) -> FrontierStats {
        let c = &self.counters;
        FrontierStats {
            admitted: c.admitted.load(Ordering::Relaxed),
            dispatched: c.dispatched.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            depth_exceeded: c.depth_exceeded.load(Ordering::Relaxed),
            out_of_scope: c.out_of_scope.load(Ordering::Relaxed),
            excluded: c.excluded.load(Ordering::Relaxed),
            already_visited: c.already_visited.load(Ordering::Relaxed),
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An item handed to a worker
///
/// Must be finished with [`Dispatch::complete`]. Dropping it unfinished
/// (for instance when the worker panics) records the item as failed, so
/// the frontier can still drain.
pub struct Dispatch {
    frontier: Arc<Frontier>,
    item: WorkItem,
    finished: bool,
}

impl Dispatch {
    pub fn item(&self) -> &WorkItem {
        &self.item
    }

    pub fn url(&self) -> &Url {
        &self.item.url
    }

    pub fn depth(&self) -> u32 {
        self.item.depth
    }

    /// Submits a link found on this page at the next depth
    pub fn submit_child(&self, url: Url) -> WorkState {
        self.frontier.submit(url, self.item.depth + 1)
    }

    /// Reports the outcome and returns how many dispatches have finished so far
    ///
    /// Children must be submitted before this is called.
    pub fn complete(mut self, outcome: WorkState) -> u64 {
        self.finished = true;
        self.frontier.finish(outcome)
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Dispatch for {} dropped without completing", self.item.url);
            self.frontier.finish(WorkState::Failed);
        }
    }
}
