use std::fmt;

/// Lifecycle states of a discovered URL
///
/// A URL moves `Discovered -> Admitted -> Dispatched -> Completed | Failed`,
/// or ends early in one of the drop states when the frontier refuses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkState {
    // ===== Active States =====
    /// Found on a page (or given as the seed), not yet checked
    Discovered,

    /// Passed every frontier check and is waiting in the queue
    Admitted,

    /// Handed to a worker
    Dispatched,

    // ===== Terminal States =====
    /// Fetched and handed to the collector
    Completed,

    /// Fetch failed, or the worker gave up on the item
    Failed,

    // ===== Drop Reasons =====
    /// Discovered beyond the maximum depth
    DepthExceeded,

    /// Host is not covered by the allowed domains
    OutOfScope,

    /// URL matches the exclusion pattern
    Excluded,

    /// Normalized URL was already seen this run
    AlreadyVisited,
}

impl WorkState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Discovered | Self::Admitted | Self::Dispatched)
    }

    /// Returns true if the frontier refused the URL
    pub fn is_dropped(&self) -> bool {
        matches!(
            self,
            Self::DepthExceeded | Self::OutOfScope | Self::Excluded | Self::AlreadyVisited
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Admitted => "admitted",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::DepthExceeded => "depth_exceeded",
            Self::OutOfScope => "out_of_scope",
            Self::Excluded => "excluded",
            Self::AlreadyVisited => "already_visited",
        }
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
