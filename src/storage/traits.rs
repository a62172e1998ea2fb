//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{PageRecord, RunRecord, RunStatus, SaveOutcome, WritePolicy};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawler gives exclusive ownership of a backend to one collector
/// task, so implementations do not need to be shareable across threads,
/// only movable to one.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Stamps a run with its final status, finish time and counters
    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_dispatched: u64,
        pages_failed: u64,
    ) -> StorageResult<()>;

    // ===== Page Management =====

    /// Writes a page record, keyed by its URL
    ///
    /// Under [`WritePolicy::Upsert`] an existing record is replaced in one
    /// statement; under [`WritePolicy::Ignore`] it is left untouched and
    /// [`SaveOutcome::Duplicate`] is returned.
    fn save_page(&mut self, record: &PageRecord, policy: WritePolicy)
        -> StorageResult<SaveOutcome>;

    /// Gets a page by URL
    fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Loads every stored page, ordered by URL
    fn load_pages(&self) -> StorageResult<Vec<PageRecord>>;

    /// Gets total page count
    fn count_pages(&self) -> StorageResult<u64>;

    /// Removes every stored page, returning how many were deleted
    fn clear_pages(&mut self) -> StorageResult<u64>;
}
