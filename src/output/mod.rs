//! Output module for the JSON snapshot and stored statistics
//!
//! - `export`: writes every stored page as one pretty-printed JSON array
//! - `stats`: summarizes the store and the most recent run for `--stats`

pub mod export;
pub mod stats;

pub use export::{check_export_path, export_from_storage, export_records};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Export path {path} is not writable: {reason}")]
    NotWritable { path: PathBuf, reason: String },

    #[error("Failed to serialize snapshot: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
