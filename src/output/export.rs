//! JSON snapshot exporter
//!
//! The snapshot is a single JSON array with two-space indentation and a
//! trailing newline. Records are always written in URL order, so exporting
//! the same set of records twice produces identical bytes.

use super::{OutputError, OutputResult};
use crate::storage::{PageRecord, Storage};
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::{debug, info};

/// Writes `records` to `path`, replacing any previous snapshot
///
/// Returns the number of records written.
pub fn export_records(records: &[PageRecord], path: &Path) -> OutputResult<usize> {
    let mut sorted: Vec<&PageRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.url.cmp(&b.url));

    let mut json = serde_json::to_string_pretty(&sorted)?;
    json.push('\n');

    fs::write(path, json)?;

    info!("Exported {} records to {}", sorted.len(), path.display());
    Ok(sorted.len())
}

/// Re-reads every stored page and writes the snapshot
pub fn export_from_storage(storage: &dyn Storage, path: &Path) -> OutputResult<usize> {
    let records = storage.load_pages()?;
    debug!("Loaded {} records from storage for export", records.len());
    export_records(&records, path)
}

/// Verifies that the snapshot can be written to `path`
///
/// An existing snapshot is left untouched; a probe file created here is
/// removed again.
pub fn check_export_path(path: &Path) -> OutputResult<()> {
    let not_writable = |reason: String| OutputError::NotWritable {
        path: path.to_path_buf(),
        reason,
    };

    if path.is_dir() {
        return Err(not_writable("path is a directory".to_string()));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(not_writable(format!(
                "directory {} does not exist",
                parent.display()
            )));
        }
    }

    let existed = path.exists();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| not_writable(e.to_string()))?;

    if !existed {
        fs::remove_file(path)?;
    }

    Ok(())
}
