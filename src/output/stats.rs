//! Statistics generation from the crawl database

use crate::storage::{RunRecord, Storage, StorageResult};

/// Snapshot of what the store currently holds
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Number of stored page records
    pub total_pages: u64,

    /// Most recent run, if any run was ever started
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        total_pages: storage.count_pages()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");
    println!("Stored pages: {}", stats.total_pages);
    println!();

    let Some(run) = &stats.latest_run else {
        println!("No crawl runs recorded.");
        return;
    };

    println!("Latest Run (#{}):", run.id);
    println!("  Status: {}", run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    println!(
        "  Finished: {}",
        run.finished_at.as_deref().unwrap_or("(not finished)")
    );
    println!("  Config hash: {}", run.config_hash);
    println!("  Pages dispatched: {}", run.pages_dispatched);
    println!("  Pages failed: {}", run.pages_failed);

    let success_rate = if run.pages_dispatched > 0 {
        ((run.pages_dispatched - run.pages_failed.min(run.pages_dispatched)) as f64
            / run.pages_dispatched as f64)
            * 100.0
    } else {
        0.0
    };
    println!("  Success Rate: {:.1}%", success_rate);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PageRecord, RunStatus, SqliteStorage, WritePolicy};

    #[test]
    fn test_load_statistics_empty() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.total_pages, 0);
        assert!(stats.latest_run.is_none());
    }

    #[test]
    fn test_load_statistics_with_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("abc").unwrap();
        storage
            .save_page(
                &PageRecord::degraded("https://example.test/"),
                WritePolicy::Upsert,
            )
            .unwrap();
        storage
            .complete_run(run_id, RunStatus::Completed, 1, 0)
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_pages, 1);

        let run = stats.latest_run.unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Completed);
    }
}
