//! Crawler coordinator - main crawl orchestration logic
//!
//! Setup happens in [`Coordinator::new`]: the scope filter is built, the seed
//! is checked, the store is opened and the export path is probed, all under
//! one deadline. [`Coordinator::run`] then starts a pool of workers that pull
//! from the frontier, and a single collector that owns the store and receives
//! records over a channel. Once the frontier drains the channel closes, the
//! collector finishes, and the snapshot is exported from the store.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_with_retries, RETRY_BACKOFF};
use crate::crawler::frontier::{Dispatch, Frontier, FrontierStats};
use crate::crawler::parser::extract_with_base;
use crate::crawler::scheduler::Scheduler;
use crate::output::{check_export_path, export_from_storage};
use crate::state::WorkState;
use crate::storage::{PageRecord, RunStatus, SaveOutcome, SqliteStorage, Storage, WritePolicy};
use crate::url::{extract_domain, normalize_url, UrlFilter};
use crate::TrawlError;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Records buffered between the workers and the collector
const CHANNEL_CAPACITY: usize = 64;

/// A progress line is logged every this many finished pages
const PROGRESS_INTERVAL: u64 = 25;

/// What a finished crawl did
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub run_id: i64,
    /// Items handed to workers
    pub dispatched: u64,
    /// Fetched and handed to the collector
    pub succeeded: u64,
    /// Fetched but not parseable; stored with URL only
    pub degraded: u64,
    /// Fetch failed
    pub failed: u64,
    /// Discovered URLs the frontier refused
    pub dropped: u64,
    /// Records inserted or updated in the store
    pub saved: u64,
    /// Records skipped because the URL was already stored
    pub duplicates: u64,
    /// Records the store refused
    pub store_errors: u64,
    /// Records written to the snapshot
    pub exported: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct WorkerStats {
    succeeded: u64,
    degraded: u64,
    failed: u64,
}

impl WorkerStats {
    fn merge(&mut self, other: WorkerStats) {
        self.succeeded += other.succeeded;
        self.degraded += other.degraded;
        self.failed += other.failed;
    }
}

#[derive(Debug, Default)]
struct CollectorStats {
    saved: u64,
    duplicates: u64,
    errors: u64,
}

/// Shared, read-only state every worker needs
struct WorkerContext {
    frontier: Arc<Frontier>,
    scheduler: Scheduler,
    client: Client,
    max_retries: u32,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SqliteStorage,
    filter: UrlFilter,
    client: Client,
    seed: Url,
    export_path: PathBuf,
    config_hash: String,
}

impl Coordinator {
    /// Validates the seed, opens the store and probes the export path
    ///
    /// With `fresh`, previously stored pages are removed before the crawl.
    /// Opening the store and probing the export path must finish within the
    /// configured setup deadline.
    pub async fn new(config: Config, fresh: bool) -> Result<Self, TrawlError> {
        let filter = UrlFilter::new(&config.scope)?;

        let seed = normalize_url(&config.crawler.seed).map_err(|e| TrawlError::SeedRejected {
            url: config.crawler.seed.clone(),
            reason: e.to_string(),
        })?;

        let admission = filter.check(&seed);
        if !admission.is_admitted() {
            return Err(TrawlError::SeedRejected {
                url: seed.to_string(),
                reason: admission.to_string(),
            });
        }

        let client = build_http_client(
            &config.user_agent,
            config.crawler.request_timeout(),
            filter.clone(),
        )?;

        let database_path = PathBuf::from(&config.output.database_path);
        let export_path = PathBuf::from(&config.output.export_path);
        let deadline = config.crawler.setup_timeout();

        let setup = async {
            let storage = tokio::task::spawn_blocking(move || {
                let mut storage = SqliteStorage::new(&database_path)?;
                if fresh {
                    let removed = storage.clear_pages()?;
                    info!("Fresh crawl: removed {} stored pages", removed);
                }
                Ok::<_, TrawlError>(storage)
            })
            .await
            .map_err(|e| TrawlError::Task(e.to_string()))??;

            check_export_path(&export_path)?;
            Ok::<_, TrawlError>(storage)
        };

        let storage = tokio::time::timeout(deadline, setup)
            .await
            .map_err(|_| TrawlError::SetupTimeout {
                seconds: deadline.as_secs(),
            })??;

        info!("Setup complete, seed {}", seed);

        Ok(Self {
            config: Arc::new(config),
            storage,
            filter,
            client,
            seed,
            export_path,
            config_hash: String::new(),
        })
    }

    /// Attaches the configuration file hash recorded on the run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Runs the crawl to completion and writes the snapshot
    ///
    /// Per-page failures never abort the run; only a failure to write the
    /// snapshot is returned as an error, and the run is then recorded as
    /// failed.
    pub async fn run(self) -> Result<CrawlReport, TrawlError> {
        let start_time = Instant::now();
        let Coordinator {
            config,
            mut storage,
            filter,
            client,
            seed,
            export_path,
            config_hash,
        } = self;

        let (storage, run_id) = tokio::task::spawn_blocking(move || {
            let run_id = storage.create_run(&config_hash)?;
            Ok::<_, TrawlError>((storage, run_id))
        })
        .await
        .map_err(|e| TrawlError::Task(e.to_string()))??;
        info!("Starting crawl run {} from {}", run_id, seed);

        let frontier = Arc::new(Frontier::new(filter, config.crawler.max_depth));
        frontier.submit(seed, 0);

        let context = Arc::new(WorkerContext {
            frontier: Arc::clone(&frontier),
            scheduler: Scheduler::new(&config.crawler),
            client,
            max_retries: config.crawler.max_retries,
        });

        let (tx, rx) = mpsc::channel::<PageRecord>(CHANNEL_CAPACITY);
        let policy = config.output.write_policy;
        let collector = tokio::task::spawn_blocking(move || run_collector(storage, rx, policy));

        let mut workers = JoinSet::new();
        for id in 0..config.crawler.workers {
            workers.spawn(run_worker(id, Arc::clone(&context), tx.clone()));
        }
        drop(tx);

        let mut totals = WorkerStats::default();
        while let Some(result) = workers.join_next().await {
            match result {
                Ok(stats) => totals.merge(stats),
                Err(e) => error!("Worker task failed: {}", e),
            }
        }
        drop(context);

        let (mut storage, saved) = collector
            .await
            .map_err(|e| TrawlError::Task(e.to_string()))?;

        let frontier_stats = frontier.stats();
        let exported = tokio::task::spawn_blocking(move || {
            finish_run(&mut storage, run_id, frontier_stats, &export_path)
        })
        .await
        .map_err(|e| TrawlError::Task(e.to_string()))??;

        let report = CrawlReport {
            run_id,
            dispatched: frontier_stats.dispatched,
            succeeded: totals.succeeded,
            degraded: totals.degraded,
            failed: frontier_stats.failed,
            dropped: frontier_stats.dropped(),
            saved: saved.saved,
            duplicates: saved.duplicates,
            store_errors: saved.errors,
            exported,
            elapsed: start_time.elapsed(),
        };
        log_summary(&report, &frontier_stats);

        Ok(report)
    }
}

/// Pulls work until the frontier drains
async fn run_worker(
    id: u32,
    context: Arc<WorkerContext>,
    tx: mpsc::Sender<PageRecord>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while let Some(dispatch) = context.frontier.next_work().await {
        let outcome = process(&context, &dispatch, &tx, &mut stats).await;
        let finished = dispatch.complete(outcome);

        if finished % PROGRESS_INTERVAL == 0 {
            info!(
                "Progress: {} pages finished, {} pending, {} in flight",
                finished,
                context.frontier.pending(),
                context.frontier.in_flight()
            );
        }
    }

    debug!("Worker {} exiting", id);
    stats
}

/// Fetches and extracts one page, submits its links and hands the record off
async fn process(
    context: &WorkerContext,
    dispatch: &Dispatch,
    tx: &mpsc::Sender<PageRecord>,
    stats: &mut WorkerStats,
) -> WorkState {
    let url = dispatch.url();
    let depth = dispatch.depth();
    let domain = extract_domain(url).unwrap_or_default();

    let permit = match context.scheduler.acquire(&domain).await {
        Ok(permit) => permit,
        Err(e) => {
            warn!("Could not schedule {}: {}", url, e);
            stats.failed += 1;
            return WorkState::Failed;
        }
    };

    let fetched = fetch_with_retries(&context.client, url, context.max_retries, RETRY_BACKOFF).await;
    drop(permit);

    let page = match fetched {
        Ok(page) => page,
        Err(e) => {
            warn!("Failed to fetch {} [depth {}]: {}", url, depth, e);
            stats.failed += 1;
            return WorkState::Failed;
        }
    };

    info!("Fetched {} [depth {}] ({})", url, depth, page.status_code);

    let extracted = extract_with_base(url, &page.final_url, &page.content_type, &page.body);
    if let Some(e) = &extracted.parse_error {
        warn!("Could not parse {}: {}; storing URL only", url, e);
        stats.degraded += 1;
    }

    for link in extracted.links {
        dispatch.submit_child(link);
    }

    if tx.send(extracted.record).await.is_err() {
        error!("Collector is gone, record for {} was lost", url);
        stats.failed += 1;
        return WorkState::Failed;
    }

    stats.succeeded += 1;
    WorkState::Completed
}

/// Owns the store for the duration of the crawl and saves every record it receives
fn run_collector(
    mut storage: SqliteStorage,
    mut rx: mpsc::Receiver<PageRecord>,
    policy: WritePolicy,
) -> (SqliteStorage, CollectorStats) {
    let mut stats = CollectorStats::default();

    while let Some(record) = rx.blocking_recv() {
        match storage.save_page(&record, policy) {
            Ok(SaveOutcome::Inserted) | Ok(SaveOutcome::Updated) => stats.saved += 1,
            Ok(SaveOutcome::Duplicate) => {
                debug!("{} already stored, kept existing record", record.url);
                stats.duplicates += 1;
            }
            Err(e) => {
                error!("Failed to save {}: {}", record.url, e);
                stats.errors += 1;
            }
        }
    }

    (storage, stats)
}

/// Writes the snapshot, then records the run as completed or failed
fn finish_run(
    storage: &mut SqliteStorage,
    run_id: i64,
    stats: FrontierStats,
    export_path: &Path,
) -> Result<usize, TrawlError> {
    let exported = export_from_storage(&*storage, export_path);
    let status = match &exported {
        Ok(_) => RunStatus::Completed,
        Err(e) => {
            error!("Failed to write snapshot {}: {}", export_path.display(), e);
            RunStatus::Failed
        }
    };

    if let Err(e) = storage.complete_run(run_id, status, stats.dispatched, stats.failed) {
        warn!("Failed to record end of run {}: {}", run_id, e);
    }

    Ok(exported?)
}

fn log_summary(report: &CrawlReport, frontier: &FrontierStats) {
    info!(
        "Crawl completed in {:.1?}: {} dispatched, {} succeeded, {} degraded, {} failed, {} dropped",
        report.elapsed,
        report.dispatched,
        report.succeeded,
        report.degraded,
        report.failed,
        report.dropped
    );
    info!(
        "Dropped links: {} beyond depth, {} out of scope, {} excluded, {} already visited",
        frontier.depth_exceeded, frontier.out_of_scope, frontier.excluded, frontier.already_visited
    );
    info!(
        "Store: {} saved, {} duplicates, {} errors; {} records exported",
        report.saved, report.duplicates, report.store_errors, report.exported
    );
}
