//! Site-Trawler main entry point
//!
//! This is the command-line interface for the Site-Trawler crawler.

use anyhow::Context;
use clap::Parser;
use site_trawler::config::{load_config_with_hash, Config};
use site_trawler::crawler::Coordinator;
use site_trawler::output::{export_from_storage, load_statistics, print_statistics};
use site_trawler::storage::open_storage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Site-Trawler: a polite, depth-bounded site crawler
///
/// Site-Trawler walks one site outward from a seed URL, stores title,
/// description, images and links for every page in SQLite, and writes a
/// JSON snapshot once the crawl drains.
#[derive(Parser, Debug)]
#[command(name = "site-trawler")]
#[command(version)]
#[command(about = "A polite, depth-bounded site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress informational output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Remove previously stored pages before crawling
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_only", "fresh"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_only", "fresh"])]
    stats: bool,

    /// Rewrite the JSON snapshot from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "fresh"])]
    export_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_only {
        handle_export(&config)?;
    } else {
        handle_crawl(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("site_trawler=info,warn"),
            1 => EnvFilter::new("site_trawler=debug,info"),
            2 => EnvFilter::new("site_trawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: the config is already validated, show the plan
fn handle_dry_run(config: &Config) {
    println!("=== Site-Trawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed: {}", config.crawler.seed);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Workers: {}", config.crawler.workers);
    println!(
        "  Per-domain parallelism: {}",
        config.crawler.per_domain_parallelism
    );
    println!(
        "  Delay: {}-{}ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );
    println!("  Retries: {}", config.crawler.max_retries);

    println!("\nScope:");
    for domain in &config.scope.allowed_domains {
        println!("  - {}", domain);
    }
    if let Some(pattern) = &config.scope.exclude_pattern {
        println!("  Excluding: {}", pattern);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Snapshot: {}", config.output.export_path);
    println!("  Write policy: {:?}", config.output.write_policy);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-only mode: rewrites the snapshot from stored pages
fn handle_export(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let count = export_from_storage(&storage, Path::new(&config.output.export_path))?;

    println!(
        "✓ Exported {} records to {}",
        count, config.output.export_path
    );

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (stored pages will be removed)");
    } else {
        tracing::info!("Starting crawl (stored pages are kept)");
    }

    let coordinator = Coordinator::new(config, fresh)
        .await
        .context("crawl setup failed")?
        .with_config_hash(config_hash);

    let report = coordinator.run().await.context("crawl failed")?;
    tracing::info!(
        "Crawl completed successfully: {} records exported",
        report.exported
    );

    Ok(())
}
