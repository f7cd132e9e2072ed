//! Listing Harvester main entry point
//!
//! This is the command-line interface for the paginated listing harvester.

use anyhow::Context;
use clap::Parser;
use listing_harvester::config::{
    compute_config_hash, load_config_with_overrides, Config, ConfigOverrides,
};
use listing_harvester::crawler::harvest;
use listing_harvester::output::print_report;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Listing Harvester: a resilient paginated listing crawler
///
/// Fetches a range of listing pages concurrently, resolves a digest for
/// every listed resource, and appends the results to a CSV dataset that is
/// checkpointed periodically.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resilient paginated listing crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// First page to harvest (overrides the config file)
    #[arg(long, env = "START_PAGE")]
    start_page: Option<u32>,

    /// Last page to harvest, inclusive (overrides the config file)
    #[arg(long, env = "END_PAGE")]
    end_page: Option<u32>,

    /// Number of pages fetched concurrently (overrides the config file)
    #[arg(long, env = "CONCURRENCY")]
    concurrency: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let overrides = ConfigOverrides {
        start_page: cli.start_page,
        end_page: cli.end_page,
        concurrency: cli.concurrency,
    };

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config_with_overrides(&cli.config, &overrides)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;

    let hash = compute_config_hash(&cli.config)?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let report = harvest(config).await.context("Harvest setup failed")?;
    print_report(&report);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;

    println!("=== Listing Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Pages: {} to {} ({} pages)",
        crawler.start_page,
        crawler.end_page,
        crawler.page_count()
    );
    println!("  Concurrency: {}", crawler.concurrency);
    println!(
        "  Retries: {} (base {}ms, max {}ms)",
        crawler.max_attempts, crawler.retry_base_delay_ms, crawler.retry_max_delay_ms
    );
    println!("  Request timeout: {}s", crawler.request_timeout_secs);
    println!("  Resource timeout: {}s", crawler.resource_timeout_secs);
    println!("  Pacing: {}ms", crawler.pacing_ms);

    println!("\nSite:");
    println!("  First page URL: {}", config.site.page_url_for(crawler.start_page));
    println!("  Resource URL: {}", config.site.resource_url);
    match &config.site.warmup_url {
        Some(url) => println!("  Warm-up URL: {}", url),
        None => println!("  Warm-up URL: (none)"),
    }
    println!("  User agent: {}", config.site.user_agent);

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    println!(
        "  Checkpoint every {} records via {:?} publisher",
        config.output.checkpoint_threshold, config.publisher.kind
    );

    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest {} pages", crawler.page_count());
}
