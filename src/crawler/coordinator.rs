//! Harvest coordinator - setup and top-level run orchestration
//!
//! This module wires the pipeline together:
//! - Opening the dataset (the only fatal failure point besides config)
//! - Preparing the checkpoint publisher for a fresh dataset
//! - Warming up the session and freezing the HTTP client
//! - Running scheduler → aggregator → checkpoint manager over the page range
//! - Producing the end-of-run report

use crate::config::Config;
use crate::crawler::aggregator::Aggregator;
use crate::crawler::checkpoint::CheckpointManager;
use crate::crawler::fetcher::{warm_up_session, HttpFetcher, PageFetcher};
use crate::crawler::parser::{HtmlListingExtractor, PageExtractor};
use crate::crawler::scheduler::{page_range, Scheduler};
use crate::crawler::worker::PageWorker;
use crate::output::{
    build_publisher, CheckpointPublisher, CsvRecordSink, RecordSink, RunReport,
};
use crate::HarvestError;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

/// Main harvest coordinator
///
/// Everything that can fail fatally happens in [`Harvester::new`]; once
/// constructed, [`Harvester::run`] always runs to completion.
pub struct Harvester {
    config: Config,
    sink: CsvRecordSink,
    publisher: Box<dyn CheckpointPublisher>,
    scheduler: Scheduler,
}

impl Harvester {
    /// Performs setup for a run
    ///
    /// # Setup Order
    ///
    /// 1. Open (or create) the CSV dataset
    /// 2. Write the header and prepare the publisher if the dataset is new
    /// 3. Compile the extractor selectors
    /// 4. Warm up the session and build the shared HTTP client
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to run
    /// * `Err(HarvestError)` - Setup failed; no page has been fetched
    pub async fn new(config: Config) -> Result<Self, HarvestError> {
        let mut sink = CsvRecordSink::open(Path::new(&config.output.csv_path))?;
        let mut publisher = build_publisher(&config);
        initialize_output(&mut sink, &mut publisher)?;

        let extractor: Arc<dyn PageExtractor> =
            Arc::new(HtmlListingExtractor::from_config(&config)?);

        let identity = warm_up_session(
            &config.site.user_agent,
            config.site.warmup_url.as_deref(),
            config.crawler.request_timeout(),
        )
        .await;
        tracing::debug!(
            "Session identity ready (cookies: {})",
            if identity.cookies.is_some() { "yes" } else { "none" }
        );

        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&identity)?);
        let worker = PageWorker::from_config(&config, fetcher, extractor);
        let scheduler = Scheduler::from_config(&config, Arc::new(worker));

        Ok(Self {
            config,
            sink,
            publisher,
            scheduler,
        })
    }

    /// Harvests the configured page range
    ///
    /// Per-page, per-record and per-checkpoint failures are logged and
    /// contained; the run always reaches the final checkpoint.
    pub async fn run(self) -> RunReport {
        let started_at = Utc::now();
        let crawler = &self.config.crawler;

        tracing::info!(
            "Starting crawl from page {} to {} ({} pages, concurrency {})",
            crawler.start_page,
            crawler.end_page,
            crawler.page_count(),
            crawler.concurrency
        );

        let mut checkpoints = CheckpointManager::new(
            self.sink,
            self.publisher,
            self.config.output.checkpoint_threshold,
        );
        let mut run = self
            .scheduler
            .run(page_range(crawler.start_page, crawler.end_page));

        let stats = Aggregator::new().drain(&mut run, &mut checkpoints).await;
        let state = checkpoints.state();

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            pages_dispatched: run.dispatched(),
            pages_with_records: stats.pages_with_records,
            pages_empty: stats.pages_empty,
            pages_failed: stats.pages_failed,
            records_written: state.total,
            checkpoints_published: state.checkpoints,
        };

        tracing::info!(
            "Crawl completed: {} records from {} pages in {}s, data saved to {}",
            report.records_written,
            report.pages_dispatched,
            report.duration_seconds(),
            self.config.output.csv_path
        );

        report
    }
}

/// Initializes a fresh dataset and its publisher
///
/// Returns true if the dataset was new. An existing dataset is left as is
/// and the publisher is not prepared again.
fn initialize_output<S, P>(sink: &mut S, publisher: &mut P) -> Result<bool, HarvestError>
where
    S: RecordSink,
    P: CheckpointPublisher,
{
    if sink.exists() {
        return Ok(false);
    }

    sink.initialize()?;
    publisher.prepare()?;
    Ok(true)
}

/// Runs a complete harvest
///
/// # Example
///
/// ```no_run
/// use listing_harvester::config::load_config;
/// use listing_harvester::crawler::harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let report = harvest(config).await?;
/// println!("{} records written", report.records_written);
/// # Ok(())
/// # }
/// ```
pub async fn harvest(config: Config) -> Result<RunReport, HarvestError> {
    Ok(Harvester::new(config).await?.run().await)
}
