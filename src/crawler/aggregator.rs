//! Result aggregation
//!
//! Pages arrive from the scheduler in completion order. Each page's records
//! are already in extraction order (see [`PageResult`]), so the aggregator
//! forwards every non-empty page to the checkpoint manager as one unit and
//! never reorders across pages: the dataset is an append log where pages may
//! interleave in any order.

use crate::crawler::checkpoint::CheckpointManager;
use crate::crawler::scheduler::{PageOutcome, ScheduledRun};
use crate::output::{CheckpointPublisher, RecordSink};
use crate::record::PageResult;
use std::time::Instant;

/// Per-run aggregation counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub pages_received: usize,
    pub pages_with_records: usize,
    pub pages_empty: usize,
    pub pages_failed: usize,
    pub records_accepted: usize,
}

/// Drains a scheduled run into a checkpoint manager
pub struct Aggregator {
    progress_interval: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            progress_interval: 10,
        }
    }

    /// Logs progress every `interval` pages
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Consumes every outcome of `run`, then performs the final checkpoint
    pub async fn drain<S, P>(
        &self,
        run: &mut ScheduledRun,
        checkpoints: &mut CheckpointManager<S, P>,
    ) -> AggregateStats
    where
        S: RecordSink,
        P: CheckpointPublisher,
    {
        let mut stats = AggregateStats::default();
        let start_time = Instant::now();

        while let Some(outcome) = run.next().await {
            self.handle(outcome, checkpoints, &mut stats);

            if stats.pages_received % self.progress_interval == 0 {
                let rate = stats.pages_received as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} pages done, {} remaining, {} records, {:.2} pages/sec",
                    stats.pages_received,
                    run.remaining() + run.in_flight(),
                    stats.records_accepted,
                    rate
                );
            }
        }

        checkpoints.final_flush();
        stats
    }

    /// Handles a single page outcome
    pub fn handle<S, P>(
        &self,
        outcome: PageOutcome,
        checkpoints: &mut CheckpointManager<S, P>,
        stats: &mut AggregateStats,
    ) where
        S: RecordSink,
        P: CheckpointPublisher,
    {
        stats.pages_received += 1;

        match outcome {
            Ok(result) if result.is_empty() => {
                stats.pages_empty += 1;
            }
            Ok(result) => self.forward(result, checkpoints, stats),
            Err(failure) => {
                stats.pages_failed += 1;
                tracing::error!(
                    page = ?failure.page,
                    error = %failure.reason,
                    "Error processing page"
                );
            }
        }
    }

    fn forward<S, P>(
        &self,
        result: PageResult,
        checkpoints: &mut CheckpointManager<S, P>,
        stats: &mut AggregateStats,
    ) where
        S: RecordSink,
        P: CheckpointPublisher,
    {
        let page_number = result.page_number;
        let before = checkpoints.state().total;

        if let Err(e) = checkpoints.accept(result.records) {
            tracing::error!(page = page_number, error = %e, "Failed to store page records");
        }

        let accepted = checkpoints.state().total - before;
        if accepted > 0 {
            stats.pages_with_records += 1;
            stats.records_accepted += accepted;
        }

        checkpoints.flush_if_due();
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
