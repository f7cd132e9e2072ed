//! End-of-run report
//!
//! Summarizes a harvest run for the operator once the range is exhausted.

use chrono::{DateTime, Utc};

/// Summary of a completed harvest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Pages handed to workers
    pub pages_dispatched: usize,

    /// Pages that contributed at least one record
    pub pages_with_records: usize,

    /// Pages with no records (nothing extracted, or the fetch gave up)
    pub pages_empty: usize,

    /// Pages whose worker failed unexpectedly
    pub pages_failed: usize,

    /// Records appended to the dataset
    pub records_written: usize,

    /// Checkpoints that produced a new snapshot
    pub checkpoints_published: usize,
}

impl RunReport {
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Prints the report to stdout in a formatted manner
pub fn print_report(report: &RunReport) {
    println!("=== Harvest Report ===\n");

    println!("Run:");
    println!("  Started:  {}", report.started_at.to_rfc3339());
    println!("  Finished: {}", report.finished_at.to_rfc3339());
    println!("  Duration: {}s", report.duration_seconds());
    println!();

    println!("Pages:");
    println!("  Dispatched:   {}", report.pages_dispatched);
    println!("  With records: {}", report.pages_with_records);
    println!("  Empty:        {}", report.pages_empty);
    println!("  Failed:       {}", report.pages_failed);
    println!();

    println!("Output:");
    println!("  Records written:       {}", report.records_written);
    println!("  Checkpoints published: {}", report.checkpoints_published);

    let yield_rate = if report.pages_dispatched > 0 {
        (report.pages_with_records as f64 / report.pages_dispatched as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "\nYield: {:.1}% ({} / {} pages produced records)",
        yield_rate, report.pages_with_records, report.pages_dispatched
    );
}
