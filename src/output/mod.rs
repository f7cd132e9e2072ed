//! Output module for persisting harvested records
//!
//! This module handles:
//! - Appending records to the CSV dataset
//! - Publishing checkpoint snapshots of the dataset (git or log-only)
//! - Selecting a publisher from configuration
//! - Reporting on a finished run

mod csv_sink;
mod git;
mod report;
mod traits;

pub use csv_sink::{CsvRecordSink, CSV_HEADER};
pub use git::{GitPublisher, LogPublisher};
pub use report::{print_report, RunReport};
pub use traits::{
    CheckpointPublisher, OutputError, OutputResult, PublishOutcome, RecordSink,
};

use crate::config::{Config, PublisherKind};
use std::path::{Path, PathBuf};

/// Builds the checkpoint publisher selected by configuration
pub fn build_publisher(config: &Config) -> Box<dyn CheckpointPublisher> {
    match config.publisher.kind {
        PublisherKind::Git => {
            let repo_dir = Path::new(config.publisher.repo_dir.as_deref().unwrap_or("."));
            let dataset = dataset_path(repo_dir, Path::new(&config.output.csv_path));
            Box::new(GitPublisher::new(
                repo_dir,
                &dataset,
                config.publisher.push,
                config.publisher.lfs,
            ))
        }
        PublisherKind::Log => Box::new(LogPublisher),
    }
}

/// Expresses the dataset path the way git sees it from `repo_dir`
///
/// `csv_path` is relative to the process working directory, while git runs
/// inside `repo_dir`. The result is relative to `repo_dir` when the dataset
/// lies inside it, and absolute otherwise.
fn dataset_path(repo_dir: &Path, csv_path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().ok();
    let absolute = |path: &Path| match &cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    };

    let dataset = absolute(csv_path);
    match dataset.strip_prefix(absolute(repo_dir)) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => dataset,
    }
}
