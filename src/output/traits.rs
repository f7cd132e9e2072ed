//! Output traits and error types
//!
//! The harvest pipeline writes through two collaborators: a [`RecordSink`]
//! that durably appends records, and a [`CheckpointPublisher`] that snapshots
//! the dataset from time to time. Both are only ever driven from a single
//! task, so neither needs to be `Sync`.

use crate::record::Record;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Durable, append-only record storage
pub trait RecordSink: Send {
    /// Returns true if the dataset already holds a header (and possibly data)
    fn exists(&self) -> bool;

    /// Prepares a fresh dataset, e.g. by writing its header
    ///
    /// Called once at startup, and only when [`RecordSink::exists`] is false.
    fn initialize(&mut self) -> OutputResult<()> {
        Ok(())
    }

    /// Appends one record
    fn append(&mut self, record: &Record) -> OutputResult<()>;

    /// Makes every appended record durable
    fn flush(&mut self) -> OutputResult<()>;
}

/// Result of a successful publish call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new snapshot was recorded
    Published,

    /// Nothing changed since the previous snapshot
    NothingToPublish,
}

/// Versioned snapshot mechanism for the dataset
pub trait CheckpointPublisher: Send {
    /// One-time preparation when the dataset was freshly created
    fn prepare(&mut self) -> OutputResult<()> {
        Ok(())
    }

    /// Records a snapshot described by `summary`
    fn publish(&mut self, summary: &str) -> OutputResult<PublishOutcome>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn exists(&self) -> bool {
        (**self).exists()
    }

    fn initialize(&mut self) -> OutputResult<()> {
        (**self).initialize()
    }

    fn append(&mut self, record: &Record) -> OutputResult<()> {
        (**self).append(record)
    }

    fn flush(&mut self) -> OutputResult<()> {
        (**self).flush()
    }
}

impl<P: CheckpointPublisher + ?Sized> CheckpointPublisher for Box<P> {
    fn prepare(&mut self) -> OutputResult<()> {
        (**self).prepare()
    }

    fn publish(&mut self, summary: &str) -> OutputResult<PublishOutcome> {
        (**self).publish(summary)
    }
}
