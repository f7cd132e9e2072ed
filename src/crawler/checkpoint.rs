//! Checkpoint manager
//!
//! Owns the record sink, the checkpoint publisher and the batch of records
//! appended since the last checkpoint. It is driven from a single task (the
//! aggregator), so none of its state is shared or locked.

use crate::output::{CheckpointPublisher, PublishOutcome, RecordSink};
use crate::record::Record;
use crate::HarvestError;

/// Progress counters for the current run
///
/// Lives only for the duration of a run; nothing here is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointState {
    /// Records appended since the last checkpoint
    pub since_checkpoint: usize,

    /// Records appended during the whole run
    pub total: usize,

    /// Last page whose records were accepted
    pub last_page: Option<u32>,

    /// Checkpoints that produced a new snapshot
    pub checkpoints: usize,
}

/// Batches records and publishes checkpoints when a threshold is crossed
pub struct CheckpointManager<S, P> {
    sink: S,
    publisher: P,
    threshold: usize,
    batch: Vec<Record>,
    state: CheckpointState,
}

impl<S: RecordSink, P: CheckpointPublisher> CheckpointManager<S, P> {
    /// Creates a new manager
    ///
    /// # Arguments
    ///
    /// * `sink` - Where records are appended
    /// * `publisher` - Invoked once per checkpoint
    /// * `threshold` - Records between two checkpoints (at least 1)
    pub fn new(sink: S, publisher: P, threshold: usize) -> Self {
        Self {
            sink,
            publisher,
            threshold: threshold.max(1),
            batch: Vec::new(),
            state: CheckpointState::default(),
        }
    }

    /// Appends one page's records to the sink and the batch
    ///
    /// Records are appended in the order given. On a sink error the remaining
    /// records of the page are not appended; those already appended stay
    /// counted.
    pub fn accept(&mut self, records: Vec<Record>) -> Result<(), HarvestError> {
        let Some(page) = records.first().map(|record| record.page_number) else {
            return Ok(());
        };

        let mut appended = 0;
        let mut result = Ok(());

        for record in records {
            if let Err(e) = self.sink.append(&record) {
                result = Err(HarvestError::Output(e));
                break;
            }
            self.batch.push(record);
            appended += 1;
        }

        if appended > 0 {
            self.state.since_checkpoint += appended;
            self.state.total += appended;
            self.state.last_page = Some(page);

            if let Err(e) = self.sink.flush() {
                result = result.and(Err(HarvestError::Output(e)));
            }
        }

        result
    }

    /// Publishes a checkpoint if the threshold has been crossed
    ///
    /// Returns true if a checkpoint was attempted.
    pub fn flush_if_due(&mut self) -> bool {
        if self.state.since_checkpoint == 0 || self.state.since_checkpoint < self.threshold {
            return false;
        }

        let summary = format!(
            "Update data for {} records up to page {}",
            self.state.since_checkpoint,
            self.state
                .last_page
                .map(|page| page.to_string())
                .unwrap_or_default()
        );
        self.checkpoint(&summary, false)
    }

    /// Publishes the remaining records at the end of a run
    ///
    /// Does nothing if every record has already been checkpointed. There is
    /// no later checkpoint to defer to, so a failed sink flush is logged and
    /// the publisher is still invoked.
    pub fn final_flush(&mut self) -> bool {
        if self.state.since_checkpoint == 0 {
            return false;
        }

        let summary = format!(
            "Final update for remaining {} records",
            self.state.since_checkpoint
        );
        self.checkpoint(&summary, true)
    }

    fn checkpoint(&mut self, summary: &str, is_final: bool) -> bool {
        if let Err(e) = self.sink.flush() {
            if !is_final {
                tracing::error!(
                    error = %e,
                    pending = self.batch.len(),
                    "Failed to flush dataset, postponing checkpoint"
                );
                return false;
            }
            tracing::error!(
                error = %e,
                pending = self.batch.len(),
                "Failed to flush dataset before final checkpoint"
            );
        }

        match self.publisher.publish(summary) {
            Ok(PublishOutcome::Published) => {
                self.state.checkpoints += 1;
                tracing::info!("Checkpoint published: {}", summary);
            }
            Ok(PublishOutcome::NothingToPublish) => {
                tracing::warn!("No changes to checkpoint: {}", summary);
            }
            Err(e) => {
                tracing::error!(error = %e, summary, "Checkpoint publish failed");
            }
        }

        // The records are durable in the sink either way; the next
        // checkpoint snapshots them along with anything newer.
        self.batch.clear();
        self.state.since_checkpoint = 0;
        true
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    /// Records appended since the last checkpoint
    pub fn batch(&self) -> &[Record] {
        &self.batch
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn into_parts(self) -> (S, P, CheckpointState) {
        (self.sink, self.publisher, self.state)
    }
}
