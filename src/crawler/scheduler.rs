//! Bounded scheduler for page workers
//!
//! This module handles:
//! - Enumerating the page range (ascending or descending)
//! - Keeping at most `concurrency` page workers in flight
//! - Yielding results in completion order, not submission order
//! - Pacing completions to bound the request rate against the origin
//! - Containing worker panics so one page cannot halt the run

use crate::config::Config;
use crate::crawler::worker::PageWorker;
use crate::record::{PageRequest, PageResult};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// A page worker that did not return normally
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("page worker failed: {reason}")]
pub struct WorkerFailure {
    /// The page being harvested, when known
    pub page: Option<u32>,
    pub reason: String,
}

/// What the scheduler yields for each dispatched page
pub type PageOutcome = Result<PageResult, WorkerFailure>;

/// Enumerates an inclusive page range
///
/// Descends when `start > end`, which is how listing archives are usually
/// walked (newest page first).
pub fn page_range(start: u32, end: u32) -> Vec<PageRequest> {
    if start >= end {
        (end..=start).rev().map(PageRequest::new).collect()
    } else {
        (start..=end).map(PageRequest::new).collect()
    }
}

/// Dispatches pages across a fixed-size worker pool
pub struct Scheduler {
    worker: Arc<PageWorker>,
    concurrency: usize,
    pacing: Duration,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `worker` - The page worker shared by every task
    /// * `concurrency` - Maximum pages in flight (at least 1)
    /// * `pacing` - Minimum spacing between yielded results
    pub fn new(worker: Arc<PageWorker>, concurrency: usize, pacing: Duration) -> Self {
        Self {
            worker,
            concurrency: concurrency.max(1),
            pacing,
        }
    }

    pub fn from_config(config: &Config, worker: Arc<PageWorker>) -> Self {
        Self::new(
            worker,
            config.crawler.concurrency as usize,
            config.crawler.pacing(),
        )
    }

    /// Starts a run over `pages`
    ///
    /// Nothing is dispatched until the first call to [`ScheduledRun::next`].
    pub fn run(&self, pages: Vec<PageRequest>) -> ScheduledRun {
        ScheduledRun {
            worker: Arc::clone(&self.worker),
            pending: pages.into_iter(),
            in_flight: JoinSet::new(),
            concurrency: self.concurrency,
            pacing: self.pacing,
            last_yield: None,
            dispatched: 0,
        }
    }
}

/// A single pass over a page range
///
/// Finite and not restartable: every page is dispatched exactly once.
pub struct ScheduledRun {
    worker: Arc<PageWorker>,
    pending: std::vec::IntoIter<PageRequest>,
    in_flight: JoinSet<(u32, Result<PageResult, String>)>,
    concurrency: usize,
    pacing: Duration,
    last_yield: Option<Instant>,
    dispatched: usize,
}

impl ScheduledRun {
    /// Waits for the next page to complete
    ///
    /// Refills the pool from the pending range first, then yields whichever
    /// in-flight page finishes first. Returns `None` once every page has
    /// been yielded.
    pub async fn next(&mut self) -> Option<PageOutcome> {
        self.fill();

        let joined = self.in_flight.join_next().await?;
        self.pace().await;

        Some(match joined {
            Ok((_, Ok(result))) => Ok(result),
            Ok((page, Err(reason))) => Err(WorkerFailure {
                page: Some(page),
                reason,
            }),
            Err(e) => Err(WorkerFailure {
                page: None,
                reason: e.to_string(),
            }),
        })
    }

    /// Pages dispatched so far
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Pages not yet dispatched
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Pages currently being harvested
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn fill(&mut self) {
        while self.in_flight.len() < self.concurrency {
            let Some(request) = self.pending.next() else {
                break;
            };

            let worker = Arc::clone(&self.worker);
            let page = request.page_number;
            self.in_flight.spawn(async move {
                let outcome = AssertUnwindSafe(worker.fetch_page(page))
                    .catch_unwind()
                    .await;
                (page, outcome.map_err(|payload| panic_message(payload.as_ref())))
            });

            self.dispatched += 1;
            tracing::debug!("Dispatched page {}", page);
        }
    }

    /// Keeps yielded results at least `pacing` apart
    async fn pace(&mut self) {
        if let Some(last) = self.last_yield {
            tokio::time::sleep_until(last + self.pacing).await;
        }
        self.last_yield = Some(Instant::now());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
