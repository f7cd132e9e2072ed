//! Crawler module for page fetching and aggregation
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with transient/fatal failure classification
//! - Exponential backoff for page retries
//! - HTML listing extraction
//! - Companion resource digest resolution
//! - Bounded concurrent scheduling of page workers
//! - Aggregation and batched checkpointing of results

mod aggregator;
mod backoff;
mod checkpoint;
mod coordinator;
mod fetcher;
mod parser;
mod resolver;
mod scheduler;
mod worker;

pub use aggregator::{AggregateStats, Aggregator};
pub use backoff::{should_retry, BackoffPolicy};
pub use checkpoint::{CheckpointManager, CheckpointState};
pub use coordinator::{harvest, Harvester};
pub use fetcher::{
    build_http_client, fetch_url, is_transient_status, warm_up_session, FetchFailure,
    FetchOutcome, HttpFetcher, PageFetcher, SessionCookies, SessionIdentity,
    TRANSIENT_STATUS_CODES,
};
pub use parser::{HtmlListingExtractor, PageExtractor};
pub use resolver::{digest_hex, DigestResolver};
pub use scheduler::{page_range, PageOutcome, ScheduledRun, Scheduler, WorkerFailure};
pub use worker::{BodyFetch, PageWorker};

pub use crate::output::RunReport;
