//! Companion resource digest resolution
//!
//! Companion resources are best-effort: each one is fetched once, with no
//! retry, and any failure degrades to [`DIGEST_UNAVAILABLE`] instead of
//! dropping the record.

use crate::crawler::fetcher::{FetchOutcome, PageFetcher};
use crate::record::DIGEST_UNAVAILABLE;
use sha1::{Digest, Sha1};
use std::sync::Arc;
use std::time::Duration;

/// Resolves a resource URL to the SHA-1 hex digest of its content
#[derive(Clone)]
pub struct DigestResolver {
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
}

impl DigestResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Fetches `url` once and digests the payload
    ///
    /// Never fails: returns [`DIGEST_UNAVAILABLE`] when the fetch does not
    /// succeed.
    pub async fn resolve(&self, url: &str) -> String {
        match self.fetcher.fetch(url, self.timeout).await {
            FetchOutcome::Success(body) => digest_hex(&body),
            FetchOutcome::TransientFailure(cause) | FetchOutcome::FatalFailure(cause) => {
                tracing::warn!(url, error = %cause, "Failed to resolve resource digest");
                DIGEST_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Lowercase hex SHA-1 of `content` (40 characters)
pub fn digest_hex(content: &[u8]) -> String {
    hex::encode(Sha1::digest(content))
}
