//! Page fetch worker
//!
//! A worker turns a page number into a [`PageResult`]:
//! 1. Fetch the page, retrying transient failures with exponential backoff
//! 2. Extract listing items from the body
//! 3. Resolve each item's companion digest (concurrently within the page)
//! 4. Restore extraction order
//!
//! A worker never fails outward. A page that cannot be fetched produces an
//! empty result.

use crate::config::{Config, PAGE_PLACEHOLDER};
use crate::crawler::backoff::BackoffPolicy;
use crate::crawler::fetcher::{FetchOutcome, PageFetcher};
use crate::crawler::parser::PageExtractor;
use crate::crawler::resolver::DigestResolver;
use crate::record::{ListingItem, PageResult, Record};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Body of a page fetch together with the retries it took
#[derive(Debug)]
pub struct BodyFetch {
    /// The page body, or `None` if the page was given up on
    pub body: Option<Vec<u8>>,

    /// Retries performed after the first attempt
    pub retries: u32,
}

/// Fetches, extracts and resolves a single listing page
pub struct PageWorker {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn PageExtractor>,
    resolver: DigestResolver,
    backoff: BackoffPolicy,
    page_url: String,
    request_timeout: Duration,
    resolve_concurrency: usize,
}

impl PageWorker {
    /// Creates a worker with default retry and timeout settings
    ///
    /// `page_url` is a template containing `{page}`. Companion resources are
    /// fetched through the same fetcher as pages.
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn PageExtractor>,
        page_url: &str,
    ) -> Self {
        let request_timeout = Duration::from_secs(10);
        Self {
            resolver: DigestResolver::new(Arc::clone(&fetcher), request_timeout),
            fetcher,
            extractor,
            backoff: BackoffPolicy::default(),
            page_url: page_url.to_string(),
            request_timeout,
            resolve_concurrency: 4,
        }
    }

    /// Creates a worker with settings taken from configuration
    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn PageExtractor>,
    ) -> Self {
        let crawler = &config.crawler;
        Self::new(Arc::clone(&fetcher), extractor, &config.site.page_url)
            .with_backoff(BackoffPolicy::from_config(crawler))
            .with_request_timeout(crawler.request_timeout())
            .with_resolver(DigestResolver::new(fetcher, crawler.resource_timeout()))
            .with_resolve_concurrency(crawler.resolve_concurrency as usize)
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_resolver(mut self, resolver: DigestResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_resolve_concurrency(mut self, concurrency: usize) -> Self {
        self.resolve_concurrency = concurrency.max(1);
        self
    }

    /// Builds the listing URL for a page number
    pub fn page_url(&self, page_number: u32) -> String {
        self.page_url
            .replace(PAGE_PLACEHOLDER, &page_number.to_string())
    }

    /// Harvests one page
    ///
    /// Returns an empty result when the page could not be fetched; the cause
    /// has already been logged.
    pub async fn fetch_page(&self, page_number: u32) -> PageResult {
        let url = self.page_url(page_number);

        let Some(body) = self.fetch_body(page_number, &url).await.body else {
            return PageResult::empty(page_number);
        };

        let items = self.extractor.extract(&url, &body);
        let records = self.resolve_items(page_number, items).await;

        // Resolution completes out of order; PageResult::new restores
        // extraction order before the result leaves the worker.
        let result = PageResult::new(page_number, records);
        debug_assert!(result.is_ordered());

        tracing::info!("Page {}: Found {} items", page_number, result.len());
        result
    }

    /// Fetches a page body with bounded retry
    ///
    /// Transient failures are retried while the backoff policy allows;
    /// fatal failures are never retried.
    pub async fn fetch_body(&self, page_number: u32, url: &str) -> BodyFetch {
        let mut attempt = 0;

        loop {
            match self.fetcher.fetch(url, self.request_timeout).await {
                FetchOutcome::Success(body) => {
                    return BodyFetch {
                        body: Some(body),
                        retries: attempt,
                    };
                }
                FetchOutcome::FatalFailure(cause) => {
                    tracing::error!(
                        page = page_number,
                        url,
                        error = %cause,
                        "Fatal fetch failure, skipping page"
                    );
                    return BodyFetch {
                        body: None,
                        retries: attempt,
                    };
                }
                FetchOutcome::TransientFailure(cause) => {
                    if !self.backoff.should_retry(attempt) {
                        tracing::error!(
                            page = page_number,
                            url,
                            retries = attempt,
                            error = %cause,
                            "Failed to crawl page after {} retries",
                            attempt
                        );
                        return BodyFetch {
                            body: None,
                            retries: attempt,
                        };
                    }

                    let delay = self.backoff.next_delay(attempt);
                    tracing::warn!(
                        page = page_number,
                        attempt = attempt + 1,
                        max_attempts = self.backoff.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %cause,
                        "Transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Resolves digests for a page's items, up to `resolve_concurrency` at a time
    ///
    /// The returned records are in completion order, not extraction order.
    async fn resolve_items(&self, page_number: u32, items: Vec<ListingItem>) -> Vec<Record> {
        let resolver = &self.resolver;

        stream::iter(items)
            .map(|item| async move {
                let digest = resolver.resolve(&item.resource_url).await;
                Record::from_item(page_number, item, digest)
            })
            .buffer_unordered(self.resolve_concurrency)
            .collect()
            .await
    }
}
