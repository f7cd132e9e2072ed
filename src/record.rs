//! Record types flowing through the harvest pipeline
//!
//! Records are created once by a page worker and then moved, never shared,
//! between the pipeline stages.

/// Digest value used when a record's companion resource could not be resolved
pub const DIGEST_UNAVAILABLE: &str = "N/A";

/// A request to harvest a single listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_number: u32,
}

impl PageRequest {
    pub fn new(page_number: u32) -> Self {
        Self { page_number }
    }
}

/// One item as yielded by a page extractor, before digest resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    /// Original extraction order within the page
    pub position_in_page: usize,

    /// Listing title, or "N/A" when absent
    pub title: String,

    /// Human-readable size, or "N/A" when absent
    pub size: String,

    /// URL of the companion resource whose content is digested
    pub resource_url: String,
}

/// A fully harvested record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub page_number: u32,
    pub position_in_page: usize,
    pub title: String,
    pub size: String,
    pub resource_url: String,

    /// Lowercase hex digest of the companion resource, or [`DIGEST_UNAVAILABLE`]
    pub digest: String,
}

impl Record {
    /// Builds a record from an extracted item and its resolved digest
    pub fn from_item(page_number: u32, item: ListingItem, digest: String) -> Self {
        Self {
            page_number,
            position_in_page: item.position_in_page,
            title: item.title,
            size: item.size,
            resource_url: item.resource_url,
            digest,
        }
    }

    /// Returns true if the digest could not be resolved
    pub fn digest_unavailable(&self) -> bool {
        self.digest == DIGEST_UNAVAILABLE
    }

    /// Formats the digest as a BitTorrent magnet link
    ///
    /// Returns "N/A" when the digest is unavailable.
    pub fn magnet_link(&self) -> String {
        if self.digest_unavailable() {
            DIGEST_UNAVAILABLE.to_string()
        } else {
            format!("magnet:?xt=urn:btih:{}", self.digest)
        }
    }
}

/// The records harvested from a single page
///
/// # Ordering invariant
///
/// `records` is sorted by `position_in_page` in non-decreasing order. Digests
/// within a page are resolved concurrently and complete out of order, so the
/// worker restores extraction order with [`PageResult::new`] before the result
/// leaves it. Downstream stages rely on this and never re-sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub page_number: u32,
    pub records: Vec<Record>,
}

impl PageResult {
    /// Creates a page result, restoring extraction order
    pub fn new(page_number: u32, mut records: Vec<Record>) -> Self {
        records.sort_by_key(|record| record.position_in_page);
        Self {
            page_number,
            records,
        }
    }

    /// Creates a result with no records (fetch failed or page was empty)
    pub fn empty(page_number: u32) -> Self {
        Self {
            page_number,
            records: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Checks the ordering invariant
    pub fn is_ordered(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| pair[0].position_in_page <= pair[1].position_in_page)
    }
}
