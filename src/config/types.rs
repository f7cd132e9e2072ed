use serde::Deserialize;
use std::time::Duration;

/// Placeholder for the page number in `site.page-url`
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Placeholder for the resource id in `site.resource-url`
pub const ID_PLACEHOLDER: &str = "{id}";

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
}

/// Crawl range and pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First page to harvest
    #[serde(rename = "start-page")]
    pub start_page: u32,

    /// Last page to harvest (inclusive; may be below `start-page`)
    #[serde(rename = "end-page")]
    pub end_page: u32,

    /// Number of pages fetched concurrently
    pub concurrency: u32,

    /// Retries allowed for a page after a transient failure
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on a single backoff delay (milliseconds)
    #[serde(rename = "retry-max-delay-ms", default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Timeout for a listing page request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for a companion resource request (seconds)
    #[serde(rename = "resource-timeout-secs", default = "default_timeout_secs")]
    pub resource_timeout_secs: u64,

    /// Minimum spacing between completed pages (milliseconds)
    #[serde(rename = "pacing-ms", default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Companion resources resolved concurrently within one page
    #[serde(rename = "resolve-concurrency", default = "default_resolve_concurrency")]
    pub resolve_concurrency: u32,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_secs(self.resource_timeout_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Number of pages in the configured range
    pub fn page_count(&self) -> u32 {
        self.start_page.abs_diff(self.end_page).saturating_add(1)
    }
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Listing page URL template containing `{page}`
    #[serde(rename = "page-url")]
    pub page_url: String,

    /// Companion resource URL template containing `{id}`
    #[serde(rename = "resource-url")]
    pub resource_url: String,

    /// URL requested once before the run to establish session cookies
    #[serde(rename = "warmup-url", default)]
    pub warmup_url: Option<String>,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl SiteConfig {
    /// Expands the page URL template for a page number
    pub fn page_url_for(&self, page_number: u32) -> String {
        self.page_url
            .replace(PAGE_PLACEHOLDER, &page_number.to_string())
    }

    /// Expands the resource URL template for a resource id
    pub fn resource_url_for(&self, id: &str) -> String {
        self.resource_url.replace(ID_PLACEHOLDER, id)
    }
}

/// CSS selectors used by the HTML listing extractor
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    /// Selector matching one listing item
    #[serde(rename = "item", default = "default_item_selector")]
    pub item_selector: String,

    /// Selector (within an item) for the link carrying the resource id
    #[serde(rename = "link", default = "default_link_selector")]
    pub link_selector: String,

    /// Selector (within an item) for the title text
    #[serde(rename = "title", default = "default_title_selector")]
    pub title_selector: String,

    /// Selector (within an item) for the size text
    #[serde(rename = "size", default = "default_size_selector")]
    pub size_selector: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            item_selector: default_item_selector(),
            link_selector: default_link_selector(),
            title_selector: default_title_selector(),
            size_selector: default_size_selector(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the CSV dataset
    #[serde(rename = "csv-path")]
    pub csv_path: String,

    /// Records appended between two checkpoints
    #[serde(rename = "checkpoint-threshold", default = "default_checkpoint_threshold")]
    pub checkpoint_threshold: usize,
}

/// Which checkpoint publisher to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    /// Commit (and optionally push) the dataset with git
    Git,
    /// Only log checkpoint summaries
    #[default]
    Log,
}

/// Checkpoint publisher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    #[serde(default)]
    pub kind: PublisherKind,

    /// Push after each successful commit
    #[serde(default = "default_true")]
    pub push: bool,

    /// Track the dataset with git LFS when it is first created
    #[serde(default)]
    pub lfs: bool,

    /// Repository working directory (defaults to the current directory)
    #[serde(rename = "repo-dir", default)]
    pub repo_dir: Option<String>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kind: PublisherKind::default(),
            push: true,
            lfs: false,
            repo_dir: None,
        }
    }
}

/// Values that take precedence over the configuration file
///
/// Populated from command-line flags or their environment variables.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub start_page: Option<u32>,
    pub end_page: Option<u32>,
    pub concurrency: Option<u32>,
}

impl Config {
    /// Applies overrides in place
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(start) = overrides.start_page {
            self.crawler.start_page = start;
        }
        if let Some(end) = overrides.end_page {
            self.crawler.end_page = end;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.crawler.concurrency = concurrency;
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    5_000
}

fn default_retry_max_delay_ms() -> u64 {
    300_000
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_pacing_ms() -> u64 {
    1_000
}

fn default_resolve_concurrency() -> u32 {
    4
}

fn default_checkpoint_threshold() -> usize {
    1_000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .to_string()
}

fn default_item_selector() -> String {
    "li".to_string()
}

fn default_link_selector() -> String {
    "a.production-block__li-wrapper".to_string()
}

fn default_title_selector() -> String {
    "span.text".to_string()
}

fn default_size_selector() -> String {
    "div.duration span".to_string()
}

fn default_true() -> bool {
    true
}
