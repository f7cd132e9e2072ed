//! HTML listing extraction
//!
//! This module turns a listing page body into an ordered sequence of
//! [`ListingItem`]s. The selectors come from configuration; the defaults
//! match the layout of the listing site the harvester was first written for.

use crate::config::{Config, ExtractorConfig, ID_PLACEHOLDER};
use crate::record::{ListingItem, DIGEST_UNAVAILABLE};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Turns raw page content into listing items
///
/// Implementations never fail outward: unparseable content yields no items,
/// and an item without identity is skipped.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, page_url: &str, content: &[u8]) -> Vec<ListingItem>;
}

/// Selector-driven extractor for HTML listing pages
///
/// # Extraction Rules
///
/// For every element matching the item selector, in document order:
/// - The link selector must match an element with a non-empty `href`;
///   otherwise the item is skipped
/// - The resource id is the first `-`-separated token of the link's last
///   non-empty path segment (`/video/4821-some-title` gives `4821`)
/// - Title and size default to "N/A" when their selector matches nothing
///
/// `position_in_page` is the item's index among all matched elements, so
/// skipped items leave gaps.
#[derive(Debug, Clone)]
pub struct HtmlListingExtractor {
    item: Selector,
    link: Selector,
    title: Selector,
    size: Selector,
    resource_url: String,
}

impl HtmlListingExtractor {
    /// Creates an extractor from selectors and a resource URL template
    pub fn new(selectors: &ExtractorConfig, resource_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            item: parse_selector(&selectors.item_selector)?,
            link: parse_selector(&selectors.link_selector)?,
            title: parse_selector(&selectors.title_selector)?,
            size: parse_selector(&selectors.size_selector)?,
            resource_url: resource_url.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(&config.extractor, &config.site.resource_url)
    }

    fn extract_item(
        &self,
        position_in_page: usize,
        item: ElementRef<'_>,
        base_url: Option<&Url>,
    ) -> Option<ListingItem> {
        let href = item.select(&self.link).next()?.value().attr("href")?.trim();
        if href.is_empty() {
            return None;
        }

        let id = resource_id(href, base_url)?;

        Some(ListingItem {
            position_in_page,
            title: first_text(item, &self.title),
            size: first_text(item, &self.size),
            resource_url: self.resource_url.replace(ID_PLACEHOLDER, &id),
        })
    }
}

impl PageExtractor for HtmlListingExtractor {
    fn extract(&self, page_url: &str, content: &[u8]) -> Vec<ListingItem> {
        let html = String::from_utf8_lossy(content);
        let document = Html::parse_document(&html);
        let base_url = Url::parse(page_url).ok();

        document
            .select(&self.item)
            .enumerate()
            .filter_map(|(index, item)| self.extract_item(index, item, base_url.as_ref()))
            .collect()
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Trimmed text of the first match, or "N/A"
fn first_text(item: ElementRef<'_>, selector: &Selector) -> String {
    item.select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| DIGEST_UNAVAILABLE.to_string())
}

/// Derives the resource id from a listing link
///
/// Relative links are resolved against the page URL so that query strings
/// and fragments never leak into the id.
fn resource_id(href: &str, base_url: Option<&Url>) -> Option<String> {
    let resolved = match base_url {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    };

    let segment = match &resolved {
        Some(url) => url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .last()?
            .to_string(),
        None => href
            .split(['?', '#'])
            .next()?
            .split('/')
            .filter(|segment| !segment.is_empty())
            .last()?
            .to_string(),
    };

    let id = segment.split('-').next()?.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
