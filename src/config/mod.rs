//! Configuration module for the harvester
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and applying command-line/environment overrides on top of them.
//!
//! # Example
//!
//! ```no_run
//! use listing_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting {} pages", config.crawler.page_count());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ConfigOverrides, CrawlerConfig, ExtractorConfig, OutputConfig, PublisherConfig,
    PublisherKind, SiteConfig, ID_PLACEHOLDER, PAGE_PLACEHOLDER,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_overrides};
pub use validation::validate;
