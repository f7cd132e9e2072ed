use crate::config::types::{
    Config, CrawlerConfig, ExtractorConfig, OutputConfig, SiteConfig, ID_PLACEHOLDER,
    PAGE_PLACEHOLDER,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Largest page range a single run may cover
pub const MAX_PAGE_SPAN: u32 = 1_000_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_extractor_config(&config.extractor)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.page_count() > MAX_PAGE_SPAN {
        return Err(ConfigError::Validation(format!(
            "page range {}..{} covers more than {} pages",
            config.start_page, config.end_page, MAX_PAGE_SPAN
        )));
    }

    if config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be <= 10, got {}",
            config.max_attempts
        )));
    }

    if config.retry_max_delay_ms < config.retry_base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry_max_delay_ms ({}) must be >= retry_base_delay_ms ({})",
            config.retry_max_delay_ms, config.retry_base_delay_ms
        )));
    }

    if config.request_timeout_secs < 1 || config.resource_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request and resource timeouts must be >= 1s".to_string(),
        ));
    }

    if config.resolve_concurrency < 1 || config.resolve_concurrency > 32 {
        return Err(ConfigError::Validation(format!(
            "resolve_concurrency must be between 1 and 32, got {}",
            config.resolve_concurrency
        )));
    }

    Ok(())
}

/// Validates site URL templates
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_template(&config.page_url, PAGE_PLACEHOLDER, "1")?;
    validate_template(&config.resource_url, ID_PLACEHOLDER, "1")?;

    if let Some(warmup) = &config.warmup_url {
        validate_http_url(warmup)?;
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a template carries its placeholder and expands to an HTTP(S) URL
fn validate_template(template: &str, placeholder: &str, sample: &str) -> Result<(), ConfigError> {
    if !template.contains(placeholder) {
        return Err(ConfigError::Validation(format!(
            "URL template '{}' must contain '{}'",
            template, placeholder
        )));
    }

    validate_http_url(&template.replace(placeholder, sample))
}

fn validate_http_url(raw: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' must use http or https",
            raw
        )));
    }

    Ok(())
}

/// Validates that every selector parses
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.item_selector,
        &config.link_selector,
        &config.title_selector,
        &config.size_selector,
    ] {
        Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
            selector: selector.clone(),
            message: format!("{:?}", e),
        })?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.csv_path.is_empty() {
        return Err(ConfigError::Validation(
            "csv_path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint_threshold must be >= 1, got {}",
            config.checkpoint_threshold
        )));
    }

    Ok(())
}
