//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Establishing session identity (user agent, cookies) with one warm-up request
//! - Building the shared, immutable HTTP client for the run
//! - Single GET requests with a per-call timeout
//! - Classifying failures as transient (retryable) or fatal

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// HTTP status codes treated as transient server-side failures
pub const TRANSIENT_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Cause of a failed fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Result of a single fetch attempt
#[derive(Debug)]
pub enum FetchOutcome {
    /// The full response body
    Success(Vec<u8>),

    /// Network-layer error or retryable status; worth retrying
    TransientFailure(FetchFailure),

    /// Non-retryable status or malformed request; retrying cannot help
    FatalFailure(FetchFailure),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalFailure(_))
    }
}

/// A single-shot fetch with a timeout
///
/// Implementations must be safe to call from many workers at once without
/// mutating shared state per call.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchOutcome;
}

/// Session cookies captured during warm-up, scoped to the warm-up host
///
/// Installed as the run client's cookie provider. It is read-only: cookies
/// set by later responses are ignored, and requests to any other host (such
/// as the companion resource CDN) carry no cookie at all.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    host: String,
    header: HeaderValue,
}

impl SessionCookies {
    pub fn new(host: &str, header: HeaderValue) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            header,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, _cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {}

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        if url.host_str() == Some(self.host.as_str()) {
            Some(self.header.clone())
        } else {
            None
        }
    }
}

/// Session-level identity shared by every request of a run
///
/// Captured once before the worker pool starts and never updated afterwards.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub user_agent: String,
    pub cookies: Option<SessionCookies>,
}

impl SessionIdentity {
    /// An identity with no session cookies
    pub fn anonymous(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            cookies: None,
        }
    }
}

/// Requests the warm-up URL once and captures the cookies it sets
///
/// A failed warm-up is not fatal: the run proceeds without session cookies.
pub async fn warm_up_session(
    user_agent: &str,
    warmup_url: Option<&str>,
    timeout: Duration,
) -> SessionIdentity {
    let Some(raw_url) = warmup_url else {
        return SessionIdentity::anonymous(user_agent);
    };

    let url = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(url = raw_url, error = %e, "Invalid warm-up URL, skipping warm-up");
            return SessionIdentity::anonymous(user_agent);
        }
    };

    let jar = Arc::new(Jar::default());
    let client = match Client::builder()
        .user_agent(user_agent)
        .cookie_provider(Arc::clone(&jar))
        .timeout(timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build warm-up client, skipping warm-up");
            return SessionIdentity::anonymous(user_agent);
        }
    };

    match client.get(url.clone()).send().await {
        Ok(response) => {
            tracing::info!("Session warm-up {} returned {}", url, response.status());
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Session warm-up request failed");
        }
    }

    let cookies = match (url.host_str(), jar.cookies(&url)) {
        (Some(host), Some(header)) => Some(SessionCookies::new(host, header)),
        _ => None,
    };

    SessionIdentity {
        user_agent: user_agent.to_string(),
        cookies,
    }
}

/// Builds the HTTP client used for the whole run
///
/// # Arguments
///
/// * `identity` - The session identity captured by [`warm_up_session`]
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(identity: &SessionIdentity) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(identity.user_agent.as_str())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(cookies) = &identity.cookies {
        builder = builder.cookie_provider(Arc::new(cookies.clone()));
    }

    builder.build()
}

/// Returns true for status codes worth retrying
pub fn is_transient_status(status: StatusCode) -> bool {
    TRANSIENT_STATUS_CODES.contains(&status.as_u16())
}

/// Fetches a URL once and classifies the result
///
/// # Classification
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | 2xx | Success with the full body |
/// | 408, 429, 500, 502, 503, 504 | TransientFailure |
/// | Other non-2xx | FatalFailure |
/// | Undecodable body (e.g. corrupt gzip) | FatalFailure |
/// | Timeout (request or body) | TransientFailure |
/// | Connection error | TransientFailure |
/// | Unparseable URL | FatalFailure |
pub async fn fetch_url(client: &Client, url: &str, timeout: Duration) -> FetchOutcome {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            return FetchOutcome::FatalFailure(FetchFailure::InvalidUrl(format!("{}: {}", url, e)))
        }
    };

    let response = match client.get(parsed).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(&e),
    };

    let status = response.status();
    if !status.is_success() {
        let failure = FetchFailure::Status(status.as_u16());
        return if is_transient_status(status) {
            FetchOutcome::TransientFailure(failure)
        } else {
            FetchOutcome::FatalFailure(failure)
        };
    }

    match response.bytes().await {
        Ok(body) => FetchOutcome::Success(body.to_vec()),
        Err(e) if e.is_timeout() => FetchOutcome::TransientFailure(FetchFailure::Timeout),
        Err(e) if e.is_decode() => FetchOutcome::FatalFailure(FetchFailure::Body(e.to_string())),
        Err(e) => FetchOutcome::TransientFailure(FetchFailure::Body(e.to_string())),
    }
}

/// Classifies a request-level error
fn classify_error(e: &reqwest::Error) -> FetchOutcome {
    if e.is_timeout() {
        FetchOutcome::TransientFailure(FetchFailure::Timeout)
    } else if e.is_connect() {
        FetchOutcome::TransientFailure(FetchFailure::Connect(e.to_string()))
    } else if e.is_builder() {
        FetchOutcome::FatalFailure(FetchFailure::InvalidUrl(e.to_string()))
    } else {
        FetchOutcome::TransientFailure(FetchFailure::Request(e.to_string()))
    }
}

/// [`PageFetcher`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher whose client carries the given session identity
    pub fn new(identity: &SessionIdentity) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(identity)?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchOutcome {
        fetch_url(&self.client, url, timeout).await
    }
}
