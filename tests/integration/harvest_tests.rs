//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! fetch, retry and checkpoint pipeline end-to-end.

use async_trait::async_trait;
use listing_harvester::config::load_config;
use listing_harvester::crawler::{
    build_http_client, digest_hex, fetch_url, page_range, Aggregator, BackoffPolicy,
    CheckpointManager, FetchFailure, FetchOutcome, Harvester, HttpFetcher, PageExtractor,
    PageFetcher, PageWorker, Scheduler, SessionIdentity,
};
use listing_harvester::output::{
    CheckpointPublisher, OutputResult, PublishOutcome, RecordSink, CSV_HEADER,
};
use listing_harvester::{HarvestError, ListingItem, Record};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "TestHarvester/1.0";

fn client() -> reqwest::Client {
    build_http_client(&SessionIdentity::anonymous(USER_AGENT)).expect("Failed to build client")
}

fn http_fetcher() -> Arc<dyn PageFetcher> {
    Arc::new(HttpFetcher::new(&SessionIdentity::anonymous(USER_AGENT)).expect("client"))
}

/// Yields one item per listed page number, nothing for other pages
struct CountingExtractor;

impl PageExtractor for CountingExtractor {
    fn extract(&self, page_url: &str, _content: &[u8]) -> Vec<ListingItem> {
        let page: u32 = page_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|segment| segment.parse().ok())
            .unwrap_or(0);

        let count = match page {
            3 => 2,
            1 => 1,
            _ => 0,
        };

        (0..count)
            .map(|i| ListingItem {
                position_in_page: i,
                title: format!("Page {} item {}", page, i),
                size: "700 MB".to_string(),
                resource_url: format!("mem://resource/{}-{}", page, i),
            })
            .collect()
    }
}

/// Serves every URL from memory with its own bytes as the body
struct EchoFetcher;

#[async_trait]
impl PageFetcher for EchoFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> FetchOutcome {
        FetchOutcome::Success(url.as_bytes().to_vec())
    }
}

#[derive(Default)]
struct MemorySink(Vec<Record>);

impl RecordSink for MemorySink {
    fn exists(&self) -> bool {
        true
    }

    fn append(&mut self, record: &Record) -> OutputResult<()> {
        self.0.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPublisher(Vec<String>);

impl CheckpointPublisher for RecordingPublisher {
    fn publish(&mut self, summary: &str) -> OutputResult<PublishOutcome> {
        self.0.push(summary.to_string());
        Ok(PublishOutcome::Published)
    }
}

#[tokio::test]
async fn test_fetch_success_returns_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page/1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>listing</html>"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/page/1/", mock_server.uri());
    match fetch_url(&client(), &url, Duration::from_secs(5)).await {
        FetchOutcome::Success(body) => assert_eq!(body, b"<html>listing</html>".to_vec()),
        other => panic!("Expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_classifies_statuses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/unavailable"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rate-limited"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = client();
    let timeout = Duration::from_secs(5);

    let outcome = fetch_url(&client, &format!("{}/unavailable", mock_server.uri()), timeout).await;
    assert!(matches!(
        outcome,
        FetchOutcome::TransientFailure(FetchFailure::Status(503))
    ));

    let outcome = fetch_url(&client, &format!("{}/rate-limited", mock_server.uri()), timeout).await;
    assert!(matches!(
        outcome,
        FetchOutcome::TransientFailure(FetchFailure::Status(429))
    ));

    let outcome = fetch_url(&client, &format!("{}/missing", mock_server.uri()), timeout).await;
    assert!(matches!(
        outcome,
        FetchOutcome::FatalFailure(FetchFailure::Status(404))
    ));
}

#[tokio::test]
async fn test_fetch_timeout_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .mount(&mock_server)
        .await;

    let url = format!("{}/slow", mock_server.uri());
    let outcome = fetch_url(&client(), &url, Duration::from_millis(100)).await;
    assert!(matches!(
        outcome,
        FetchOutcome::TransientFailure(FetchFailure::Timeout)
    ));
}

#[tokio::test]
async fn test_undecodable_body_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/corrupt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_bytes(b"this is not gzip data".to_vec()),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/corrupt", mock_server.uri());
    let outcome = fetch_url(&client(), &url, Duration::from_secs(5)).await;
    assert!(
        matches!(outcome, FetchOutcome::FatalFailure(FetchFailure::Body(_))),
        "Expected fatal body failure, got {:?}",
        outcome
    );
}

#[tokio::test]
async fn test_worker_does_not_retry_undecodable_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page/4/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_bytes(b"<html>plain text posing as gzip</html>".to_vec()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let template = format!("{}/page/{{page}}/", mock_server.uri());
    let worker = PageWorker::new(http_fetcher(), Arc::new(CountingExtractor), &template)
        .with_backoff(BackoffPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(10),
            3,
        ));

    let fetched = worker.fetch_body(4, &worker.page_url(4)).await;
    assert!(fetched.body.is_none());
    assert_eq!(fetched.retries, 0);
}

#[tokio::test]
async fn test_worker_retries_transient_failures_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page/7/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page/7/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let template = format!("{}/page/{{page}}/", mock_server.uri());
    let worker = PageWorker::new(http_fetcher(), Arc::new(CountingExtractor), &template)
        .with_backoff(BackoffPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(10),
            3,
        ));

    let fetched = worker.fetch_body(7, &worker.page_url(7)).await;
    assert_eq!(fetched.body, Some(b"ok".to_vec()));
    assert_eq!(fetched.retries, 2);
}

#[tokio::test]
async fn test_worker_gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;

    // One initial attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/page/3/"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let template = format!("{}/page/{{page}}/", mock_server.uri());
    let worker = PageWorker::new(http_fetcher(), Arc::new(CountingExtractor), &template)
        .with_backoff(BackoffPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(10),
            2,
        ));

    let result = worker.fetch_page(3).await;
    assert_eq!(result.page_number, 3);
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_worker_never_retries_fatal_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page/9/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let template = format!("{}/page/{{page}}/", mock_server.uri());
    let worker = PageWorker::new(http_fetcher(), Arc::new(CountingExtractor), &template)
        .with_backoff(BackoffPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(10),
            3,
        ));

    let fetched = worker.fetch_body(9, &worker.page_url(9)).await;
    assert!(fetched.body.is_none());
    assert_eq!(fetched.retries, 0);
}

#[tokio::test]
async fn test_descending_range_through_pipeline() {
    let worker = PageWorker::new(
        Arc::new(EchoFetcher),
        Arc::new(CountingExtractor),
        "mem://listing/{page}",
    );
    let scheduler = Scheduler::new(Arc::new(worker), 2, Duration::ZERO);

    let pages = page_range(3, 1);
    assert_eq!(
        pages.iter().map(|p| p.page_number).collect::<Vec<_>>(),
        vec![3, 2, 1]
    );

    let mut run = scheduler.run(pages);
    let mut checkpoints =
        CheckpointManager::new(MemorySink::default(), RecordingPublisher::default(), 1000);

    let stats = Aggregator::new().drain(&mut run, &mut checkpoints).await;

    assert_eq!(stats.pages_received, 3);
    assert_eq!(stats.pages_with_records, 2);
    assert_eq!(stats.pages_empty, 1);
    assert_eq!(stats.records_accepted, 3);
    assert_eq!(run.dispatched(), 3);

    let (sink, publisher, state) = checkpoints.into_parts();
    assert_eq!(sink.0.len(), 3);
    assert_eq!(state.total, 3);
    assert_eq!(state.since_checkpoint, 0);
    assert_eq!(
        publisher.0,
        vec!["Final update for remaining 3 records".to_string()]
    );

    // Page 3's records stay in extraction order wherever they landed
    let page_three: Vec<usize> = sink
        .0
        .iter()
        .filter(|r| r.page_number == 3)
        .map(|r| r.position_in_page)
        .collect();
    assert_eq!(page_three, vec![0, 1]);

    for record in &sink.0 {
        assert_eq!(record.digest, digest_hex(record.resource_url.as_bytes()));
    }
}

fn listing_html(items: &[(&str, &str, &str)]) -> String {
    let entries: String = items
        .iter()
        .map(|(href, title, size)| {
            format!(
                r#"<li>
                    <a class="production-block__li-wrapper" href="{}"><span class="text">{}</span></a>
                    <div class="duration"><span>{}</span></div>
                </li>"#,
                href, title, size
            )
        })
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", entries)
}

fn write_config(dir: &Path, server_uri: &str, csv_path: &str) -> std::path::PathBuf {
    write_split_config(dir, server_uri, server_uri, csv_path)
}

/// Writes a config whose listing site and resource CDN live on different hosts
fn write_split_config(
    dir: &Path,
    site_uri: &str,
    cdn_uri: &str,
    csv_path: &str,
) -> std::path::PathBuf {
    let config_path = dir.join("harvest.toml");
    let content = format!(
        r#"
[crawler]
start-page = 3
end-page = 1
concurrency = 2
max-attempts = 1
retry-base-delay-ms = 1
retry-max-delay-ms = 10
request-timeout-secs = 5
resource-timeout-secs = 5
pacing-ms = 0

[site]
page-url = "{site}/page/{{page}}/"
resource-url = "{cdn}/files/{{id}}.torrent"
warmup-url = "{site}/"

[output]
csv-path = "{csv}"
checkpoint-threshold = 2
"#,
        site = site_uri,
        cdn = cdn_uri,
        csv = csv_path
    );
    std::fs::write(&config_path, content).expect("Failed to write config");
    config_path
}

#[tokio::test]
async fn test_full_harvest_writes_csv() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Warm-up happens exactly once, before any page is fetched
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page/3/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[
            ("/video/101-first-show", "First Show", "1.2 GB"),
            ("/video/102-second-show", "Second Show", "800 MB"),
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page/2/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page/1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[(
            "/video/201-third-show",
            "Third Show",
            "2.0 GB",
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/101.torrent"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"torrent-101".to_vec()))
        .mount(&mock_server)
        .await;

    // Missing companion resource degrades to N/A instead of dropping the record
    Mock::given(method("GET"))
        .and(path("/files/102.torrent"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/201.torrent"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"torrent-201".to_vec()))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let csv_path = dir.path().join("data").join("listing.csv");
    let config_path = write_config(dir.path(), &base_url, &csv_path.to_string_lossy());
    let config = load_config(&config_path).expect("Failed to load config");

    let harvester = match Harvester::new(config).await {
        Ok(harvester) => harvester,
        Err(e) => panic!("Harvester setup failed: {}", e),
    };
    let report = harvester.run().await;

    assert_eq!(report.pages_dispatched, 3);
    assert_eq!(report.pages_with_records, 2);
    assert_eq!(report.pages_empty, 1);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(report.records_written, 3);
    assert!(report.checkpoints_published >= 1);

    let mut reader = csv::Reader::from_path(&csv_path).expect("Failed to open CSV");
    let headers = reader.headers().expect("Missing header").clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_HEADER.to_vec());

    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|row| {
            row.expect("Bad CSV row")
                .iter()
                .map(|field| field.to_string())
                .collect()
        })
        .collect();
    assert_eq!(rows.len(), 3);

    let first = rows
        .iter()
        .position(|row| row[1] == "First Show")
        .expect("First Show missing");
    let second = rows
        .iter()
        .position(|row| row[1] == "Second Show")
        .expect("Second Show missing");
    assert!(first < second, "Records of a page must keep extraction order");

    assert_eq!(rows[first][0], "3");
    assert_eq!(rows[first][2], "1.2 GB");
    assert_eq!(
        rows[first][3],
        format!("{}/files/101.torrent", base_url)
    );
    assert_eq!(
        rows[first][4],
        format!("magnet:?xt=urn:btih:{}", digest_hex(b"torrent-101"))
    );
    assert_eq!(rows[second][4], "N/A");

    let third = rows
        .iter()
        .find(|row| row[1] == "Third Show")
        .expect("Third Show missing");
    assert_eq!(third[0], "1");
    assert_eq!(
        third[4],
        format!("magnet:?xt=urn:btih:{}", digest_hex(b"torrent-201"))
    );
}

#[tokio::test]
async fn test_session_cookie_sent_to_site_only() {
    let site = MockServer::start().await;
    let cdn = MockServer::start().await;

    // Same server, but a different host name than the CDN's 127.0.0.1
    let site_uri = site.uri().replace("127.0.0.1", "localhost");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc123; Path=/")
                .set_body_string("<html>home</html>"),
        )
        .expect(1)
        .mount(&site)
        .await;

    // Pages only answer when the warm-up cookie is presented
    Mock::given(method("GET"))
        .and(path_regex(r"^/page/\d+/$"))
        .and(header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[(
            "/video/301-cookie-show",
            "Cookie Show",
            "3 GB",
        )])))
        .expect(3)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/301.torrent"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"torrent-301".to_vec()))
        .expect(3)
        .mount(&cdn)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let csv_path = dir.path().join("listing.csv");
    let config_path =
        write_split_config(dir.path(), &site_uri, &cdn.uri(), &csv_path.to_string_lossy());
    let config = load_config(&config_path).expect("Failed to load config");

    let harvester = match Harvester::new(config).await {
        Ok(harvester) => harvester,
        Err(e) => panic!("Harvester setup failed: {}", e),
    };
    let report = harvester.run().await;

    assert_eq!(report.records_written, 3);
    assert_eq!(report.pages_with_records, 3);

    let content = std::fs::read_to_string(&csv_path).expect("Failed to read CSV");
    assert_eq!(
        content
            .matches(&format!("magnet:?xt=urn:btih:{}", digest_hex(b"torrent-301")))
            .count(),
        3
    );

    let cdn_requests = cdn.received_requests().await.expect("Request recording disabled");
    assert_eq!(cdn_requests.len(), 3);
    for request in &cdn_requests {
        assert!(
            !request.headers.keys().any(|name| name.as_str() == "cookie"),
            "Resource request carried the session cookie"
        );
    }
}

#[tokio::test]
async fn test_rerun_appends_without_second_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[(
            "/video/55-only-show",
            "Only Show",
            "1 GB",
        )])))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let csv_path = dir.path().join("listing.csv");
    let config_path = write_config(dir.path(), &mock_server.uri(), &csv_path.to_string_lossy());

    for _ in 0..2 {
        let config = load_config(&config_path).expect("Failed to load config");
        let harvester = match Harvester::new(config).await {
            Ok(harvester) => harvester,
            Err(e) => panic!("Harvester setup failed: {}", e),
        };
        assert_eq!(harvester.run().await.records_written, 3);
    }

    let content = std::fs::read_to_string(&csv_path).expect("Failed to read CSV");
    assert_eq!(content.matches("page,title,size,download_link,magnet").count(), 1);
    assert_eq!(content.lines().count(), 7);
}

#[tokio::test]
async fn test_setup_fails_when_dataset_cannot_be_opened() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    // A directory where the CSV file should be
    let csv_path = dir.path().join("occupied");
    std::fs::create_dir(&csv_path).expect("Failed to create dir");

    let config_path = write_config(dir.path(), "http://127.0.0.1:9", &csv_path.to_string_lossy());
    let config = load_config(&config_path).expect("Failed to load config");

    match Harvester::new(config).await {
        Err(HarvestError::Output(_)) => {}
        Err(e) => panic!("Expected output error, got {}", e),
        Ok(_) => panic!("Expected setup to fail"),
    }
}
