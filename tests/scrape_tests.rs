//! Landing page scraping against a local mock server

mod common;

use common::fixtures;
use common::test_config;
use fotmob_token::credentials::{CredentialProvider, Source};
use fotmob_token::strategies::{ExtractionStrategy, HttpScrapeStrategy, StrategyError};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve_landing_page(server: &MockServer, status: u16, body: &str) {
  Mock::given(method("GET"))
    .and(path("/"))
    .respond_with(
      ResponseTemplate::new(status)
        .insert_header("Content-Type", "text/html; charset=utf-8")
        .set_body_string(body),
    )
    .mount(server)
    .await;
}

#[tokio::test]
async fn test_scrape_finds_token_in_next_data() {
  let server = MockServer::start().await;
  let token = fixtures::live_token();
  serve_landing_page(&server, 200, &fixtures::next_data_page(&token)).await;

  let dir = TempDir::new().unwrap();
  let mut config = test_config(&dir);
  config.site_url = server.uri();

  let bundle = HttpScrapeStrategy::new(&config)
    .unwrap()
    .attempt()
    .await
    .unwrap()
    .expect("token should be found");

  assert_eq!(bundle.token(), token);
  assert_eq!(bundle.source(), Source::HttpScrape);
  assert_eq!(bundle.accept(), Some("application/json, text/plain, */*"));
  assert_eq!(bundle.header("x-mas"), Some(token.as_str()));
}

#[tokio::test]
async fn test_scrape_sends_browser_navigation_headers() {
  let server = MockServer::start().await;
  let token = "inline-marker-token-value-0123456789";
  Mock::given(method("GET"))
    .and(path("/"))
    .and(header("Sec-Fetch-Mode", "navigate"))
    .and(header("Upgrade-Insecure-Requests", "1"))
    .respond_with(ResponseTemplate::new(200).set_body_string(fixtures::inline_marker_page(token)))
    .expect(1)
    .mount(&server)
    .await;

  let dir = TempDir::new().unwrap();
  let mut config = test_config(&dir);
  config.site_url = server.uri();

  let bundle = HttpScrapeStrategy::new(&config).unwrap().attempt().await.unwrap().unwrap();
  assert_eq!(bundle.token(), token);
}

#[tokio::test]
async fn test_scrape_non_200_is_transport_failure() {
  let server = MockServer::start().await;
  serve_landing_page(&server, 403, "<html>Forbidden</html>").await;

  let dir = TempDir::new().unwrap();
  let mut config = test_config(&dir);
  config.site_url = server.uri();

  let result = HttpScrapeStrategy::new(&config).unwrap().attempt().await;
  match result {
    Err(StrategyError::Transport(err)) => assert!(err.to_string().contains("403")),
    other => panic!("expected transport failure, got {other:?}"),
  }
}

#[tokio::test]
async fn test_scrape_without_token_dumps_html() {
  let server = MockServer::start().await;
  serve_landing_page(&server, 200, fixtures::tokenless_page()).await;

  let dir = TempDir::new().unwrap();
  let dump_dir = dir.path().join("debug");
  let mut config = test_config(&dir);
  config.site_url = server.uri();
  config.debug_html_dir = Some(dump_dir.clone());

  let result = HttpScrapeStrategy::new(&config).unwrap().attempt().await.unwrap();
  assert!(result.is_none());

  let dumped: Vec<_> = std::fs::read_dir(&dump_dir).unwrap().map(|entry| entry.unwrap().path()).collect();
  assert_eq!(dumped.len(), 1);
  let content = std::fs::read_to_string(&dumped[0]).unwrap();
  assert!(content.contains("__NEXT_DATA__"));
}

#[tokio::test]
async fn test_provider_scrapes_and_persists_with_default_chain() {
  let server = MockServer::start().await;
  let token = fixtures::live_token();
  serve_landing_page(&server, 200, &fixtures::next_data_page(&token)).await;

  let dir = TempDir::new().unwrap();
  let mut config = test_config(&dir);
  config.site_url = server.uri();
  let bundle_path = config.bundle_path();
  let token_path = config.token_path();

  let provider = CredentialProvider::new(config).unwrap();
  let bundle = provider.get().await;

  assert_eq!(bundle.token(), token);
  assert_eq!(bundle.source(), Source::HttpScrape);
  assert!(bundle_path.exists());
  assert_eq!(std::fs::read_to_string(token_path).unwrap(), token);

  // A second call within the short TTL is served without another request.
  let again = provider.get().await;
  assert_eq!(again, bundle);
  assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
