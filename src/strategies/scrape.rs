//! Token discovery from the landing page HTML.
//!
//! A single unauthenticated GET fetches the landing page, then three rules are
//! applied in order and the first hit wins:
//!
//! 1. [`ScrapeRule::NextData`]: find the credential header field inside the
//!    embedded `__NEXT_DATA__` JSON block.
//! 2. [`ScrapeRule::LongestJwt`]: pick the longest JWT-shaped string anywhere in
//!    the body.
//! 3. [`ScrapeRule::Marker`]: plain substring search for quoted
//!    `"<header>":"` style markers.
//!
//! The rules are pure functions over the HTML so they can be exercised
//! without a network.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ExtractionStrategy, StrategyError};
use crate::config::CredentialConfig;
use crate::credentials::{CredentialBundle, Source, token_preview};

/// Values must be strictly longer than this for rules 1 and 3.
const MIN_FIELD_TOKEN_LEN: usize = 20;

/// JWT candidates must be strictly longer than this for rule 2.
const MIN_JWT_TOKEN_LEN: usize = 100;

static NEXT_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?is)<script\b[^>]*\bid\s*=\s*["']__NEXT_DATA__["'][^>]*>(.*?)</script>"#)
    .expect("__NEXT_DATA__ pattern is valid")
});

static JWT_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"eyJ[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{50,}\.[A-Za-z0-9_-]+").expect("JWT pattern is valid")
});

/// Extraction rules, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeRule {
  NextData,
  LongestJwt,
  Marker,
}

impl fmt::Display for ScrapeRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::NextData => "next-data",
      Self::LongestJwt => "longest-jwt",
      Self::Marker => "marker",
    };
    f.write_str(name)
  }
}

/// Why a rule produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeMiss {
  /// No `<script id="__NEXT_DATA__">` block in the page
  NoNextDataBlock,
  /// The block exists but is not valid JSON
  NextDataNotJson(String),
  /// The JSON has no string field named after the credential header
  NoHeaderField,
  /// A candidate was found but is too short to be the token
  TooShort { len: usize },
  /// Nothing JWT-shaped anywhere in the page
  NoJwtCandidates,
  /// None of the quoted markers occur in the page
  NoMarker,
}

impl fmt::Display for ScrapeMiss {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NoNextDataBlock => write!(f, "no __NEXT_DATA__ block"),
      Self::NextDataNotJson(msg) => write!(f, "__NEXT_DATA__ is not JSON: {msg}"),
      Self::NoHeaderField => write!(f, "no header field in __NEXT_DATA__"),
      Self::TooShort { len } => write!(f, "best candidate too short ({len} chars)"),
      Self::NoJwtCandidates => write!(f, "no JWT-shaped strings"),
      Self::NoMarker => write!(f, "no quoted header marker"),
    }
  }
}

/// A token found in a page, with the rule that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
  pub token: String,
  pub rule: ScrapeRule,
}

/// Apply all three rules to `html`, returning the first hit.
///
/// # Errors
/// When every rule misses, returns each rule's reason in order so the caller
/// can log what was tried.
pub fn extract_token(html: &str, token_header: &str) -> Result<Extraction, Vec<(ScrapeRule, ScrapeMiss)>> {
  let mut misses = Vec::with_capacity(3);

  let rules: [(ScrapeRule, fn(&str, &str) -> Result<String, ScrapeMiss>); 3] = [
    (ScrapeRule::NextData, from_next_data),
    (ScrapeRule::LongestJwt, |html, _| longest_jwt(html)),
    (ScrapeRule::Marker, from_markers),
  ];

  for (rule, apply) in rules {
    match apply(html, token_header) {
      Ok(token) => return Ok(Extraction { token, rule }),
      Err(miss) => misses.push((rule, miss)),
    }
  }

  Err(misses)
}

/// Rule 1: the credential header field inside `__NEXT_DATA__`.
pub(crate) fn from_next_data(html: &str, token_header: &str) -> Result<String, ScrapeMiss> {
  let block = NEXT_DATA_RE
    .captures(html)
    .and_then(|captures| captures.get(1))
    .ok_or(ScrapeMiss::NoNextDataBlock)?;

  let data: Value = serde_json::from_str(block.as_str().trim()).map_err(|e| ScrapeMiss::NextDataNotJson(e.to_string()))?;

  let mut longest_rejected = None;
  let mut found = None;
  visit_header_fields(&data, token_header, &mut |value| {
    if found.is_some() {
      return;
    }
    if value.len() > MIN_FIELD_TOKEN_LEN {
      found = Some(value.to_string());
    } else {
      longest_rejected = longest_rejected.max(Some(value.len()));
    }
  });

  match (found, longest_rejected) {
    (Some(token), _) => Ok(token),
    (None, Some(len)) => Err(ScrapeMiss::TooShort { len }),
    (None, None) => Err(ScrapeMiss::NoHeaderField),
  }
}

fn visit_header_fields<'a>(value: &'a Value, token_header: &str, visit: &mut impl FnMut(&'a str)) {
  match value {
    Value::Object(map) => {
      for (key, child) in map {
        if key == token_header
          && let Some(text) = child.as_str()
        {
          visit(text);
        }
        visit_header_fields(child, token_header, visit);
      }
    }
    Value::Array(items) => {
      for item in items {
        visit_header_fields(item, token_header, visit);
      }
    }
    _ => {}
  }
}

/// Rule 2: the longest JWT-shaped string in the page; ties go to the first.
pub(crate) fn longest_jwt(html: &str) -> Result<String, ScrapeMiss> {
  let longest = JWT_RE
    .find_iter(html)
    .map(|m| m.as_str())
    .fold(None::<&str>, |best, candidate| match best {
      Some(current) if current.len() >= candidate.len() => Some(current),
      _ => Some(candidate),
    })
    .ok_or(ScrapeMiss::NoJwtCandidates)?;

  if longest.len() > MIN_JWT_TOKEN_LEN {
    Ok(longest.to_string())
  } else {
    Err(ScrapeMiss::TooShort { len: longest.len() })
  }
}

/// Rule 3: the value following a quoted `"<header>":"` marker.
pub(crate) fn from_markers(html: &str, token_header: &str) -> Result<String, ScrapeMiss> {
  let double = format!(r#""{token_header}":""#);
  let single = format!("'{token_header}':'");
  let literal_markers = [(double.as_str(), '"'), (single.as_str(), '\'')];

  let mut longest_rejected: Option<usize> = None;
  let mut accept = |rest: &str, quote: char| -> Option<String> {
    let end = rest.find(quote)?;
    let candidate = &rest[..end];
    if candidate.len() > MIN_FIELD_TOKEN_LEN {
      Some(candidate.to_string())
    } else {
      longest_rejected = longest_rejected.max(Some(candidate.len()));
      None
    }
  };

  for (marker, quote) in literal_markers {
    if let Some(idx) = html.find(marker)
      && let Some(token) = accept(&html[idx + marker.len()..], quote)
    {
      return Ok(token);
    }
  }

  let spaced = Regex::new(&format!(r#""{}"\s*:\s*""#, regex::escape(token_header)))
    .map_err(|_| ScrapeMiss::NoMarker)?;
  if let Some(m) = spaced.find(html)
    && let Some(token) = accept(&html[m.end()..], '"')
  {
    return Ok(token);
  }

  match longest_rejected {
    Some(len) => Err(ScrapeMiss::TooShort { len }),
    None => Err(ScrapeMiss::NoMarker),
  }
}

/// Fetches the landing page and applies [`extract_token`].
pub struct HttpScrapeStrategy {
  client: reqwest::Client,
  site_url: String,
  token_header: String,
  user_agent: String,
  debug_html_dir: Option<std::path::PathBuf>,
}

impl HttpScrapeStrategy {
  /// Create the strategy with its own client bound to the scrape timeout.
  ///
  /// # Errors
  /// Returns an error if the underlying `reqwest::Client` cannot be built.
  pub fn new(config: &CredentialConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(config.scrape_timeout)
      .user_agent(config.user_agent.clone())
      .build()
      .context("Failed to create HTTP client")?;

    Ok(Self {
      client,
      site_url: config.site_url.clone(),
      token_header: config.token_header.clone(),
      user_agent: config.user_agent.clone(),
      debug_html_dir: config.debug_html_dir.clone(),
    })
  }

  /// GET the landing page with a desktop-navigation header set.
  async fn fetch_landing_page(&self) -> Result<String> {
    let response = self
      .client
      .get(&self.site_url)
      .header(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,apng,*/*;q=0.8",
      )
      .header("Accept-Language", "en-US,en;q=0.9")
      .header("Cache-Control", "no-cache")
      .header("Pragma", "no-cache")
      .header("Sec-Ch-Ua", r#""Google Chrome";v="123", "Not:A-Brand";v="8", "Chromium";v="123""#)
      .header("Sec-Ch-Ua-Mobile", "?0")
      .header("Sec-Ch-Ua-Platform", r#""Windows""#)
      .header("Sec-Fetch-Dest", "document")
      .header("Sec-Fetch-Mode", "navigate")
      .header("Sec-Fetch-Site", "none")
      .header("Sec-Fetch-User", "?1")
      .header("Upgrade-Insecure-Requests", "1")
      .send()
      .await
      .with_context(|| format!("Failed to fetch {}", self.site_url))?;

    let status = response.status();
    if status != StatusCode::OK {
      return Err(anyhow!("Landing page returned {status}"));
    }

    response.text().await.context("Failed to read landing page body")
  }

  async fn dump_html(&self, dir: &Path, html: &str) {
    let path = dir.join(format!("landing-{}.html", chrono::Utc::now().format("%Y%m%dT%H%M%S")));
    let result: std::io::Result<()> = async {
      tokio::fs::create_dir_all(dir).await?;
      tokio::fs::write(&path, html).await
    }
    .await;

    match result {
      Ok(()) => debug!(path = %path.display(), "Saved landing page for inspection"),
      Err(err) => warn!(path = %path.display(), error = %err, "Failed to save landing page"),
    }
  }
}

#[async_trait]
impl ExtractionStrategy for HttpScrapeStrategy {
  fn name(&self) -> &'static str {
    "http-scrape"
  }

  fn source(&self) -> Source {
    Source::HttpScrape
  }

  async fn attempt(&self) -> Result<Option<CredentialBundle>, StrategyError> {
    let html = self.fetch_landing_page().await?;
    debug!(bytes = html.len(), url = %self.site_url, "Fetched landing page");

    let extraction = match extract_token(&html, &self.token_header) {
      Ok(extraction) => extraction,
      Err(misses) => {
        for (rule, miss) in &misses {
          debug!(%rule, reason = %miss, "Extraction rule missed");
        }
        if let Some(dir) = &self.debug_html_dir {
          self.dump_html(dir, &html).await;
        }
        return Ok(None);
      }
    };

    info!(
      rule = %extraction.rule,
      token = %token_preview(&extraction.token),
      "Found token in landing page"
    );

    match CredentialBundle::synthesized(&self.token_header, extraction.token, &self.user_agent, Source::HttpScrape) {
      Ok(bundle) => Ok(Some(bundle)),
      Err(err) => {
        warn!(rule = %extraction.rule, error = %err, "Discarding implausible token");
        Ok(None)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn jwt_of_len(total: usize) -> String {
    // eyJ + 17 = 20, two dots, 60-char middle segment, remainder in the last.
    let tail = total - 20 - 1 - 60 - 1;
    format!("eyJ{}.{}.{}", "a".repeat(17), "b".repeat(60), "c".repeat(tail))
  }

  #[test]
  fn test_marker_rule_extracts_exact_token() {
    let html = r#"<html><script>window.cfg = {"x-mas":"TOKEN12345678901234567890"};</script></html>"#;
    let extraction = extract_token(html, "x-mas").unwrap();
    assert_eq!(extraction.token, "TOKEN12345678901234567890");
    assert_eq!(extraction.rule, ScrapeRule::Marker);
  }

  #[test]
  fn test_marker_rule_single_quotes_and_spacing() {
    let single = "var h = {'x-mas':'SINGLEQUOTED-TOKEN-VALUE-123'};";
    assert_eq!(from_markers(single, "x-mas").unwrap(), "SINGLEQUOTED-TOKEN-VALUE-123");

    let spaced = r#"{ "x-mas" :  "SPACED-OUT-TOKEN-VALUE-456789" }"#;
    assert_eq!(from_markers(spaced, "x-mas").unwrap(), "SPACED-OUT-TOKEN-VALUE-456789");
  }

  #[test]
  fn test_marker_rule_rejects_short_values() {
    let html = r#"{"x-mas":"short"}"#;
    assert_eq!(from_markers(html, "x-mas"), Err(ScrapeMiss::TooShort { len: 5 }));
    assert_eq!(from_markers("<html></html>", "x-mas"), Err(ScrapeMiss::NoMarker));
  }

  #[test]
  fn test_longest_jwt_selects_longest() {
    let short = jwt_of_len(120);
    let long = jwt_of_len(340);
    assert_eq!(short.len(), 120);
    assert_eq!(long.len(), 340);

    let html = format!(r#"<div data-a="{short}"></div><div data-b="{long}"></div>"#);
    assert_eq!(longest_jwt(&html).unwrap(), long);

    let extraction = extract_token(&html, "x-mas").unwrap();
    assert_eq!(extraction.rule, ScrapeRule::LongestJwt);
    assert_eq!(extraction.token.len(), 340);
  }

  #[test]
  fn test_longest_jwt_ties_go_to_first() {
    let first = format!("eyJ{}.{}.{}", "a".repeat(17), "b".repeat(60), "1".repeat(38));
    let second = format!("eyJ{}.{}.{}", "a".repeat(17), "b".repeat(60), "2".repeat(38));
    let html = format!("{first} {second}");
    assert_eq!(longest_jwt(&html).unwrap(), first);
  }

  #[test]
  fn test_longest_jwt_requires_length_over_100() {
    let html = format!("token={}", jwt_of_len(100));
    assert_eq!(longest_jwt(&html), Err(ScrapeMiss::TooShort { len: 100 }));
    assert_eq!(longest_jwt("no tokens here"), Err(ScrapeMiss::NoJwtCandidates));
  }

  #[test]
  fn test_next_data_rule_finds_nested_field() {
    let html = r#"<html><head>
      <script id="__NEXT_DATA__" type="application/json">
        {"props":{"pageProps":{"fallback":{"headers":{"x-mas":"NEXTDATA-TOKEN-0123456789abcdef"}}}}}
      </script></head></html>"#;

    let extraction = extract_token(html, "x-mas").unwrap();
    assert_eq!(extraction.rule, ScrapeRule::NextData);
    assert_eq!(extraction.token, "NEXTDATA-TOKEN-0123456789abcdef");
  }

  #[test]
  fn test_next_data_rule_reports_named_misses() {
    assert_eq!(from_next_data("<html></html>", "x-mas"), Err(ScrapeMiss::NoNextDataBlock));

    let not_json = r#"<script id="__NEXT_DATA__" type="application/json">{oops</script>"#;
    assert!(matches!(
      from_next_data(not_json, "x-mas"),
      Err(ScrapeMiss::NextDataNotJson(_))
    ));

    let no_field = r#"<script id="__NEXT_DATA__" type="application/json">{"props":{}}</script>"#;
    assert_eq!(from_next_data(no_field, "x-mas"), Err(ScrapeMiss::NoHeaderField));

    let short = r#"<script id="__NEXT_DATA__" type="application/json">{"x-mas":"tiny"}</script>"#;
    assert_eq!(from_next_data(short, "x-mas"), Err(ScrapeMiss::TooShort { len: 4 }));
  }

  #[test]
  fn test_next_data_wins_over_other_rules() {
    let jwt = jwt_of_len(200);
    let html = format!(
      r#"<script id="__NEXT_DATA__" type="application/json">{{"x-mas":"FROM-NEXT-DATA-0123456789"}}</script>
         <p>{jwt}</p><script>{{"x-mas":"FROM-MARKER-RULE-0123456789"}}</script>"#
    );
    let extraction = extract_token(&html, "x-mas").unwrap();
    assert_eq!(extraction.token, "FROM-NEXT-DATA-0123456789");
  }

  #[test]
  fn test_extract_token_reports_all_misses() {
    let misses = extract_token("<html><body>nothing</body></html>", "x-mas").unwrap_err();
    assert_eq!(
      misses,
      vec![
        (ScrapeRule::NextData, ScrapeMiss::NoNextDataBlock),
        (ScrapeRule::LongestJwt, ScrapeMiss::NoJwtCandidates),
        (ScrapeRule::Marker, ScrapeMiss::NoMarker),
      ]
    );
  }
}
