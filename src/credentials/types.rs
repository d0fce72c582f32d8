//! Strongly typed credential bundle and related errors.
//!
//! A [`CredentialBundle`] is the unit every part of the crate passes around:
//! the token, the headers that have to travel with it, and the moment it was
//! captured. Bundles are immutable; a refresh produces a new one.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Shortest token length considered plausible.
pub const MIN_TOKEN_LEN: usize = 20;

/// Header name every replay set must carry.
pub const USER_AGENT: &str = "User-Agent";

/// Accept header name used by synthesized bundles.
pub const ACCEPT: &str = "Accept";

/// Accept value the upstream JSON API expects.
pub const API_ACCEPT: &str = "application/json, text/plain, */*";

/// Desktop Chrome user agent used when a bundle arrives without one.
pub const DEFAULT_USER_AGENT: &str =
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

const PREVIEW_LEN: usize = 30;

/// Where a bundle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
  /// Built-in placeholder used when every other strategy failed.
  Default,
  /// Captured from live browser traffic.
  BrowserCapture,
  /// Scraped from the landing page HTML.
  HttpScrape,
  /// Re-read from the persisted bundle file regardless of age.
  CacheFile,
}

impl Source {
  /// Stable identifier used in logs and the persisted file.
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Default => "default",
      Self::BrowserCapture => "browser_capture",
      Self::HttpScrape => "http_scrape",
      Self::CacheFile => "cache_file",
    }
  }

  /// `true` for sources that observed the upstream site during this run.
  pub const fn is_live(self) -> bool {
    matches!(self, Self::BrowserCapture | Self::HttpScrape)
  }

  /// `true` when the bundle is a fallback and likely stale.
  pub const fn is_degraded(self) -> bool {
    matches!(self, Self::Default | Self::CacheFile)
  }
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors raised while building or handing out credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
  /// The token is empty, so the bundle must not be used
  EmptyToken,
  /// The token is shorter than [`MIN_TOKEN_LEN`]
  TokenTooShort { len: usize },
  /// Every strategy ran and none produced a usable token
  Exhausted { source: Source },
}

impl fmt::Display for CredentialError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::EmptyToken => write!(f, "token is empty"),
      Self::TokenTooShort { len } => {
        write!(f, "token is {len} characters, expected at least {MIN_TOKEN_LEN}")
      }
      Self::Exhausted { source } => {
        write!(f, "all strategies exhausted; last resort ({source}) has no usable token")
      }
    }
  }
}

impl std::error::Error for CredentialError {}

/// Check that a token meets the minimum plausibility length.
///
/// # Errors
/// Returns [`CredentialError::EmptyToken`] or
/// [`CredentialError::TokenTooShort`] when the token cannot be used.
pub fn validate_token(token: &str) -> Result<(), CredentialError> {
  match token.chars().count() {
    0 => Err(CredentialError::EmptyToken),
    len if len < MIN_TOKEN_LEN => Err(CredentialError::TokenTooShort { len }),
    _ => Ok(()),
  }
}

/// Whether a captured header may be replayed on an outbound request.
///
/// Connection-scoped names and HTTP/2 pseudo-headers belong to the original
/// connection and are dropped.
pub fn is_replayable_header(name: &str) -> bool {
  !(name.is_empty()
    || name.starts_with(':')
    || name.eq_ignore_ascii_case("connection")
    || name.eq_ignore_ascii_case("host"))
}

/// Shorten a token to a log-safe preview.
pub fn token_preview(token: &str) -> String {
  match token.char_indices().nth(PREVIEW_LEN) {
    Some((idx, _)) => format!("{}...", &token[..idx]),
    None => token.to_string(),
  }
}

/// A token plus the header set it must be replayed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
  token: String,
  token_header: String,
  headers: BTreeMap<String, String>,
  captured_at: DateTime<Utc>,
  source: Source,
}

impl CredentialBundle {
  /// Build a bundle captured now.
  ///
  /// The header set is sanitized: non-replayable names are dropped, the token
  /// is stored under `token_header` (replacing any differently-cased copy),
  /// and a `User-Agent` is added when none was captured.
  ///
  /// # Arguments
  /// * `token_header` - Wire name of the credential header (e.g. `x-mas`).
  /// * `token` - The credential value. May be empty, which yields an invalid
  ///   bundle; see [`CredentialBundle::is_valid`].
  /// * `headers` - Captured or synthesized headers to replay.
  /// * `source` - Provenance of the bundle.
  ///
  /// # Errors
  /// Returns [`CredentialError::TokenTooShort`] when a non-empty token is
  /// shorter than [`MIN_TOKEN_LEN`].
  pub fn new<I, K, V>(
    token_header: impl Into<String>,
    token: impl Into<String>,
    headers: I,
    source: Source,
  ) -> Result<Self, CredentialError>
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let token = token.into();
    if let Err(err @ CredentialError::TokenTooShort { .. }) = validate_token(&token) {
      return Err(err);
    }

    let token_header = token_header.into();
    let mut sanitized: BTreeMap<String, String> = headers
      .into_iter()
      .map(|(name, value)| (name.into(), value.into()))
      .filter(|(name, _)| is_replayable_header(name) && !name.eq_ignore_ascii_case(&token_header))
      .collect();

    if !token.is_empty() {
      sanitized.insert(token_header.clone(), token.clone());
    }

    if !sanitized.keys().any(|name| name.eq_ignore_ascii_case(USER_AGENT)) {
      sanitized.insert(USER_AGENT.to_string(), DEFAULT_USER_AGENT.to_string());
    }

    Ok(Self {
      token,
      token_header,
      headers: sanitized,
      captured_at: Utc::now().trunc_subsecs(3),
      source,
    })
  }

  /// Build a bundle with only the synthesized API headers.
  ///
  /// # Errors
  /// Same as [`CredentialBundle::new`].
  pub fn synthesized(
    token_header: impl Into<String>,
    token: impl Into<String>,
    user_agent: &str,
    source: Source,
  ) -> Result<Self, CredentialError> {
    Self::new(
      token_header,
      token,
      [(USER_AGENT, user_agent), (ACCEPT, API_ACCEPT)],
      source,
    )
  }

  /// A default-sourced bundle with no token. Never valid.
  pub fn unusable(token_header: impl Into<String>, user_agent: &str) -> Self {
    let headers = BTreeMap::from([
      (USER_AGENT.to_string(), user_agent.to_string()),
      (ACCEPT.to_string(), API_ACCEPT.to_string()),
    ]);
    Self {
      token: String::new(),
      token_header: token_header.into(),
      headers,
      captured_at: Utc::now().trunc_subsecs(3),
      source: Source::Default,
    }
  }

  /// Replace the capture time. Used when restoring a persisted bundle.
  pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
    self.captured_at = captured_at.trunc_subsecs(3);
    self
  }

  /// Relabel provenance. Used when a persisted bundle is served as a fallback.
  pub fn with_source(mut self, source: Source) -> Self {
    self.source = source;
    self
  }

  pub fn token(&self) -> &str {
    &self.token
  }

  pub fn token_header(&self) -> &str {
    &self.token_header
  }

  /// Replay header set, token included.
  pub fn headers(&self) -> &BTreeMap<String, String> {
    &self.headers
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }

  pub fn user_agent(&self) -> &str {
    self.header(USER_AGENT).unwrap_or(DEFAULT_USER_AGENT)
  }

  pub fn accept(&self) -> Option<&str> {
    self.header(ACCEPT)
  }

  pub fn captured_at(&self) -> DateTime<Utc> {
    self.captured_at
  }

  pub fn source(&self) -> Source {
    self.source
  }

  /// `true` when the token meets the plausibility rules.
  pub fn is_valid(&self) -> bool {
    validate_token(&self.token).is_ok()
  }

  pub fn is_degraded(&self) -> bool {
    self.source.is_degraded()
  }

  /// Age of the bundle relative to `now`. Negative when captured in the future.
  pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
    now.signed_duration_since(self.captured_at)
  }

  pub fn token_preview(&self) -> String {
    token_preview(&self.token)
  }

  /// Expiry taken from the token's `exp` claim, when the token is a JWT.
  ///
  /// Informational only; freshness is decided by capture time.
  pub fn expires_at(&self) -> Option<DateTime<Utc>> {
    let payload = self.token.split('.').nth(1)?;
    let decoded = BASE64_URL.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
  }

  /// Attach the replay headers to an outbound request.
  pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    self
      .headers
      .iter()
      .filter(|(name, _)| is_replayable_header(name))
      .fold(request, |request, (name, value)| request.header(name.as_str(), value.as_str()))
  }
}
