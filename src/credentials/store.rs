//! Durable storage for the credential bundle.
//!
//! The bundle file is a flat JSON object: every string field is a replay
//! header (the token sits under its wire header name) and underscore-prefixed
//! fields carry metadata (`_timestamp`, `_scrapedAt`, `_source`). A plain-text
//! copy of the token is written next to it for tooling; it is never read back.
//!
//! Loading is best-effort. Any problem with the file is logged and reported as
//! "no bundle" so callers simply fall through to acquisition.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::types::{CredentialBundle, CredentialError, Source};
use crate::config::CredentialConfig;

const TIMESTAMP_FIELD: &str = "_timestamp";
const SCRAPED_AT_FIELD: &str = "_scrapedAt";
const SOURCE_FIELD: &str = "_source";

/// Why a persisted bundle could not be used.
#[derive(Debug)]
pub enum BundleFileError {
  /// No bundle file exists yet
  Missing,
  /// The file exists but could not be read
  Io(std::io::Error),
  /// The content is not a JSON object
  Malformed(String),
  /// The credential header field is absent
  MissingToken { field: String },
  /// The credential header field holds something other than a string
  TokenNotString { field: String },
  /// The token fails the plausibility rules
  InvalidToken(CredentialError),
  /// Neither `_timestamp` nor `_scrapedAt` is present
  MissingTimestamp,
  /// A timestamp field could not be interpreted
  InvalidTimestamp(String),
}

impl fmt::Display for BundleFileError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Missing => write!(f, "bundle file not found"),
      Self::Io(err) => write!(f, "I/O error: {err}"),
      Self::Malformed(msg) => write!(f, "malformed bundle file: {msg}"),
      Self::MissingToken { field } => write!(f, "bundle file has no '{field}' field"),
      Self::TokenNotString { field } => write!(f, "bundle file field '{field}' is not a string"),
      Self::InvalidToken(err) => write!(f, "bundle file token is unusable: {err}"),
      Self::MissingTimestamp => write!(f, "bundle file has no {TIMESTAMP_FIELD} or {SCRAPED_AT_FIELD} field"),
      Self::InvalidTimestamp(msg) => write!(f, "bundle file timestamp is invalid: {msg}"),
    }
  }
}

impl std::error::Error for BundleFileError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Io(err) => Some(err),
      Self::InvalidToken(err) => Some(err),
      _ => None,
    }
  }
}

impl From<std::io::Error> for BundleFileError {
  fn from(err: std::io::Error) -> Self {
    if err.kind() == std::io::ErrorKind::NotFound {
      Self::Missing
    } else {
      Self::Io(err)
    }
  }
}

/// Reads and writes the persisted bundle.
#[derive(Debug)]
pub struct CredentialStore {
  bundle_path: PathBuf,
  token_path: PathBuf,
  token_header: String,
  write_lock: Mutex<()>,
}

impl CredentialStore {
  /// Create a store for explicit file locations.
  ///
  /// # Arguments
  /// * `bundle_path` - Authoritative JSON bundle file.
  /// * `token_path` - Convenience raw-token file written alongside.
  /// * `token_header` - Wire name of the credential header inside the bundle.
  pub fn new(bundle_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>, token_header: impl Into<String>) -> Self {
    Self {
      bundle_path: bundle_path.into(),
      token_path: token_path.into(),
      token_header: token_header.into(),
      write_lock: Mutex::new(()),
    }
  }

  pub fn from_config(config: &CredentialConfig) -> Self {
    Self::new(config.bundle_path(), config.token_path(), config.token_header.clone())
  }

  pub fn bundle_path(&self) -> &Path {
    &self.bundle_path
  }

  pub fn token_path(&self) -> &Path {
    &self.token_path
  }

  /// Load the persisted bundle, whatever its age.
  ///
  /// # Returns
  /// `Some(bundle)` when the file exists and parses; `None` otherwise. The
  /// reason for a `None` is logged, never raised.
  pub async fn load(&self) -> Option<CredentialBundle> {
    match self.try_load().await {
      Ok(bundle) => Some(bundle),
      Err(BundleFileError::Missing) => {
        debug!(path = %self.bundle_path.display(), "No persisted bundle");
        None
      }
      Err(err) => {
        warn!(path = %self.bundle_path.display(), error = %err, "Ignoring unusable persisted bundle");
        None
      }
    }
  }

  /// Load the persisted bundle only if it is younger than `long_ttl`.
  pub async fn load_usable(&self, long_ttl: Duration) -> Option<CredentialBundle> {
    let bundle = self.load().await?;
    if Self::is_fresh(&bundle, long_ttl) {
      Some(bundle)
    } else {
      debug!(
        captured_at = %bundle.captured_at(),
        ttl_secs = long_ttl.as_secs(),
        "Persisted bundle is past its usable lifetime"
      );
      None
    }
  }

  /// Load the persisted bundle, reporting exactly why it is unusable.
  ///
  /// # Errors
  /// Returns a [`BundleFileError`] describing the first problem found.
  pub async fn try_load(&self) -> Result<CredentialBundle, BundleFileError> {
    let content = tokio::fs::read_to_string(&self.bundle_path).await?;
    parse_bundle_file(&content, &self.token_header)
  }

  /// Persist a bundle atomically.
  ///
  /// Writes go to a temporary file in the same directory which then replaces
  /// the target, so concurrent readers see either the old or the new bundle.
  ///
  /// # Errors
  /// Returns an error when the directory cannot be created or either file
  /// cannot be written.
  pub async fn save(&self, bundle: &CredentialBundle) -> Result<()> {
    let _guard = self.write_lock.lock().await;

    let rendered = serde_json::to_string_pretty(&render_bundle_file(bundle))
      .context("Failed to serialize credential bundle")?;

    write_atomic(&self.bundle_path, rendered.as_bytes())
      .await
      .with_context(|| format!("Failed to write bundle file {}", self.bundle_path.display()))?;

    write_atomic(&self.token_path, bundle.token().as_bytes())
      .await
      .with_context(|| format!("Failed to write token file {}", self.token_path.display()))?;

    debug!(
      path = %self.bundle_path.display(),
      source = %bundle.source(),
      token = %bundle.token_preview(),
      "Persisted credential bundle"
    );
    Ok(())
  }

  /// `true` iff `0 <= now - captured_at < ttl`. A bundle captured in the
  /// future is stale.
  pub fn is_fresh(bundle: &CredentialBundle, ttl: Duration) -> bool {
    Self::is_fresh_at(bundle, ttl, Utc::now())
  }

  /// [`CredentialStore::is_fresh`] against an explicit clock reading.
  pub fn is_fresh_at(bundle: &CredentialBundle, ttl: Duration, now: DateTime<Utc>) -> bool {
    let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
    let age = bundle.age_at(now);
    age >= TimeDelta::zero() && age < ttl
  }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };
  tokio::fs::create_dir_all(&dir).await?;

  let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or("bundle");
  let tmp_path = dir.join(format!(".{file_name}.tmp-{}", std::process::id()));

  tokio::fs::write(&tmp_path, contents).await?;
  if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
    let _ = tokio::fs::remove_file(&tmp_path).await;
    return Err(err);
  }
  Ok(())
}

/// Render a bundle into the on-disk JSON object.
pub(crate) fn render_bundle_file(bundle: &CredentialBundle) -> Value {
  let mut object: Map<String, Value> = bundle
    .headers()
    .iter()
    .map(|(name, value)| (name.clone(), Value::String(value.clone())))
    .collect();

  let captured_at = bundle.captured_at();
  object.insert(
    TIMESTAMP_FIELD.to_string(),
    Value::String(captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
  );
  object.insert(SCRAPED_AT_FIELD.to_string(), Value::from(captured_at.timestamp()));
  object.insert(SOURCE_FIELD.to_string(), Value::String(bundle.source().as_str().to_string()));

  Value::Object(object)
}

/// Parse the on-disk JSON object back into a bundle.
///
/// Files written before `_source` existed load as [`Source::CacheFile`].
pub(crate) fn parse_bundle_file(content: &str, token_header: &str) -> Result<CredentialBundle, BundleFileError> {
  let object: Map<String, Value> =
    serde_json::from_str(content).map_err(|e| BundleFileError::Malformed(e.to_string()))?;

  let captured_at = read_captured_at(&object)?;
  let source = read_source(&object);

  let (field, token) = object
    .iter()
    .find(|(name, _)| name.eq_ignore_ascii_case(token_header))
    .ok_or_else(|| BundleFileError::MissingToken {
      field: token_header.to_string(),
    })?;
  let token = token.as_str().ok_or_else(|| BundleFileError::TokenNotString { field: field.clone() })?;
  super::types::validate_token(token).map_err(BundleFileError::InvalidToken)?;

  let headers = object.iter().filter(|(name, _)| !name.starts_with('_')).filter_map(|(name, value)| {
    match value.as_str() {
      Some(value) => Some((name.clone(), value.to_string())),
      None => {
        debug!(field = %name, "Skipping non-string field in bundle file");
        None
      }
    }
  });

  let bundle = CredentialBundle::new(token_header, token, headers, source).map_err(BundleFileError::InvalidToken)?;
  Ok(bundle.with_captured_at(captured_at))
}

fn read_captured_at(object: &Map<String, Value>) -> Result<DateTime<Utc>, BundleFileError> {
  if let Some(value) = object.get(TIMESTAMP_FIELD) {
    let text = value
      .as_str()
      .ok_or_else(|| BundleFileError::InvalidTimestamp(format!("{TIMESTAMP_FIELD} is not a string")))?;
    return DateTime::parse_from_rfc3339(text)
      .map(|parsed| parsed.with_timezone(&Utc))
      .map_err(|e| BundleFileError::InvalidTimestamp(format!("{TIMESTAMP_FIELD} '{text}': {e}")));
  }

  if let Some(value) = object.get(SCRAPED_AT_FIELD) {
    let seconds = value
      .as_i64()
      .ok_or_else(|| BundleFileError::InvalidTimestamp(format!("{SCRAPED_AT_FIELD} is not an integer")))?;
    return DateTime::from_timestamp(seconds, 0)
      .ok_or_else(|| BundleFileError::InvalidTimestamp(format!("{SCRAPED_AT_FIELD} {seconds} is out of range")));
  }

  Err(BundleFileError::MissingTimestamp)
}

fn read_source(object: &Map<String, Value>) -> Source {
  object
    .get(SOURCE_FIELD)
    .cloned()
    .and_then(|value| serde_json::from_value(value).ok())
    .unwrap_or(Source::CacheFile)
}
