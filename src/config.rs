//! Runtime configuration for credential acquisition.
//!
//! Everything the provider needs to know (TTLs, storage location, upstream
//! URL, browser settings) lives in [`CredentialConfig`], which is built once
//! and injected at construction time.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use url::Url;

use crate::credentials::DEFAULT_USER_AGENT;

/// Landing page that embeds the token.
pub const DEFAULT_SITE_URL: &str = "https://www.fotmob.com";

/// Header the upstream API expects the token in.
pub const DEFAULT_TOKEN_HEADER: &str = "x-mas";

/// Non-functional placeholder served when nothing else is available.
///
/// Deliberately not a real token: requests made with it fail upstream with an
/// auth error instead of never being sent.
pub const PLACEHOLDER_TOKEN: &str = "placeholder-token-no-credential-available";

/// Headless browser settings.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
  /// Run the browser strategy at all
  pub enabled: bool,
  /// Explicit browser binary; searched on `PATH` when unset
  pub executable: Option<PathBuf>,
  /// Hard wall-clock budget, launch included
  pub timeout: Duration,
  /// Sequential observation windows after navigation
  pub settle_waits: Vec<Duration>,
  /// Minimum credential header length accepted from traffic
  pub min_token_len: usize,
}

impl Default for BrowserConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      executable: None,
      timeout: Duration::from_secs(45),
      settle_waits: vec![Duration::from_secs(5), Duration::from_secs(5)],
      min_token_len: 100,
    }
  }
}

/// Configuration injected into [`crate::credentials::CredentialProvider`].
#[derive(Debug, Clone)]
pub struct CredentialConfig {
  /// Landing page fetched by the scrape and browser strategies
  pub site_url: String,
  /// Wire name of the credential header
  pub token_header: String,
  /// Directory holding the bundle and raw token files
  pub storage_dir: PathBuf,
  /// Maximum age of a persisted bundle that is still usable at all
  pub long_ttl: Duration,
  /// Maximum age before a request triggers a proactive refresh
  pub short_ttl: Duration,
  /// Budget for the single scrape GET
  pub scrape_timeout: Duration,
  /// User agent for scraping and synthesized bundles
  pub user_agent: String,
  /// Token served by the last-resort default strategy
  pub default_token: String,
  /// Where to dump landing page HTML when no extraction rule matches
  pub debug_html_dir: Option<PathBuf>,
  pub browser: BrowserConfig,
}

impl Default for CredentialConfig {
  fn default() -> Self {
    Self {
      site_url: DEFAULT_SITE_URL.to_string(),
      token_header: DEFAULT_TOKEN_HEADER.to_string(),
      storage_dir: PathBuf::from("responses"),
      long_ttl: Duration::from_secs(24 * 60 * 60),
      short_ttl: Duration::from_secs(2 * 60),
      scrape_timeout: Duration::from_secs(15),
      user_agent: DEFAULT_USER_AGENT.to_string(),
      default_token: PLACEHOLDER_TOKEN.to_string(),
      debug_html_dir: None,
      browser: BrowserConfig::default(),
    }
  }
}

impl CredentialConfig {
  /// Path of the authoritative bundle file.
  pub fn bundle_path(&self) -> PathBuf {
    self.storage_dir.join("currency_api_headers.json")
  }

  /// Path of the convenience raw-token file.
  pub fn token_path(&self) -> PathBuf {
    self.storage_dir.join(format!("{}-token.txt", self.token_header))
  }

  /// Check the configuration for values that cannot work.
  ///
  /// # Errors
  /// Returns an error when the site URL does not parse, the header name is
  /// empty, a timeout is zero, or the short TTL is not below the long TTL.
  pub fn validate(&self) -> Result<()> {
    let url = Url::parse(&self.site_url).map_err(|e| anyhow::anyhow!("Invalid site URL '{}': {e}", self.site_url))?;
    if !matches!(url.scheme(), "http" | "https") {
      bail!("Site URL must use http or https, got '{}'", url.scheme());
    }

    if self.token_header.trim().is_empty() {
      bail!("Token header name must not be empty");
    }

    if self.short_ttl.is_zero() || self.long_ttl.is_zero() {
      bail!("TTLs must be greater than zero");
    }

    if self.short_ttl >= self.long_ttl {
      bail!(
        "Short TTL ({}s) must be below the long TTL ({}s)",
        self.short_ttl.as_secs(),
        self.long_ttl.as_secs()
      );
    }

    if self.scrape_timeout.is_zero() || self.browser.timeout.is_zero() {
      bail!("Timeouts must be greater than zero");
    }

    Ok(())
  }
}
