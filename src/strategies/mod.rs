//! Extraction strategies.
//!
//! Each strategy is one independent way of obtaining a
//! [`CredentialBundle`]. The [`AcquisitionPipeline`](crate::pipeline::AcquisitionPipeline)
//! tries them in order and keeps the first success, so the fallback order is
//! just the order of the list built by [`default_chain`].

mod browser;
mod cache;
mod cdp;
mod fallback;
mod scrape;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

pub use browser::{BrowserCaptureStrategy, credential_from_event, locate_browser};
pub use cache::CacheFileStrategy;
pub use fallback::DefaultStrategy;
pub use scrape::{Extraction, HttpScrapeStrategy, ScrapeMiss, ScrapeRule, extract_token};

use crate::config::CredentialConfig;
use crate::credentials::{CredentialBundle, CredentialStore, Source};

/// Why a strategy could not run to completion.
///
/// Not finding a token is not an error; strategies report that as `Ok(None)`.
#[derive(Debug)]
pub enum StrategyError {
  /// The strategy cannot run in this environment (e.g. no browser binary)
  Unavailable(String),
  /// Network, protocol or process failure while running
  Transport(anyhow::Error),
}

impl fmt::Display for StrategyError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Unavailable(reason) => write!(f, "unavailable: {reason}"),
      Self::Transport(err) => write!(f, "transport failure: {err:#}"),
    }
  }
}

impl std::error::Error for StrategyError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Transport(err) => Some(&**err),
      Self::Unavailable(_) => None,
    }
  }
}

impl From<anyhow::Error> for StrategyError {
  fn from(err: anyhow::Error) -> Self {
    Self::Transport(err)
  }
}

/// One way of producing a credential bundle.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
  /// Short name used in logs.
  fn name(&self) -> &'static str;

  /// Provenance stamped on bundles this strategy produces.
  fn source(&self) -> Source;

  /// Try to produce a bundle.
  ///
  /// # Returns
  /// * `Ok(Some(bundle))` when a credential was found.
  /// * `Ok(None)` when the strategy ran but saw no credential.
  ///
  /// # Errors
  /// Returns [`StrategyError`] when the strategy could not run. The pipeline
  /// treats this the same as `Ok(None)` apart from logging.
  async fn attempt(&self) -> Result<Option<CredentialBundle>, StrategyError>;
}

/// Build the standard fallback chain: browser capture (when enabled), HTTP
/// scrape, persisted file, built-in default.
///
/// # Errors
/// Returns an error when the HTTP client for the scrape strategy cannot be
/// built.
pub fn default_chain(config: &CredentialConfig, store: Arc<CredentialStore>) -> Result<Vec<Box<dyn ExtractionStrategy>>> {
  let mut chain: Vec<Box<dyn ExtractionStrategy>> = Vec::with_capacity(4);

  if config.browser.enabled {
    chain.push(Box::new(BrowserCaptureStrategy::new(config)));
  }
  chain.push(Box::new(HttpScrapeStrategy::new(config)?));
  chain.push(Box::new(CacheFileStrategy::new(store)));
  chain.push(Box::new(DefaultStrategy::new(config)));

  Ok(chain)
}
