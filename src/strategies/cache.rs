//! Last-resort reuse of the persisted bundle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ExtractionStrategy, StrategyError};
use crate::credentials::{CredentialBundle, CredentialStore, Source};

/// Re-reads the persisted bundle regardless of its age.
///
/// The bundle comes back relabelled as [`Source::CacheFile`] so callers can
/// tell it is a fallback.
pub struct CacheFileStrategy {
  store: Arc<CredentialStore>,
}

impl CacheFileStrategy {
  pub fn new(store: Arc<CredentialStore>) -> Self {
    Self { store }
  }
}

#[async_trait]
impl ExtractionStrategy for CacheFileStrategy {
  fn name(&self) -> &'static str {
    "cache-file"
  }

  fn source(&self) -> Source {
    Source::CacheFile
  }

  async fn attempt(&self) -> Result<Option<CredentialBundle>, StrategyError> {
    let bundle = self.store.load().await.map(|bundle| bundle.with_source(Source::CacheFile));
    if let Some(bundle) = &bundle {
      debug!(
        captured_at = %bundle.captured_at(),
        token = %bundle.token_preview(),
        "Reusing persisted bundle"
      );
    }
    Ok(bundle)
  }
}
