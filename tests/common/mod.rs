//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod fake_strategies;
pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use fotmob_token::config::CredentialConfig;
use fotmob_token::credentials::{CredentialProvider, CredentialStore};
use fotmob_token::strategies::ExtractionStrategy;
use tempfile::TempDir;

/// Configuration rooted in a temporary storage directory, browser disabled.
pub fn test_config(dir: &TempDir) -> CredentialConfig {
  let mut config = CredentialConfig {
    storage_dir: dir.path().join("responses"),
    scrape_timeout: Duration::from_secs(5),
    ..CredentialConfig::default()
  };
  config.browser.enabled = false;
  config
}

/// Provider over an explicit chain, sharing the store it returns.
pub fn provider_with(
  config: CredentialConfig,
  strategies: Vec<Box<dyn ExtractionStrategy>>,
) -> (CredentialProvider, Arc<CredentialStore>) {
  let store = Arc::new(CredentialStore::from_config(&config));
  let provider = CredentialProvider::with_strategies(config, store.clone(), strategies);
  (provider, store)
}
