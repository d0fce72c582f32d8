//! Built-in default bundle.

use async_trait::async_trait;
use tracing::warn;

use super::{ExtractionStrategy, StrategyError};
use crate::config::CredentialConfig;
use crate::credentials::{CredentialBundle, Source};

/// Always produces a bundle from the configured default token.
///
/// The default token is a placeholder; requests made with it are expected to
/// fail upstream with an auth error rather than never being sent.
pub struct DefaultStrategy {
  token_header: String,
  token: String,
  user_agent: String,
}

impl DefaultStrategy {
  pub fn new(config: &CredentialConfig) -> Self {
    Self {
      token_header: config.token_header.clone(),
      token: config.default_token.clone(),
      user_agent: config.user_agent.clone(),
    }
  }
}

#[async_trait]
impl ExtractionStrategy for DefaultStrategy {
  fn name(&self) -> &'static str {
    "default"
  }

  fn source(&self) -> Source {
    Source::Default
  }

  async fn attempt(&self) -> Result<Option<CredentialBundle>, StrategyError> {
    let bundle =
      match CredentialBundle::synthesized(&self.token_header, self.token.as_str(), &self.user_agent, Source::Default) {
        Ok(bundle) => bundle,
        Err(err) => {
          warn!(error = %err, "Configured default token is implausible");
          CredentialBundle::unusable(&self.token_header, &self.user_agent)
        }
      };
    Ok(Some(bundle))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::PLACEHOLDER_TOKEN;

  #[tokio::test]
  async fn test_default_always_succeeds() {
    let strategy = DefaultStrategy::new(&CredentialConfig::default());
    let bundle = strategy.attempt().await.unwrap().unwrap();
    assert_eq!(bundle.token(), PLACEHOLDER_TOKEN);
    assert_eq!(bundle.source(), Source::Default);
    assert!(bundle.is_valid());
    assert!(bundle.is_degraded());
  }

  #[tokio::test]
  async fn test_short_default_yields_unusable_bundle() {
    let config = CredentialConfig {
      default_token: "nope".to_string(),
      ..CredentialConfig::default()
    };
    let bundle = DefaultStrategy::new(&config).attempt().await.unwrap().unwrap();
    assert!(bundle.token().is_empty());
    assert!(!bundle.is_valid());
  }
}
