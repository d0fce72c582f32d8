//! Scripted extraction strategies for testing
//!
//! Each fake counts its invocations so tests can assert how often the
//! pipeline actually reached it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use fotmob_token::credentials::{CredentialBundle, Source};
use fotmob_token::strategies::{ExtractionStrategy, StrategyError};

use crate::common::fixtures;

/// What a [`FakeStrategy`] does when attempted.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
  /// Produce a valid bundle with the given source
  Token(Source),
  /// Run but find nothing
  NoSignal,
  /// Fail as if the network dropped
  TransportFailure,
  /// Fail as if the environment cannot run it
  Unavailable,
}

pub struct FakeStrategy {
  name: &'static str,
  outcome: Outcome,
  delay: Duration,
  token: String,
  calls: Arc<AtomicUsize>,
}

impl FakeStrategy {
  pub fn new(name: &'static str, outcome: Outcome) -> Self {
    Self {
      name,
      outcome,
      delay: Duration::ZERO,
      token: fixtures::live_token(),
      calls: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// Succeed with a live-sourced bundle
  pub fn succeeding(name: &'static str, source: Source) -> Self {
    Self::new(name, Outcome::Token(source))
  }

  /// Fail with a transport error
  pub fn failing(name: &'static str) -> Self {
    Self::new(name, Outcome::TransportFailure)
  }

  /// Sleep before producing the outcome
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn with_token(mut self, token: impl Into<String>) -> Self {
    self.token = token.into();
    self
  }

  /// Shared invocation counter, readable after the strategy is boxed
  pub fn calls(&self) -> Arc<AtomicUsize> {
    self.calls.clone()
  }

  pub fn boxed(self) -> Box<dyn ExtractionStrategy> {
    Box::new(self)
  }
}

#[async_trait]
impl ExtractionStrategy for FakeStrategy {
  fn name(&self) -> &'static str {
    self.name
  }

  fn source(&self) -> Source {
    match self.outcome {
      Outcome::Token(source) => source,
      _ => Source::HttpScrape,
    }
  }

  async fn attempt(&self) -> Result<Option<CredentialBundle>, StrategyError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }

    match self.outcome {
      Outcome::Token(source) => {
        let bundle = CredentialBundle::new(
          "x-mas",
          self.token.as_str(),
          [
            ("User-Agent", "FakeBrowser/1.0"),
            ("Referer", "https://www.fotmob.com/"),
          ],
          source,
        )
        .map_err(|e| StrategyError::Transport(anyhow!(e)))?;
        Ok(Some(bundle))
      }
      Outcome::NoSignal => Ok(None),
      Outcome::TransportFailure => Err(StrategyError::Transport(anyhow!("connection reset by peer"))),
      Outcome::Unavailable => Err(StrategyError::Unavailable("no browser binary".to_string())),
    }
  }
}

/// Read a counter
pub fn count(calls: &Arc<AtomicUsize>) -> usize {
  calls.load(Ordering::SeqCst)
}
