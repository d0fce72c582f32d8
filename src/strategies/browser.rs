//! Token capture from live browser traffic.
//!
//! A headless Chromium is launched with a throwaway profile and remote
//! debugging on an ephemeral port. After navigating to the landing page the
//! strategy watches outgoing requests; the first one carrying the credential
//! header with a long enough value wins, and that request's whole header set
//! becomes the bundle's replay headers.
//!
//! The browser process never outlives an attempt: it is killed explicitly on
//! every path and `kill_on_drop` covers cancellation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::timeout;
use tracing::{debug, info, trace};

use super::cdp::{CdpConnection, required_str};
use super::{ExtractionStrategy, StrategyError};
use crate::config::CredentialConfig;
use crate::credentials::{CredentialBundle, Source, token_preview};

const DEVTOOLS_PREFIX: &str = "DevTools listening on ";

const BROWSER_CANDIDATES: &[&str] = &[
  "google-chrome",
  "google-chrome-stable",
  "chromium",
  "chromium-browser",
  "chrome",
  "msedge",
  "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
  "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Find a Chromium-based browser binary.
///
/// An explicit path is used as-is when it exists and is never substituted.
/// Otherwise well-known names are looked up on `PATH`, then well-known
/// absolute install locations.
pub fn locate_browser(explicit: Option<&Path>) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return path.is_file().then(|| path.to_path_buf());
  }

  let search_path = std::env::var_os("PATH").unwrap_or_default();
  BROWSER_CANDIDATES.iter().find_map(|candidate| {
    let candidate = Path::new(candidate);
    if candidate.is_absolute() {
      return candidate.is_file().then(|| candidate.to_path_buf());
    }
    std::env::split_paths(&search_path)
      .map(|dir| dir.join(candidate))
      .find(|path| path.is_file())
  })
}

/// Inspect one network event for the credential header.
///
/// Understands `Network.requestWillBeSent` (headers under `request.headers`)
/// and `Network.requestWillBeSentExtraInfo` (headers under `headers`, including
/// ones the renderer does not see, such as cookies).
///
/// # Returns
/// The token and the request's full header set when the header is present
/// with a value longer than `min_len`.
pub fn credential_from_event(
  method: &str,
  params: &Value,
  token_header: &str,
  min_len: usize,
) -> Option<(String, Vec<(String, String)>)> {
  let headers = match method {
    "Network.requestWillBeSent" => params.get("request")?.get("headers")?,
    "Network.requestWillBeSentExtraInfo" => params.get("headers")?,
    _ => return None,
  }
  .as_object()?;

  let token = headers
    .iter()
    .find(|(name, _)| name.eq_ignore_ascii_case(token_header))
    .and_then(|(_, value)| value.as_str())
    .filter(|value| value.len() > min_len)?
    .to_string();

  let captured = headers
    .iter()
    .map(|(name, value)| {
      let value = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
      };
      (name.clone(), value)
    })
    .collect();

  Some((token, captured))
}

/// A running headless browser with a throwaway profile.
struct BrowserProcess {
  child: Child,
  stderr: Option<Lines<BufReader<ChildStderr>>>,
  _profile: TempDir,
}

impl BrowserProcess {
  fn launch(executable: &Path, user_agent: &str) -> Result<Self, StrategyError> {
    let profile = TempDir::new()
      .map_err(|e| StrategyError::Unavailable(format!("cannot create browser profile directory: {e}")))?;

    let mut command = Command::new(executable);
    command
      .args([
        "--headless=new",
        "--disable-gpu",
        "--no-first-run",
        "--no-default-browser-check",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--remote-debugging-port=0",
      ])
      .arg(format!("--user-data-dir={}", profile.path().display()))
      .arg(format!("--user-agent={user_agent}"))
      .arg("about:blank")
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    let mut child = command
      .spawn()
      .map_err(|e| StrategyError::Unavailable(format!("failed to launch {}: {e}", executable.display())))?;
    let stderr = child.stderr.take().map(|stderr| BufReader::new(stderr).lines());

    debug!(executable = %executable.display(), pid = ?child.id(), "Launched headless browser");
    Ok(Self {
      child,
      stderr,
      _profile: profile,
    })
  }

  /// Read stderr until the browser announces its DevTools endpoint.
  ///
  /// Remaining stderr output is drained in the background so the browser
  /// never blocks on a full pipe.
  async fn devtools_url(&mut self) -> Result<String, StrategyError> {
    let mut lines = self
      .stderr
      .take()
      .ok_or_else(|| StrategyError::Unavailable("browser stderr is not captured".to_string()))?;

    let mut last_line = String::new();
    loop {
      let line = lines
        .next_line()
        .await
        .map_err(|e| StrategyError::Transport(anyhow::Error::new(e).context("Failed to read browser output")))?;

      let Some(line) = line else {
        return Err(StrategyError::Unavailable(format!(
          "browser exited before exposing DevTools (last output: {})",
          if last_line.is_empty() { "none" } else { last_line.as_str() }
        )));
      };

      if let Some(url) = line.trim().strip_prefix(DEVTOOLS_PREFIX) {
        let url = url.trim().to_string();
        tokio::spawn(async move {
          while let Ok(Some(line)) = lines.next_line().await {
            trace!(target: "browser", "{line}");
          }
        });
        return Ok(url);
      }

      trace!(target: "browser", "{line}");
      last_line = line;
    }
  }

  async fn shutdown(mut self) {
    if let Err(err) = self.child.kill().await {
      debug!(error = %err, "Browser already exited");
    }
  }
}

/// Captures the credential from headless browser traffic.
pub struct BrowserCaptureStrategy {
  site_url: String,
  token_header: String,
  user_agent: String,
  executable: Option<PathBuf>,
  timeout: Duration,
  settle_waits: Vec<Duration>,
  min_token_len: usize,
}

impl BrowserCaptureStrategy {
  pub fn new(config: &CredentialConfig) -> Self {
    Self {
      site_url: config.site_url.clone(),
      token_header: config.token_header.clone(),
      user_agent: config.user_agent.clone(),
      executable: config.browser.executable.clone(),
      timeout: config.browser.timeout,
      settle_waits: config.browser.settle_waits.clone(),
      min_token_len: config.browser.min_token_len,
    }
  }

  async fn capture(&self, browser: &mut BrowserProcess) -> Result<Option<CredentialBundle>, StrategyError> {
    let ws_url = browser.devtools_url().await?;
    debug!(%ws_url, "Connecting to DevTools");
    let mut cdp = CdpConnection::connect(&ws_url).await?;

    let target = cdp
      .call("Target.createTarget", json!({ "url": "about:blank" }), None)
      .await?;
    let target_id = required_str(&target, "Target.createTarget", "targetId")?;

    let attached = cdp
      .call(
        "Target.attachToTarget",
        json!({ "targetId": target_id, "flatten": true }),
        None,
      )
      .await?;
    let session_id = required_str(&attached, "Target.attachToTarget", "sessionId")?;

    cdp.call("Network.enable", json!({}), Some(&session_id)).await?;
    cdp
      .call("Page.navigate", json!({ "url": self.site_url }), Some(&session_id))
      .await?;
    debug!(url = %self.site_url, "Navigated; watching network traffic");

    for (window, wait) in self.settle_waits.iter().enumerate() {
      match timeout(*wait, self.watch_traffic(&mut cdp)).await {
        Ok(found) => {
          let (token, headers) = found?;
          cdp.close().await;
          info!(token = %token_preview(&token), window = window + 1, "Captured token from browser traffic");
          return Ok(CredentialBundle::new(&self.token_header, token, headers, Source::BrowserCapture).ok());
        }
        Err(_) => debug!(window = window + 1, wait_secs = wait.as_secs(), "No credential observed yet"),
      }
    }

    cdp.close().await;
    Ok(None)
  }

  async fn watch_traffic(&self, cdp: &mut CdpConnection) -> Result<(String, Vec<(String, String)>), StrategyError> {
    loop {
      let event = cdp.next_event().await?;
      if let Some(found) = credential_from_event(&event.method, &event.params, &self.token_header, self.min_token_len) {
        return Ok(found);
      }
    }
  }
}

#[async_trait]
impl ExtractionStrategy for BrowserCaptureStrategy {
  fn name(&self) -> &'static str {
    "browser-capture"
  }

  fn source(&self) -> Source {
    Source::BrowserCapture
  }

  async fn attempt(&self) -> Result<Option<CredentialBundle>, StrategyError> {
    let executable = locate_browser(self.executable.as_deref())
      .ok_or_else(|| StrategyError::Unavailable("no Chromium-based browser found".to_string()))?;

    let mut browser = BrowserProcess::launch(&executable, &self.user_agent)?;
    let outcome = timeout(self.timeout, self.capture(&mut browser)).await;
    browser.shutdown().await;

    match outcome {
      Ok(result) => result,
      Err(_) => {
        debug!(timeout_secs = self.timeout.as_secs(), "Browser capture timed out");
        Ok(None)
      }
    }
  }
}
