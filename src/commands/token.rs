//! `fotmob-token get` and `fotmob-token refresh`.

use std::process;

use chrono::Utc;
use serde_json::json;

use super::format_age;
use crate::cli::Cli;
use crate::color::ColorScheme;
use crate::credentials::{CredentialBundle, CredentialProvider, RefreshOutcome};

fn build_provider(cli: &Cli, colors: &ColorScheme) -> CredentialProvider {
  match CredentialProvider::new(cli.credential_config()) {
    Ok(provider) => provider,
    Err(e) => {
      eprintln!("{} {e:#}", colors.error("Error:"));
      process::exit(1);
    }
  }
}

/// Print a usable token, running the pipeline only when the cached one is
/// stale.
///
/// Human output goes to stderr apart from the token itself, so
/// `$(fotmob-token get)` captures just the token.
///
/// # Arguments
/// * `json` - Emit the whole bundle as a JSON document instead.
/// * `cli` - Parsed options the provider configuration is built from.
/// * `colors` - Shared color scheme.
pub(crate) async fn handle_get_command(json: bool, cli: &Cli, colors: &ColorScheme) {
  let provider = build_provider(cli, colors);
  let bundle = provider.get().await;

  if json {
    println!("{}", bundle_json(&bundle));
  } else {
    eprintln!(
      "{} {} {}",
      colors.provenance(bundle.source()),
      colors.dimmed("captured"),
      colors.dimmed(format!("{} ago", format_age(bundle.age_at(Utc::now()))))
    );
    if !bundle.is_valid() {
      eprintln!("{} {}", colors.warning("⚠"), colors.warning("no usable token available"));
    }
    println!("{}", bundle.token());
  }

  if !bundle.is_valid() {
    process::exit(2);
  }
}

/// Force a full acquisition and report provenance with a token preview.
///
/// Exits with status 2 when every strategy failed and even the default
/// bundle has no token.
pub(crate) async fn handle_refresh_command(json: bool, cli: &Cli, colors: &ColorScheme) {
  let provider = build_provider(cli, colors);

  if !json {
    println!("{} {}", colors.info("→"), colors.info("Refreshing token"));
    println!("  {}: {}", colors.emphasis("Site"), colors.link(&cli.source.site_url));
  }

  match provider.force_refresh().await {
    Ok(outcome) if json => println!("{}", outcome_json(&outcome)),
    Ok(outcome) => {
      let marker = if outcome.degraded {
        colors.warning("⚠")
      } else {
        colors.success("✓")
      };
      println!("\n{marker} {}", colors.emphasis("Token acquired"));
      println!("  {}: {}", colors.emphasis("Source"), colors.provenance(outcome.source));
      println!("  {}: {}", colors.emphasis("Token"), colors.code(&outcome.token_preview));
      println!(
        "  {}: {}",
        colors.emphasis("Captured"),
        colors.dimmed(outcome.captured_at.to_rfc3339())
      );
      if let Some(expires_at) = outcome.bundle.expires_at() {
        println!("  {}: {}", colors.emphasis("Expires"), colors.dimmed(expires_at.to_rfc3339()));
      }
      if outcome.degraded {
        println!(
          "\n{}",
          colors.warning("Live acquisition failed; serving a fallback that may be rejected upstream.")
        );
      }
    }
    Err(e) => {
      eprintln!("\n{} {}", colors.error("✗"), colors.error("Refresh failed"));
      eprintln!("  {e}");
      process::exit(2);
    }
  }
}

fn bundle_json(bundle: &CredentialBundle) -> serde_json::Value {
  json!({
    "source": bundle.source(),
    "token": bundle.token(),
    "token_header": bundle.token_header(),
    "headers": bundle.headers(),
    "captured_at": bundle.captured_at().to_rfc3339(),
    "degraded": bundle.is_degraded(),
  })
}

fn outcome_json(outcome: &RefreshOutcome) -> serde_json::Value {
  json!({
    "source": outcome.source,
    "token_preview": outcome.token_preview,
    "captured_at": outcome.captured_at.to_rfc3339(),
    "degraded": outcome.degraded,
  })
}
