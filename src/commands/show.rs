//! `fotmob-token show`: offline inspection of the persisted bundle.

use std::process;

use chrono::Utc;

use super::format_age;
use crate::cli::Cli;
use crate::color::ColorScheme;
use crate::credentials::{BundleFileError, CredentialStore};

/// Print where the bundle lives, what it contains, and how fresh it is
/// against both TTLs. Never touches the network.
///
/// Exits with status 1 when there is no readable bundle.
pub(crate) async fn handle_show_command(cli: &Cli, colors: &ColorScheme) {
  let config = cli.credential_config();
  let store = CredentialStore::from_config(&config);

  println!("{} {}", colors.info("→"), colors.info("Persisted credential bundle"));
  println!("  {}: {}", colors.emphasis("Bundle file"), colors.path(store.bundle_path().display()));
  println!("  {}: {}", colors.emphasis("Token file"), colors.path(store.token_path().display()));

  let bundle = match store.try_load().await {
    Ok(bundle) => bundle,
    Err(BundleFileError::Missing) => {
      println!("\n{} {}", colors.warning("⚠"), colors.warning("No bundle has been saved yet"));
      println!("  Run {} to acquire one.", colors.code("fotmob-token refresh"));
      process::exit(1);
    }
    Err(e) => {
      eprintln!("\n{} {}", colors.error("✗"), colors.error("Bundle file is unusable"));
      eprintln!("  {e}");
      process::exit(1);
    }
  };

  let now = Utc::now();
  let freshness = |ttl| {
    if CredentialStore::is_fresh_at(&bundle, ttl, now) {
      colors.success("fresh")
    } else {
      colors.warning("stale")
    }
  };

  println!();
  println!("  {}: {}", colors.emphasis("Source"), colors.provenance(bundle.source()));
  println!("  {}: {}", colors.emphasis("Token"), colors.code(bundle.token_preview()));
  println!(
    "  {}: {} ({} ago)",
    colors.emphasis("Captured"),
    bundle.captured_at().to_rfc3339(),
    format_age(bundle.age_at(now))
  );
  if let Some(expires_at) = bundle.expires_at() {
    println!("  {}: {}", colors.emphasis("Token expiry"), expires_at.to_rfc3339());
  }
  println!(
    "  {}: {} (short TTL {}s), {} (long TTL {}s)",
    colors.emphasis("Freshness"),
    freshness(config.short_ttl),
    colors.number(config.short_ttl.as_secs()),
    freshness(config.long_ttl),
    colors.number(config.long_ttl.as_secs())
  );

  println!("  {} ({}):", colors.emphasis("Headers"), colors.number(bundle.headers().len()));
  for name in bundle.headers().keys() {
    println!("    {}", colors.dimmed(name));
  }
}
