//! Command-line interface definitions for fotmob-token.
//!
//! Options map one-to-one onto [`CredentialConfig`]; most can also be set
//! through environment variables so the same settings work for services that
//! embed the provider.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

use crate::color::ColorScheme;
use crate::commands::completions::handle_completions_command;
use crate::commands::show::handle_show_command;
use crate::commands::token::{handle_get_command, handle_refresh_command};
use crate::commands::version::handle_version_command;
use crate::config::{BrowserConfig, CredentialConfig, DEFAULT_SITE_URL, DEFAULT_TOKEN_HEADER, PLACEHOLDER_TOKEN};

/// fotmob-token - Acquire and cache the FotMob API token
#[derive(Debug, Parser)]
#[command(
  name = "fotmob-token",
  version,
  about = "Acquire and cache the FotMob API token",
  long_about = "Obtains the short-lived x-mas token the FotMob API requires, trying a headless browser,\n\
                a landing page scrape, the persisted bundle and a built-in default in that order.",
  styles = get_clap_styles()
)]
pub struct Cli {
  /// Subcommand to execute
  #[command(subcommand)]
  pub command: Command,

  /// Where and how to acquire the token
  #[command(flatten)]
  pub source: SourceOptions,

  /// Persistence and freshness options
  #[command(flatten)]
  pub storage: StorageOptions,

  /// Behavior options
  #[command(flatten)]
  pub behavior: BehaviorOptions,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Print a usable token, refreshing it when stale
  Get {
    /// Output the full bundle as JSON
    #[arg(long)]
    json: bool,
  },

  /// Run every acquisition strategy now, ignoring the cached bundle
  Refresh {
    /// Output the outcome as JSON
    #[arg(long)]
    json: bool,
  },

  /// Inspect the persisted bundle without touching the network
  Show,

  /// Display version and build information
  Version {
    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Show only version number
    #[arg(long)]
    short: bool,
  },

  /// Generate shell completion scripts
  Completions {
    /// Target shell for completions
    #[arg(value_enum)]
    shell: Shell,
  },
}

/// Shells supported by `completions`
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
  Bash,
  Zsh,
  Fish,
  Powershell,
  Elvish,
}

/// Normalize a URL by adding https:// if no scheme is present
fn normalize_url(url: &str) -> Result<String, String> {
  let trimmed = url.trim();

  let parsed = match Url::parse(trimmed) {
    Ok(parsed) => parsed,
    Err(_) => Url::parse(&format!("https://{trimmed}")).map_err(|e| format!("Invalid URL: {e}"))?,
  };

  let mut url_str = parsed.to_string();
  if url_str.ends_with('/') && url_str.len() > 1 {
    url_str.pop();
  }

  Ok(url_str)
}

/// Acquisition options
#[derive(Debug, Parser)]
pub struct SourceOptions {
  /// Landing page that embeds the token
  #[arg(long, env = "FOTMOB_SITE_URL", default_value = DEFAULT_SITE_URL, value_name = "URL", value_parser = normalize_url)]
  pub site_url: String,

  /// Header name the API expects the token in
  #[arg(long, default_value = DEFAULT_TOKEN_HEADER, value_name = "NAME")]
  pub token_header: String,

  /// Chromium-based browser binary (searched on PATH when unset)
  #[arg(long, env = "FOTMOB_BROWSER", value_name = "PATH")]
  pub browser: Option<PathBuf>,

  /// Skip the headless browser strategy
  #[arg(long)]
  pub no_browser: bool,

  /// Timeout for the landing page request
  #[arg(long, default_value = "15", value_name = "SECONDS")]
  pub scrape_timeout: u64,

  /// Save the landing page here when no extraction rule matches
  #[arg(long, value_name = "DIR")]
  pub dump_html: Option<PathBuf>,

  /// Token served when every other strategy fails
  #[arg(long, env = "FOTMOB_DEFAULT_TOKEN", hide_env_values = true, value_name = "TOKEN")]
  pub default_token: Option<String>,
}

/// Persistence and freshness options
#[derive(Debug, Parser)]
pub struct StorageOptions {
  /// Directory holding the persisted bundle
  #[arg(long, env = "FOTMOB_TOKEN_DIR", default_value = "responses", value_name = "DIR")]
  pub storage_dir: PathBuf,

  /// Age after which a persisted bundle is no longer used at all
  #[arg(long, default_value = "86400", value_name = "SECONDS")]
  pub long_ttl: u64,

  /// Age after which a bundle is refreshed before being served
  #[arg(long, default_value = "120", value_name = "SECONDS")]
  pub short_ttl: u64,
}

/// Behavior options
#[derive(Debug, Parser)]
pub struct BehaviorOptions {
  /// Increase verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  pub verbose: u8,

  /// Suppress all output except errors
  #[arg(short, long, conflicts_with = "verbose", global = true)]
  pub quiet: bool,

  /// Colorize output
  #[arg(long, value_enum, default_value = "auto", value_name = "WHEN", global = true)]
  pub color: ColorOption,
}

/// Color output options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
  Auto,
  Always,
  Never,
}

impl Cli {
  /// Parse CLI arguments from the environment
  pub fn parse_args() -> Self {
    Self::parse()
  }

  /// Build the provider configuration from the parsed options.
  pub fn credential_config(&self) -> CredentialConfig {
    CredentialConfig {
      site_url: self.source.site_url.clone(),
      token_header: self.source.token_header.trim().to_string(),
      storage_dir: self.storage.storage_dir.clone(),
      long_ttl: Duration::from_secs(self.storage.long_ttl),
      short_ttl: Duration::from_secs(self.storage.short_ttl),
      scrape_timeout: Duration::from_secs(self.source.scrape_timeout),
      default_token: self
        .source
        .default_token
        .clone()
        .unwrap_or_else(|| PLACEHOLDER_TOKEN.to_string()),
      debug_html_dir: self.source.dump_html.clone(),
      browser: BrowserConfig {
        enabled: !self.source.no_browser,
        executable: self.source.browser.clone(),
        ..BrowserConfig::default()
      },
      ..CredentialConfig::default()
    }
  }

  /// Validate CLI arguments
  ///
  /// Returns an error if the resulting configuration cannot work.
  pub fn validate(&self) -> Result<(), String> {
    self.credential_config().validate().map_err(|e| e.to_string())
  }
}

/// Parse CLI arguments, initialize logging, and dispatch to the chosen
/// command.
pub async fn run() {
  let cli = Cli::parse_args();

  init_tracing(&cli.behavior);

  let colors = ColorScheme::new(cli.behavior.color);

  if let Err(e) = cli.validate() {
    eprintln!("{} {}", colors.error("Error:"), e);
    process::exit(4); // Invalid arguments exit code
  }

  match &cli.command {
    Command::Get { json } => handle_get_command(*json, &cli, &colors).await,
    Command::Refresh { json } => handle_refresh_command(*json, &cli, &colors).await,
    Command::Show => handle_show_command(&cli, &colors).await,
    Command::Version { json, short } => handle_version_command(*json, *short, &colors),
    Command::Completions { shell } => handle_completions_command(*shell),
  }
}

fn init_tracing(behavior: &BehaviorOptions) {
  let level = if behavior.quiet {
    LevelFilter::ERROR
  } else {
    match behavior.verbose {
      0 => LevelFilter::WARN,
      1 => LevelFilter::INFO,
      2 => LevelFilter::DEBUG,
      _ => LevelFilter::TRACE,
    }
  };

  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  let _ = tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .try_init();
}

/// Get custom styles for clap help output
fn get_clap_styles() -> clap::builder::Styles {
  use clap::builder::styling::{AnsiColor, Effects};

  clap::builder::Styles::styled()
    .header(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
    .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
    .literal(AnsiColor::BrightGreen.on_default())
    .placeholder(AnsiColor::BrightCyan.on_default())
    .error(AnsiColor::BrightRed.on_default() | Effects::BOLD)
    .valid(AnsiColor::BrightGreen.on_default())
    .invalid(AnsiColor::BrightRed.on_default())
}
