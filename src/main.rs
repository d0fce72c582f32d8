//! fotmob-token - Acquire and cache the FotMob API token
//!
//! This is the main entry point for the CLI application.

#[tokio::main]
async fn main() {
  fotmob_token::cli::run().await;
}
