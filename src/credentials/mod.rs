//! Credential bundles, their persistence, and the provider façade.
//!
//! The upstream API rejects requests that lack a short-lived token taken from
//! the site's own page traffic. Everything needed to hold on to that token
//! lives here:
//!
//! - [`CredentialBundle`]: the token plus the headers it must be replayed with.
//! - [`CredentialStore`]: atomic persistence of the bundle between runs.
//! - [`CredentialProvider`]: the single entry point for callers, refreshing
//!   through the [`AcquisitionPipeline`](crate::pipeline::AcquisitionPipeline)
//!   when the bundle is stale.
//!
//! The persisted file stays compatible with earlier tooling:
//! ```text
//! {
//!   "x-mas": "eyJib2R5Ijp7...",
//!   "User-Agent": "Mozilla/5.0 ...",
//!   "Accept": "application/json, text/plain, */*",
//!   "_timestamp": "2025-04-05T12:00:00.000Z",
//!   "_scrapedAt": 1743854400
//! }
//! ```

mod provider;
mod store;
mod types;

pub use provider::{CredentialProvider, RefreshOutcome};
pub use store::{BundleFileError, CredentialStore};
pub use types::{
  ACCEPT, API_ACCEPT, CredentialBundle, CredentialError, DEFAULT_USER_AGENT, MIN_TOKEN_LEN, Source, USER_AGENT,
  is_replayable_header, token_preview, validate_token,
};
