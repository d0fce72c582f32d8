//! FotMob API token acquisition library
//!
//! Obtains, validates, persists and refreshes the short-lived token the
//! FotMob API expects in its `x-mas` header, along with the headers it has to
//! be replayed with. Callers use [`credentials::CredentialProvider`]; the rest
//! of the crate is the machinery behind it.

pub mod cli;
pub mod color;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod pipeline;
pub mod strategies;
