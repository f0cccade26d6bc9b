//! Network side of stowaway.
//!
//! This crate provides the [`Network`] seam the agent fetches through and
//! its reqwest-backed implementation, plus URL resolution shared by the
//! agent and the CLI.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network};
pub use fetch::url::{UrlError, is_fetchable_scheme, resolve};
