//! GitHub Actions CI provider.
//!
//! [`GitHubActionsClient`] implements both CI ports from buildrelay-core:
//! `repository_dispatch` for triggering and the Actions REST API for reading
//! runs, jobs and release assets back.

pub mod client;
pub mod types;

pub use client::GitHubActionsClient;
