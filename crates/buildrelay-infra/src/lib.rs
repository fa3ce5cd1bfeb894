//! Infrastructure layer for the build relay.
//!
//! Contains implementations of the port traits defined in `buildrelay-core`:
//! the GitHub Actions CI client, the HTTP object store, and the SQLite
//! request-registry store, plus the configuration loader.

pub mod config;
pub mod github;
pub mod sqlite;
pub mod storage;
