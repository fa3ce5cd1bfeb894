//! Shared domain types for the build relay.
//!
//! Build requests, CI runs, caller-facing status views, configuration and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod request;
pub mod run;
pub mod status;
pub mod token;
