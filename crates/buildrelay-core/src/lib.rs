//! Relay logic and port trait definitions for the build relay.
//!
//! This crate defines the "ports" (CI, asset store, registry store) that the
//! infrastructure layer implements, and the pipeline that drives them. It
//! depends only on `buildrelay-types` -- never on `buildrelay-infra` or any
//! network or database crate.

pub mod ci;
pub mod registry;
pub mod relay;
pub mod retry;
pub mod storage;

#[cfg(any(test, feature = "fakes"))]
pub mod fakes;
