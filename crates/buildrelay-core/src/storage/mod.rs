//! Storage abstractions for the relay.
//!
//! Defines the asset store trait used by the stager, plus its boxed form.
//! Implementations live in buildrelay-infra.

pub mod asset_store;
pub mod box_store;
