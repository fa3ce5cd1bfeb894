//! SQLite storage layer.
//!
//! The durable request-registry backend, using WAL mode and split
//! read/write connection pools.

pub mod pool;
pub mod registry;
