//! Registry store trait.
//!
//! The request registry is a cache, not the source of truth. This trait lets
//! the same registry logic run against process memory, a durable table, or an
//! external cache. Implementations: [`super::memory::MemoryRegistryStore`]
//! here, `SqliteRegistryStore` in buildrelay-infra.

use std::future::Future;

use buildrelay_types::error::RepositoryError;
use buildrelay_types::status::RegistryEntry;
use buildrelay_types::token::CorrelationToken;

/// Keyed storage for registry entries with compare-and-swap.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait RegistryStore: Send + Sync {
    /// Get the entry for a token. Returns None if the token is not cached.
    fn get(
        &self,
        token: &CorrelationToken,
    ) -> impl Future<Output = Result<Option<RegistryEntry>, RepositoryError>> + Send;

    /// Unconditionally write an entry (upsert).
    fn set(
        &self,
        entry: &RegistryEntry,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Write `entry` only if the stored revision equals `expected_revision`.
    ///
    /// `None` means "only if absent". Returns whether the write happened.
    fn compare_and_swap(
        &self,
        expected_revision: Option<u64>,
        entry: &RegistryEntry,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}
