//! Asset store trait.
//!
//! Defines the single upload call the relay needs from object storage.
//! Implementations live in buildrelay-infra.

use buildrelay_types::error::StorageError;

/// Trait for the external object store that hosts staged icons.
///
/// Each call may create a new object; only the most recent successful upload
/// for a key matters, so implementations need not be idempotent.
pub trait AssetStore: Send + Sync {
    /// Upload `bytes` under `key` and return a durable HTTPS URL for it.
    fn upload(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<String, StorageError>> + Send;
}
