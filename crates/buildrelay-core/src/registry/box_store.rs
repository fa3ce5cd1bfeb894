//! BoxRegistryStore -- object-safe dynamic dispatch wrapper for RegistryStore.
//!
//! Same blanket-impl pattern as the other boxed ports:
//! 1. Define an object-safe `RegistryStoreDyn` trait with boxed futures
//! 2. Blanket-impl `RegistryStoreDyn` for all `T: RegistryStore`
//! 3. `BoxRegistryStore` wraps `Box<dyn RegistryStoreDyn>` and itself
//!    implements `RegistryStore`, so services stay generic.

use std::future::Future;
use std::pin::Pin;

use buildrelay_types::error::RepositoryError;
use buildrelay_types::status::RegistryEntry;
use buildrelay_types::token::CorrelationToken;

use super::store::RegistryStore;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`RegistryStore`] with boxed futures.
pub trait RegistryStoreDyn: Send + Sync {
    fn get_boxed<'a>(
        &'a self,
        token: &'a CorrelationToken,
    ) -> BoxFuture<'a, Result<Option<RegistryEntry>, RepositoryError>>;

    fn set_boxed<'a>(&'a self, entry: &'a RegistryEntry) -> BoxFuture<'a, Result<(), RepositoryError>>;

    fn compare_and_swap_boxed<'a>(
        &'a self,
        expected_revision: Option<u64>,
        entry: &'a RegistryEntry,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>>;
}

impl<T: RegistryStore> RegistryStoreDyn for T {
    fn get_boxed<'a>(
        &'a self,
        token: &'a CorrelationToken,
    ) -> BoxFuture<'a, Result<Option<RegistryEntry>, RepositoryError>> {
        Box::pin(self.get(token))
    }

    fn set_boxed<'a>(&'a self, entry: &'a RegistryEntry) -> BoxFuture<'a, Result<(), RepositoryError>> {
        Box::pin(self.set(entry))
    }

    fn compare_and_swap_boxed<'a>(
        &'a self,
        expected_revision: Option<u64>,
        entry: &'a RegistryEntry,
    ) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(self.compare_and_swap(expected_revision, entry))
    }
}

/// Type-erased registry store for runtime backend selection.
///
/// Since `RegistryStore` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxRegistryStore` restores that while still implementing
/// `RegistryStore` itself.
pub struct BoxRegistryStore {
    inner: Box<dyn RegistryStoreDyn + Send + Sync>,
}

impl BoxRegistryStore {
    /// Wrap a concrete `RegistryStore` implementation.
    pub fn new<T: RegistryStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }
}

impl RegistryStore for BoxRegistryStore {
    async fn get(&self, token: &CorrelationToken) -> Result<Option<RegistryEntry>, RepositoryError> {
        self.inner.get_boxed(token).await
    }

    async fn set(&self, entry: &RegistryEntry) -> Result<(), RepositoryError> {
        self.inner.set_boxed(entry).await
    }

    async fn compare_and_swap(
        &self,
        expected_revision: Option<u64>,
        entry: &RegistryEntry,
    ) -> Result<bool, RepositoryError> {
        self.inner.compare_and_swap_boxed(expected_revision, entry).await
    }
}
