//! BoxAssetStore -- object-safe dynamic dispatch wrapper for AssetStore.

use std::future::Future;
use std::pin::Pin;

use buildrelay_types::error::StorageError;

use super::asset_store::AssetStore;

/// Object-safe version of [`AssetStore`] with boxed futures.
pub trait AssetStoreDyn: Send + Sync {
    fn upload_boxed<'a>(
        &'a self,
        key: &'a str,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, StorageError>> + Send + 'a>>;
}

impl<T: AssetStore> AssetStoreDyn for T {
    fn upload_boxed<'a>(
        &'a self,
        key: &'a str,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, StorageError>> + Send + 'a>> {
        Box::pin(self.upload(key, bytes, content_type))
    }
}

/// Type-erased asset store for runtime backend selection.
pub struct BoxAssetStore {
    inner: Box<dyn AssetStoreDyn + Send + Sync>,
}

impl BoxAssetStore {
    pub fn new<T: AssetStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }
}

impl AssetStore for BoxAssetStore {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        self.inner.upload_boxed(key, bytes, content_type).await
    }
}
