//! BoxCiTrigger / BoxCiQuery -- object-safe wrappers for the CI ports.
//!
//! Same blanket-impl pattern as `BoxRegistryStore`:
//! 1. Define object-safe `*Dyn` traits with boxed futures
//! 2. Blanket-impl them for every implementation of the port
//! 3. The `Box*` wrappers hold `Box<dyn *Dyn>` and implement the port again,
//!    so the relay stays generic while the binary picks providers at runtime.

use std::future::Future;
use std::pin::Pin;

use buildrelay_types::error::CiError;
use buildrelay_types::run::{ExternalRun, ReleaseAsset, RunDetail};

use super::{CiQuery, CiTrigger, DispatchPayload};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`CiTrigger`].
pub trait CiTriggerDyn: Send + Sync {
    fn dispatch_boxed<'a>(&'a self, payload: &'a DispatchPayload) -> BoxFuture<'a, Result<(), CiError>>;
}

impl<T: CiTrigger> CiTriggerDyn for T {
    fn dispatch_boxed<'a>(&'a self, payload: &'a DispatchPayload) -> BoxFuture<'a, Result<(), CiError>> {
        Box::pin(self.dispatch(payload))
    }
}

/// Object-safe version of [`CiQuery`].
pub trait CiQueryDyn: Send + Sync {
    fn list_recent_runs_boxed(&self, window: usize) -> BoxFuture<'_, Result<Vec<ExternalRun>, CiError>>;

    fn get_run_boxed(&self, run_id: u64) -> BoxFuture<'_, Result<Option<ExternalRun>, CiError>>;

    fn get_run_detail_boxed(&self, run_id: u64) -> BoxFuture<'_, Result<RunDetail, CiError>>;

    fn list_release_assets_boxed<'a>(&'a self, tag: &'a str) -> BoxFuture<'a, Result<Vec<ReleaseAsset>, CiError>>;
}

impl<T: CiQuery> CiQueryDyn for T {
    fn list_recent_runs_boxed(&self, window: usize) -> BoxFuture<'_, Result<Vec<ExternalRun>, CiError>> {
        Box::pin(self.list_recent_runs(window))
    }

    fn get_run_boxed(&self, run_id: u64) -> BoxFuture<'_, Result<Option<ExternalRun>, CiError>> {
        Box::pin(self.get_run(run_id))
    }

    fn get_run_detail_boxed(&self, run_id: u64) -> BoxFuture<'_, Result<RunDetail, CiError>> {
        Box::pin(self.get_run_detail(run_id))
    }

    fn list_release_assets_boxed<'a>(&'a self, tag: &'a str) -> BoxFuture<'a, Result<Vec<ReleaseAsset>, CiError>> {
        Box::pin(self.list_release_assets(tag))
    }
}

/// Type-erased CI trigger.
pub struct BoxCiTrigger {
    inner: Box<dyn CiTriggerDyn + Send + Sync>,
}

impl BoxCiTrigger {
    pub fn new<T: CiTrigger + 'static>(trigger: T) -> Self {
        Self {
            inner: Box::new(trigger),
        }
    }
}

impl CiTrigger for BoxCiTrigger {
    async fn dispatch(&self, payload: &DispatchPayload) -> Result<(), CiError> {
        self.inner.dispatch_boxed(payload).await
    }
}

/// Type-erased CI query client.
pub struct BoxCiQuery {
    inner: Box<dyn CiQueryDyn + Send + Sync>,
}

impl BoxCiQuery {
    pub fn new<T: CiQuery + 'static>(query: T) -> Self {
        Self {
            inner: Box::new(query),
        }
    }
}

impl CiQuery for BoxCiQuery {
    async fn list_recent_runs(&self, window: usize) -> Result<Vec<ExternalRun>, CiError> {
        self.inner.list_recent_runs_boxed(window).await
    }

    async fn get_run(&self, run_id: u64) -> Result<Option<ExternalRun>, CiError> {
        self.inner.get_run_boxed(run_id).await
    }

    async fn get_run_detail(&self, run_id: u64) -> Result<RunDetail, CiError> {
        self.inner.get_run_detail_boxed(run_id).await
    }

    async fn list_release_assets(&self, tag: &str) -> Result<Vec<ReleaseAsset>, CiError> {
        self.inner.list_release_assets_boxed(tag).await
    }
}
