//! Request registry: token -> last known status.
//!
//! A performance cache over the CI system. Terminal entries short-circuit
//! re-correlation; everything else is re-derived on each query. Writes go
//! through compare-and-swap so a terminal view is never replaced, and a lost
//! race simply defers to whatever is stored (last writer wins otherwise).

pub mod box_store;
pub mod memory;
pub mod store;

use buildrelay_types::error::RepositoryError;
use buildrelay_types::status::{RegistryEntry, StatusView};
use buildrelay_types::token::CorrelationToken;

use self::store::RegistryStore;

/// CAS attempts before giving up on caching a view.
const MAX_CAS_ATTEMPTS: usize = 3;

/// Outcome of a registry write.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    /// The view callers should see: ours, or a terminal one that won.
    pub view: StatusView,
    /// Whether our view was stored.
    pub applied: bool,
}

/// Cache of status views keyed by correlation token.
pub struct RequestRegistry<S: RegistryStore> {
    store: S,
}

impl<S: RegistryStore> RequestRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get(&self, token: &CorrelationToken) -> Result<Option<RegistryEntry>, RepositoryError> {
        self.store.get(token).await
    }

    /// Record a freshly dispatched token (`DISPATCHED`, surfaced as queued).
    pub async fn record_dispatch(&self, token: &CorrelationToken) -> Result<(), RepositoryError> {
        let entry = RegistryEntry::dispatched(token.clone());
        if !self.store.compare_and_swap(None, &entry).await? {
            // A token is minted once; an existing entry means a callback beat us.
            tracing::debug!(token = %token, "registry entry already present at dispatch");
        }
        Ok(())
    }

    /// Store `view` for `token`, binding `run_id` if the entry has no run yet.
    ///
    /// `previous` is the entry the caller derived from. If another writer got
    /// there first, the stored entry is re-read: a terminal entry wins,
    /// anything else is overwritten.
    pub async fn record(
        &self,
        token: &CorrelationToken,
        previous: Option<RegistryEntry>,
        run_id: Option<u64>,
        view: StatusView,
    ) -> Result<Recorded, RepositoryError> {
        self.write(token, previous, Binding::KeepExisting(run_id), view).await
    }

    /// Store a view projected from run `run_id`, replacing any other binding.
    ///
    /// Used by the polling path, where correlation decides which run the
    /// token belongs to. Same race rules as [`RequestRegistry::record`].
    pub async fn record_run(
        &self,
        token: &CorrelationToken,
        previous: Option<RegistryEntry>,
        run_id: u64,
        view: StatusView,
    ) -> Result<Recorded, RepositoryError> {
        self.write(token, previous, Binding::Replace(run_id), view).await
    }

    async fn write(
        &self,
        token: &CorrelationToken,
        previous: Option<RegistryEntry>,
        binding: Binding,
        view: StatusView,
    ) -> Result<Recorded, RepositoryError> {
        let mut current = previous;

        for _ in 0..MAX_CAS_ATTEMPTS {
            if let Some(existing) = &current {
                if existing.view.is_terminal() {
                    return Ok(Recorded {
                        view: existing.view.clone(),
                        applied: false,
                    });
                }
            }

            let base = current
                .clone()
                .unwrap_or_else(|| RegistryEntry::dispatched(token.clone()));
            let next = match binding {
                Binding::KeepExisting(run_id) => base.advance(run_id, view.clone()),
                Binding::Replace(run_id) => {
                    if base.run_id.is_some_and(|bound| bound != run_id) {
                        tracing::info!(token = %token, from = ?base.run_id, to = run_id, "rebinding token to run");
                    }
                    base.rebind(run_id, view.clone())
                }
            };
            let expected = current.as_ref().map(|e| e.revision);

            if self.store.compare_and_swap(expected, &next).await? {
                return Ok(Recorded {
                    view: next.view,
                    applied: true,
                });
            }

            tracing::debug!(token = %token, "registry write lost a race, re-reading");
            current = self.store.get(token).await?;
        }

        tracing::warn!(token = %token, "registry write contended, returning uncached view");
        Ok(Recorded {
            view,
            applied: false,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Binding {
    /// Bind the run only if the entry has none.
    KeepExisting(Option<u64>),
    Replace(u64),
}
