//! In-process registry store.
//!
//! DashMap-backed; entries live as long as the process. Suitable for a
//! single long-running instance. Anything lost on restart is re-derived from
//! CI on the next status query.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use buildrelay_types::error::RepositoryError;
use buildrelay_types::status::RegistryEntry;
use buildrelay_types::token::CorrelationToken;

use super::store::RegistryStore;

/// Thread-safe in-memory registry store.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemoryRegistryStore {
    entries: Arc<DashMap<CorrelationToken, RegistryEntry>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RegistryStore for MemoryRegistryStore {
    async fn get(&self, token: &CorrelationToken) -> Result<Option<RegistryEntry>, RepositoryError> {
        Ok(self.entries.get(token).map(|r| r.value().clone()))
    }

    async fn set(&self, entry: &RegistryEntry) -> Result<(), RepositoryError> {
        self.entries.insert(entry.token.clone(), entry.clone());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        expected_revision: Option<u64>,
        entry: &RegistryEntry,
    ) -> Result<bool, RepositoryError> {
        // The shard lock is held for the whole entry() scope.
        match self.entries.entry(entry.token.clone()) {
            Entry::Occupied(mut occupied) => {
                if expected_revision == Some(occupied.get().revision) {
                    occupied.insert(entry.clone());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                if expected_revision.is_none() {
                    vacant.insert(entry.clone());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildrelay_types::status::StatusView;

    fn token(s: &str) -> CorrelationToken {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryRegistryStore::new();
        assert!(store.get(&token("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cas_insert_only_if_absent() {
        let store = MemoryRegistryStore::new();
        let entry = RegistryEntry::dispatched(token("a"));

        assert!(store.compare_and_swap(None, &entry).await.unwrap());
        assert!(!store.compare_and_swap(None, &entry).await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_cas_requires_matching_revision() {
        let store = MemoryRegistryStore::new();
        let first = RegistryEntry::dispatched(token("a"));
        store.set(&first).await.unwrap();

        let second = first.advance(Some(11), StatusView::in_progress());
        assert!(!store.compare_and_swap(Some(5), &second).await.unwrap());
        assert!(store.compare_and_swap(Some(0), &second).await.unwrap());

        let stored = store.get(&token("a")).await.unwrap().unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.run_id, Some(11));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryRegistryStore::new();
        let other = store.clone();
        store.set(&RegistryEntry::dispatched(token("a"))).await.unwrap();
        assert!(other.get(&token("a")).await.unwrap().is_some());
    }
}
