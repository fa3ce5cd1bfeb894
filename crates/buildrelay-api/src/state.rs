//! Application state wiring the relay together.
//!
//! `BuildRelay` is generic over its four ports; AppState pins it to the boxed
//! forms so the registry backend can be picked from config at runtime and
//! tests can substitute in-memory fakes.

use std::sync::Arc;

use anyhow::Context;

use buildrelay_core::ci::box_ci::{BoxCiQuery, BoxCiTrigger};
use buildrelay_core::registry::box_store::BoxRegistryStore;
use buildrelay_core::registry::memory::MemoryRegistryStore;
use buildrelay_core::relay::service::BuildRelay;
use buildrelay_core::storage::box_store::BoxAssetStore;
use buildrelay_infra::config::RelaySecrets;
use buildrelay_infra::github::GitHubActionsClient;
use buildrelay_infra::sqlite::pool::RegistryDb;
use buildrelay_infra::sqlite::registry::SqliteRegistryStore;
use buildrelay_infra::storage::HttpObjectStore;
use buildrelay_types::config::{RegistryBackend, RegistryConfig, RelayConfig};

/// The relay with every port type-erased.
pub type ConcreteRelay = BuildRelay<BoxAssetStore, BoxCiTrigger, BoxCiQuery, BoxRegistryStore>;

/// Shared application state, used by both CLI commands and REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ConcreteRelay>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(relay: ConcreteRelay, config: RelayConfig) -> Self {
        Self {
            relay: Arc::new(relay),
            config: Arc::new(config),
        }
    }

    /// Validate config, open the registry and connect the CI and storage clients.
    pub async fn init(config: RelayConfig) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid configuration")?;

        let registry = open_registry(&config.registry).await?;
        let relay = build_relay(&config, registry)?;

        tracing::info!(
            repository = %format!("{}/{}", config.ci.owner, config.ci.repo),
            backend = ?config.registry.backend,
            "relay initialised"
        );
        Ok(Self::new(relay, config))
    }
}

/// Connect the GitHub and object-store clients and assemble the relay.
///
/// Fails when `GITHUB_TOKEN` is missing.
pub fn build_relay(config: &RelayConfig, registry: BoxRegistryStore) -> anyhow::Result<ConcreteRelay> {
    let secrets = RelaySecrets::from_env();
    let github_token = secrets.github_token.context("GITHUB_TOKEN is not set")?;

    let github = GitHubActionsClient::new(&config.ci, github_token)?;
    let store = HttpObjectStore::new(&config.storage, secrets.upload_token)?;

    Ok(BuildRelay::from_config(
        config,
        BoxAssetStore::new(store),
        BoxCiTrigger::new(github.clone()),
        BoxCiQuery::new(github),
        registry,
    ))
}

/// Open the configured registry backend.
pub async fn open_registry(config: &RegistryConfig) -> anyhow::Result<BoxRegistryStore> {
    match config.backend {
        RegistryBackend::Memory => Ok(BoxRegistryStore::new(MemoryRegistryStore::new())),
        RegistryBackend::Sqlite => {
            let pool = RegistryDb::open(&config.database_url)
                .await
                .with_context(|| format!("failed to open registry database {}", config.database_url))?;
            Ok(BoxRegistryStore::new(SqliteRegistryStore::new(pool)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildrelay_core::registry::store::RegistryStore;
    use buildrelay_types::status::RegistryEntry;
    use buildrelay_types::token::CorrelationToken;

    #[tokio::test]
    async fn test_open_memory_registry() {
        let store = open_registry(&RegistryConfig::default()).await.unwrap();
        let token = CorrelationToken::new();
        assert!(store.get(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_sqlite_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegistryConfig {
            backend: RegistryBackend::Sqlite,
            database_url: format!("sqlite://{}?mode=rwc", dir.path().join("relay.db").display()),
            ..RegistryConfig::default()
        };

        let store = open_registry(&config).await.unwrap();
        let entry = RegistryEntry::dispatched(CorrelationToken::new());
        assert!(store.compare_and_swap(None, &entry).await.unwrap());
        assert!(dir.path().join("relay.db").exists());
    }

    #[tokio::test]
    async fn test_init_rejects_incomplete_config() {
        let err = AppState::init(RelayConfig::default()).await.err().unwrap();
        assert!(format!("{err:#}").contains("REPO_OWNER"));
    }
}
