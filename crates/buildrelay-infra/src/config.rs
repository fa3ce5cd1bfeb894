//! Relay configuration loader.
//!
//! Reads `buildrelay.toml` and deserializes it into [`RelayConfig`], then
//! applies environment overrides. Falls back to defaults when the file is
//! missing or malformed, so a deployment configured purely through the
//! environment needs no file at all.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use buildrelay_types::config::{RegistryBackend, RelayConfig};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "buildrelay.toml";

/// Config file path: `BUILDRELAY_CONFIG` if set, else [`DEFAULT_CONFIG_FILE`].
pub fn default_config_path() -> PathBuf {
    std::env::var("BUILDRELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load configuration from `path`, then apply process environment overrides.
pub async fn load_relay_config(path: &Path) -> RelayConfig {
    let mut config = read_config_file(path).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Read and parse `path`.
///
/// - If the file does not exist, returns [`RelayConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
async fn read_config_file(path: &Path) -> RelayConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return RelayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return RelayConfig::default();
        }
    };

    match toml::from_str::<RelayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            RelayConfig::default()
        }
    }
}

/// Apply environment overrides on top of file values.
///
/// `lookup` abstracts the environment so tests need not mutate process state.
/// Blank values are ignored.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(owner) = get("REPO_OWNER") {
        config.ci.owner = owner;
    }
    if let Some(repo) = get("REPO_NAME") {
        config.ci.repo = repo;
    }
    if let Some(port) = get("PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORT value '{port}'"),
        }
    }
    if let Some(url) = get("BUILDRELAY_UPLOAD_URL") {
        config.storage.upload_url = url;
    }
    if let Some(url) = get("BUILDRELAY_PUBLIC_URL") {
        config.storage.public_url = Some(url);
    }
    if let Some(url) = get("BUILDRELAY_DATABASE_URL") {
        config.registry.database_url = url;
        config.registry.backend = RegistryBackend::Sqlite;
    }
}

/// Credentials that never live in the config file.
pub struct RelaySecrets {
    /// `GITHUB_TOKEN`: token for the dispatch and Actions APIs.
    pub github_token: Option<SecretString>,
    /// `BUILDRELAY_UPLOAD_TOKEN`: bearer token for the object store, if it needs one.
    pub upload_token: Option<SecretString>,
}

impl RelaySecrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::from(v.trim().to_string()))
        };
        Self {
            github_token: secret("GITHUB_TOKEN"),
            upload_token: secret("BUILDRELAY_UPLOAD_TOKEN"),
        }
    }
}
