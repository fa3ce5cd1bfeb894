//! Relay configuration types.
//!
//! `RelayConfig` represents `buildrelay.toml`. Every field has a default so a
//! partial (or empty) file is valid; required deployment values such as the
//! repository owner are checked by [`RelayConfig::validate`].

use serde::{Deserialize, Serialize};

use std::fmt;

/// Top-level configuration for the relay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ci: CiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl RelayConfig {
    /// Check values that have no usable default.
    pub fn validate(&self) -> Result<(), String> {
        if self.ci.owner.trim().is_empty() {
            return Err("ci.owner (REPO_OWNER) is not set".to_string());
        }
        if self.ci.repo.trim().is_empty() {
            return Err("ci.repo (REPO_NAME) is not set".to_string());
        }
        if self.ci.run_window == 0 {
            return Err("ci.run_window must be at least 1".to_string());
        }
        if self.ci.strategies.is_empty() {
            return Err("ci.strategies must list at least one matcher".to_string());
        }
        if self.storage.upload_url.trim().is_empty() {
            return Err("storage.upload_url (BUILDRELAY_UPLOAD_URL) is not set".to_string());
        }
        Ok(())
    }
}

/// `[server]`: HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request body limit; inline icons arrive base64-encoded in the body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Static web client served as a fallback when the directory exists.
    #[serde(default = "default_web_dir")]
    pub web_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    200 * 1024 * 1024
}

fn default_web_dir() -> String {
    "public".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            web_dir: default_web_dir(),
        }
    }
}

/// One method for identifying which run corresponds to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherStrategy {
    /// Exact match on a structured correlation field in the listed run.
    PayloadField,
    /// Token appears in the run title.
    TitleSubstring,
    /// Fetch each run's detail and compare its payload.
    DetailFetch,
}

impl fmt::Display for MatcherStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherStrategy::PayloadField => write!(f, "payload_field"),
            MatcherStrategy::TitleSubstring => write!(f, "title_substring"),
            MatcherStrategy::DetailFetch => write!(f, "detail_fetch"),
        }
    }
}

/// `[ci]`: the CI provider (GitHub Actions) and correlation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    /// `repository_dispatch` event type the build workflow listens for.
    #[serde(default = "default_event_type")]
    pub event_type: String,
    /// How many recent dispatch-triggered runs the correlator inspects.
    #[serde(default = "default_run_window")]
    pub run_window: usize,
    /// Matcher strategies in priority order.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<MatcherStrategy>,
    /// Release tag holding a run's artifacts; `{run_id}` is substituted.
    #[serde(default = "default_release_tag")]
    pub release_tag: String,
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_event_type() -> String {
    "build-apk".to_string()
}

fn default_run_window() -> usize {
    20
}

fn default_strategies() -> Vec<MatcherStrategy> {
    vec![
        MatcherStrategy::PayloadField,
        MatcherStrategy::TitleSubstring,
        MatcherStrategy::DetailFetch,
    ]
}

fn default_release_tag() -> String {
    "build-{run_id}".to_string()
}

fn default_artifact_name() -> String {
    "app-release.apk".to_string()
}

fn default_artifact_extension() -> String {
    ".apk".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            owner: String::new(),
            repo: String::new(),
            event_type: default_event_type(),
            run_window: default_run_window(),
            strategies: default_strategies(),
            release_tag: default_release_tag(),
            artifact_name: default_artifact_name(),
            artifact_extension: default_artifact_extension(),
            request_timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl CiConfig {
    /// Release tag for a run, with `{run_id}` substituted.
    pub fn release_tag_for(&self, run_id: u64) -> String {
        self.release_tag.replace("{run_id}", &run_id.to_string())
    }
}

/// `[storage]`: object store that hosts staged icons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL objects are PUT to (`{upload_url}/{key}`).
    #[serde(default)]
    pub upload_url: String,
    /// Base URL objects are served from; defaults to `upload_url`.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_max_icon_bytes")]
    pub max_icon_bytes: usize,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_icon_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_url: String::new(),
            public_url: None,
            max_icon_bytes: default_max_icon_bytes(),
            request_timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Where the request registry keeps its cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    #[default]
    Memory,
    Sqlite,
}

/// `[registry]`: status cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub backend: RegistryBackend,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Unknown tokens minted less than this long ago still report `queued`.
    #[serde(default = "default_fresh_token_secs")]
    pub fresh_token_secs: u64,
}

fn default_database_url() -> String {
    "sqlite://buildrelay.db?mode=rwc".to_string()
}

fn default_fresh_token_secs() -> u64 {
    3600
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::default(),
            database_url: default_database_url(),
            fresh_token_secs: default_fresh_token_secs(),
        }
    }
}
