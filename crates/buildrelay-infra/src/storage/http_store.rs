//! HTTP object store -- `PUT {upload_url}/{key}`.
//!
//! Objects are served from `{public_url}/{key}` when a public URL is
//! configured, otherwise from the upload URL itself.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use buildrelay_core::storage::asset_store::AssetStore;
use buildrelay_types::config::StorageConfig;
use buildrelay_types::error::StorageError;

/// Object store reached over plain HTTP.
#[derive(Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    upload_url: String,
    public_url: String,
    token: Option<Arc<SecretString>>,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig, token: Option<SecretString>) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.saturating_mul(2).max(1)))
            .build()
            .map_err(|e| StorageError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        let upload_url = config.upload_url.trim_end_matches('/').to_string();
        let public_url = config
            .public_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| upload_url.clone());

        Ok(Self {
            client,
            upload_url,
            public_url,
            token: token.map(Arc::new),
        })
    }

    fn upload_target(&self, key: &str) -> String {
        format!("{}/{}", self.upload_url, key.trim_start_matches('/'))
    }

    /// URL the object is served from once uploaded.
    pub fn public_location(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key.trim_start_matches('/'))
    }
}

impl AssetStore for HttpObjectStore {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        let mut request = self
            .client
            .put(self.upload_target(key))
            .header("Content-Type", content_type)
            .body(bytes.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StorageError::Timeout
            } else {
                StorageError::Unavailable(format!("HTTP request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        let url = self.public_location(key);
        tracing::debug!(key, size = bytes.len(), url = %url, "object uploaded");
        Ok(url)
    }
}
