//! Asset stager: turns a submitted icon into a durable URL.
//!
//! Inline images are decoded, size-checked and uploaded; URLs pass through
//! untouched. Oversize payloads are rejected here, before the provider sees
//! them, and provider failures come back as dependency errors.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use buildrelay_types::error::RelayError;
use buildrelay_types::request::IconAsset;
use buildrelay_types::token::CorrelationToken;

use crate::retry::RetryPolicy;
use crate::storage::asset_store::AssetStore;

/// Content type assumed for bare base64 payloads.
const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Parse the submitted icon string.
///
/// - `http://` / `https://` -> [`IconAsset::Url`]
/// - `data:<mime>;base64,<payload>` -> inline with that mime type
/// - anything else is treated as bare base64 PNG data
pub fn parse_icon(raw: &str) -> Result<IconAsset, RelayError> {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(IconAsset::Url(raw.to_string()));
    }

    let (content_type, encoded) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or_else(|| invalid_icon("data URI has no payload"))?;
            let mut parts = header.split(';');
            let mime = parts.next().filter(|m| !m.is_empty()).unwrap_or(DEFAULT_CONTENT_TYPE);
            if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
                return Err(invalid_icon("only base64 data URIs are supported"));
            }
            (mime.to_string(), payload)
        }
        None => (DEFAULT_CONTENT_TYPE.to_string(), raw),
    };

    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| invalid_icon(&format!("not valid base64: {e}")))?;

    Ok(IconAsset::Inline { bytes, content_type })
}

fn invalid_icon(message: &str) -> RelayError {
    RelayError::InvalidField {
        field: "icon",
        message: message.to_string(),
    }
}

/// File extension for an image content type.
fn extension_for(content_type: &str) -> &'static str {
    match content_type.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        _ => "bin",
    }
}

/// Uploads inline icons through an [`AssetStore`].
pub struct AssetStager<A: AssetStore> {
    store: A,
    max_bytes: usize,
    retry: RetryPolicy,
}

impl<A: AssetStore> AssetStager<A> {
    pub fn new(store: A, max_bytes: usize, retry: RetryPolicy) -> Self {
        Self {
            store,
            max_bytes,
            retry,
        }
    }

    /// Object key for a token's icon: `icons/<token>.<ext>`.
    pub fn object_key(token: &CorrelationToken, content_type: &str) -> String {
        format!("icons/{}.{}", token, extension_for(content_type))
    }

    /// Stage `icon` and return the URL the CI run should fetch it from.
    pub async fn stage(&self, token: &CorrelationToken, icon: IconAsset) -> Result<String, RelayError> {
        let (bytes, content_type) = match icon {
            IconAsset::Url(url) => return Ok(url),
            IconAsset::Inline { bytes, content_type } => (bytes, content_type),
        };

        if bytes.is_empty() {
            return Err(invalid_icon("image data is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(RelayError::PayloadTooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let key = Self::object_key(token, &content_type);
        let url = self
            .retry
            .run("upload_icon", || self.store.upload(&key, &bytes, &content_type))
            .await
            .map_err(|e| {
                tracing::error!(token = %token, key = %key, error = %e, "icon upload failed");
                RelayError::Dependency {
                    service: "asset store",
                    message: e.to_string(),
                }
            })?;

        tracing::debug!(token = %token, url = %url, size = bytes.len(), "icon staged");
        Ok(url)
    }
}
