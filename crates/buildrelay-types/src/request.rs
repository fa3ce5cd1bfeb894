use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::token::CorrelationToken;

/// What to build: the wrapped site and the package it ships as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Display name of the generated app.
    pub name: String,
    /// Package identifier (e.g. `com.demo.app`).
    pub package_id: String,
    /// Site the app wraps.
    pub source_url: String,
}

/// Optional device capabilities requested for the generated app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub camera: bool,
    #[serde(alias = "mic")]
    pub microphone: bool,
    pub location: bool,
    pub files: bool,
}

/// Icon as submitted by the caller, before staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconAsset {
    /// Decoded image bytes that still need uploading.
    Inline { bytes: Vec<u8>, content_type: String },
    /// Already hosted somewhere; passed through untouched.
    Url(String),
}

/// A fully-formed build intent, ready for dispatch.
///
/// The token is minted before dispatch and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub token: CorrelationToken,
    pub target: TargetDescriptor,
    /// Durable URL of the staged icon.
    pub icon_url: String,
    pub features: FeatureFlags,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/build`.
///
/// Every field is optional at the wire level so that validation can name the
/// missing one. Legacy camelCase keys sent by older web clients are
/// accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitBuildRequest {
    #[serde(default, alias = "appName")]
    pub name: Option<String>,
    #[serde(default, alias = "packageName", alias = "package")]
    pub package_id: Option<String>,
    #[serde(default, alias = "appUrl", alias = "url")]
    pub source_url: Option<String>,
    /// Inline image (data URI or bare base64) or an existing URL.
    #[serde(default, alias = "iconBase64", alias = "icon_url")]
    pub icon: Option<String>,
    #[serde(default, alias = "permissions")]
    pub features: Option<FeatureFlags>,
}

impl SubmitBuildRequest {
    /// Validate the descriptor fields, naming the first missing one.
    pub fn target(&self) -> Result<TargetDescriptor, RelayError> {
        let name = required(&self.name, "name")?;
        let package_id = required(&self.package_id, "package_id")?;
        let source_url = required(&self.source_url, "source_url")?;

        if !(source_url.starts_with("http://") || source_url.starts_with("https://")) {
            return Err(RelayError::InvalidField {
                field: "source_url",
                message: "must be an http(s) URL".to_string(),
            });
        }

        Ok(TargetDescriptor {
            name,
            package_id,
            source_url,
        })
    }

    /// The raw icon string, trimmed. Missing or blank is a client error.
    pub fn icon(&self) -> Result<&str, RelayError> {
        match self.icon.as_deref().map(str::trim) {
            Some(icon) if !icon.is_empty() => Ok(icon),
            _ => Err(RelayError::MissingField("icon")),
        }
    }

    pub fn features(&self) -> FeatureFlags {
        self.features.unwrap_or_default()
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, RelayError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(RelayError::MissingField(field)),
    }
}
