//! Caller-facing status values and the registry record that caches them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::token::CorrelationToken;

/// Stable status enum exposed to polling clients.
///
/// - Queued: dispatched, no matching run visible yet (or run not started)
/// - InProgress: run is executing, or status could not be read right now
/// - Completed: run succeeded (download URL may still be absent)
/// - Failed: run finished with any non-success conclusion
/// - NotFound: token unknown and too old to still be in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Queued,
    InProgress,
    #[serde(alias = "success")]
    Completed,
    #[serde(alias = "failure")]
    Failed,
    NotFound,
}

impl BuildStatus {
    /// Completed and failed are terminal: no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStatus::Completed | BuildStatus::Failed)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Queued => write!(f, "queued"),
            BuildStatus::InProgress => write!(f, "in_progress"),
            BuildStatus::Completed => write!(f, "completed"),
            BuildStatus::Failed => write!(f, "failed"),
            BuildStatus::NotFound => write!(f, "not_found"),
        }
    }
}

impl FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(BuildStatus::Queued),
            "in_progress" => Ok(BuildStatus::InProgress),
            "completed" | "success" => Ok(BuildStatus::Completed),
            "failed" | "failure" => Ok(BuildStatus::Failed),
            "not_found" => Ok(BuildStatus::NotFound),
            other => Err(format!("invalid build status: '{other}'")),
        }
    }
}

/// Derived, never authoritative view of a build. Truth lives in CI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub status: BuildStatus,
    /// Raw CI conclusion when the run has finished.
    pub conclusion: Option<String>,
    pub download_url: Option<String>,
    pub run_id: Option<u64>,
    pub run_url: Option<String>,
}

impl StatusView {
    /// A bare view with only a status set.
    pub fn of(status: BuildStatus) -> Self {
        Self {
            status,
            conclusion: None,
            download_url: None,
            run_id: None,
            run_url: None,
        }
    }

    pub fn queued() -> Self {
        Self::of(BuildStatus::Queued)
    }

    pub fn in_progress() -> Self {
        Self::of(BuildStatus::InProgress)
    }

    pub fn not_found() -> Self {
        Self::of(BuildStatus::NotFound)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Cached state for one token: the correlation (if formed) plus the last
/// projected view.
///
/// `revision` increases by one on every successful write and is the guard
/// for compare-and-swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub token: CorrelationToken,
    /// Bound CI run. At most one per token at a time; replaced only when a
    /// poll correlates the token to a different run.
    pub run_id: Option<u64>,
    pub view: StatusView,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl RegistryEntry {
    /// The entry recorded right after a successful dispatch.
    pub fn dispatched(token: CorrelationToken) -> Self {
        Self {
            token,
            run_id: None,
            view: StatusView::queued(),
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    /// The next revision of this entry carrying `view`.
    pub fn advance(&self, run_id: Option<u64>, view: StatusView) -> Self {
        Self {
            token: self.token.clone(),
            run_id: self.run_id.or(run_id),
            view,
            revision: self.revision + 1,
            updated_at: Utc::now(),
        }
    }

    /// The next revision, bound to `run_id` whatever the current binding.
    pub fn rebind(&self, run_id: u64, view: StatusView) -> Self {
        Self {
            run_id: Some(run_id),
            ..self.advance(None, view)
        }
    }
}

/// Push notification from a system that reports status instead of being
/// polled (`POST /api/callback`).
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackNotification {
    pub token: String,
    pub status: BuildStatus,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub run_id: Option<u64>,
}
