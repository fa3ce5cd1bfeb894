//! Runs as reported by the external CI system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Lifecycle status of a CI run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
}

impl RunStatus {
    /// Parse a provider status string. Unknown pre-start states fold into
    /// `Queued`.
    pub fn from_provider(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "in_progress" | "running" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            _ => RunStatus::Queued,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "queued"),
            RunStatus::InProgress => write!(f, "in_progress"),
            RunStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Outcome of a completed CI run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    TimedOut,
    Skipped,
    Neutral,
    ActionRequired,
    Stale,
    Other(String),
}

impl RunConclusion {
    pub fn from_provider(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "success" => RunConclusion::Success,
            "failure" => RunConclusion::Failure,
            "cancelled" => RunConclusion::Cancelled,
            "timed_out" => RunConclusion::TimedOut,
            "skipped" => RunConclusion::Skipped,
            "neutral" => RunConclusion::Neutral,
            "action_required" => RunConclusion::ActionRequired,
            "stale" => RunConclusion::Stale,
            other => RunConclusion::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RunConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunConclusion::Success => write!(f, "success"),
            RunConclusion::Failure => write!(f, "failure"),
            RunConclusion::Cancelled => write!(f, "cancelled"),
            RunConclusion::TimedOut => write!(f, "timed_out"),
            RunConclusion::Skipped => write!(f, "skipped"),
            RunConclusion::Neutral => write!(f, "neutral"),
            RunConclusion::ActionRequired => write!(f, "action_required"),
            RunConclusion::Stale => write!(f, "stale"),
            RunConclusion::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One execution instance on the CI system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRun {
    /// CI-assigned identifier, unknown until after dispatch.
    pub id: u64,
    pub created_at: DateTime<Utc>,
    /// Human-readable run title, if the provider exposes one.
    pub title: Option<String>,
    pub status: RunStatus,
    pub conclusion: Option<RunConclusion>,
    /// Structured dispatch payload, when the provider echoes it on list calls.
    pub payload: Option<serde_json::Value>,
    /// Link to the run in the provider's UI.
    pub html_url: Option<String>,
}

/// Detail view of a single run, fetched on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetail {
    pub run_id: u64,
    pub payload: serde_json::Value,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
}
