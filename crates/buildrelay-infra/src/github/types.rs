//! GitHub REST API types.
//!
//! Only the fields the relay reads are modelled; everything else in the
//! responses is ignored. These are NOT the provider-agnostic run types from
//! buildrelay-types -- conversion happens here.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use buildrelay_types::run::{ExternalRun, ReleaseAsset, RunConclusion, RunStatus};

/// Response of `GET /repos/{owner}/{repo}/actions/runs`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunsResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

/// One workflow run.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    /// The run name as rendered by GitHub (`run-name:` in the workflow).
    #[serde(default)]
    pub display_title: Option<String>,
    /// Workflow name; used when `display_title` is absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl WorkflowRun {
    /// GitHub does not expose `client_payload` on runs, so `payload` is `None`.
    pub fn into_external(self) -> ExternalRun {
        ExternalRun {
            id: self.id,
            created_at: self.created_at,
            title: self.display_title.or(self.name),
            status: self
                .status
                .as_deref()
                .map(RunStatus::from_provider)
                .unwrap_or(RunStatus::Queued),
            conclusion: self.conclusion.as_deref().map(RunConclusion::from_provider),
            payload: None,
            html_url: self.html_url,
        }
    }
}

/// Response of `GET /repos/{owner}/{repo}/actions/runs/{id}/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsResponse {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub name: String,
}

impl JobsResponse {
    /// Job and step names as a JSON document for payload comparison.
    pub fn to_payload(&self) -> serde_json::Value {
        let jobs: Vec<serde_json::Value> = self
            .jobs
            .iter()
            .map(|job| {
                json!({
                    "name": job.name,
                    "steps": job.steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        json!({ "jobs": jobs })
    }
}

/// Response of `GET /repos/{owner}/{repo}/releases/tags/{tag}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

impl From<Asset> for ReleaseAsset {
    fn from(asset: Asset) -> Self {
        ReleaseAsset {
            name: asset.name,
            download_url: asset.browser_download_url,
        }
    }
}

/// Error body GitHub returns on 4xx/5xx.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}
