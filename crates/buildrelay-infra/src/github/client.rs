//! GitHubActionsClient -- [`CiTrigger`] and [`CiQuery`] over the GitHub REST API.
//!
//! Runs are started with `repository_dispatch` and read back from the
//! Actions runs, jobs and releases endpoints. Timeouts and retries are
//! applied by the relay's retry policy; this client only sets a transport
//! timeout as a backstop.
//!
//! The token is wrapped in [`secrecy::SecretString`] and is only exposed when
//! building the `Authorization` header.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use buildrelay_core::ci::{CiQuery, CiTrigger, DispatchPayload};
use buildrelay_types::config::CiConfig;
use buildrelay_types::error::CiError;
use buildrelay_types::run::{ExternalRun, ReleaseAsset, RunDetail};

use super::types::{ApiErrorBody, JobsResponse, Release, WorkflowRun, WorkflowRunsResponse};

/// GitHub caps `per_page` at 100.
const MAX_PAGE_SIZE: usize = 100;

/// GitHub Actions client for one repository.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct GitHubActionsClient {
    client: reqwest::Client,
    token: Arc<SecretString>,
    base_url: String,
    owner: String,
    repo: String,
}

// Deliberately no Debug derive: the token must never reach a log line.

impl GitHubActionsClient {
    /// The REST API version header value.
    const API_VERSION: &'static str = "2022-11-28";

    const USER_AGENT: &'static str = concat!("buildrelay/", env!("CARGO_PKG_VERSION"));

    /// Create a client for `config.owner/config.repo`.
    pub fn new(config: &CiConfig, token: SecretString) -> Result<Self, CiError> {
        let client = reqwest::Client::builder()
            // Backstop only; each call is also bounded by the retry policy.
            .timeout(Duration::from_secs(config.request_timeout_secs.saturating_mul(2).max(1)))
            .user_agent(Self::USER_AGENT)
            .build()
            .map_err(|e| CiError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: Arc::new(token),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
        })
    }

    /// Override the base URL (GitHub Enterprise, proxies, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// `owner/repo`, for log lines.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Full URL for a path under `/repos/{owner}/{repo}`.
    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.base_url, self.owner, self.repo, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token.expose_secret()))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", Self::API_VERSION)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, CiError> {
        builder.send().await.map_err(transport_error)
    }

    /// GET `url` and decode JSON. `Ok(None)` on 404.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<Option<T>, CiError> {
        let response = self.send(self.request(reqwest::Method::GET, url)).await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| CiError::Decode(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> CiError {
    if e.is_timeout() {
        CiError::Timeout
    } else {
        CiError::Unavailable(format!("HTTP request failed: {e}"))
    }
}

/// Build a rejection from a non-success response, preferring GitHub's message.
fn rejection(status: u16, body: &str) -> CiError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    CiError::Rejected { status, message }
}

impl CiTrigger for GitHubActionsClient {
    async fn dispatch(&self, payload: &DispatchPayload) -> Result<(), CiError> {
        let url = self.repo_url("/dispatches");
        let response = self
            .send(self.request(reqwest::Method::POST, &url).json(payload))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &body));
        }

        tracing::debug!(repository = %self.repository(), event_type = %payload.event_type, "repository_dispatch accepted");
        Ok(())
    }
}

impl CiQuery for GitHubActionsClient {
    async fn list_recent_runs(&self, window: usize) -> Result<Vec<ExternalRun>, CiError> {
        let per_page = window.clamp(1, MAX_PAGE_SIZE);
        let url = self.repo_url(&format!("/actions/runs?event=repository_dispatch&per_page={per_page}"));

        let response: Option<WorkflowRunsResponse> = self.get_json(&url).await?;
        let runs = response
            .map(|r| r.workflow_runs.into_iter().map(WorkflowRun::into_external).collect())
            .unwrap_or_default();
        Ok(runs)
    }

    async fn get_run(&self, run_id: u64) -> Result<Option<ExternalRun>, CiError> {
        let url = self.repo_url(&format!("/actions/runs/{run_id}"));
        let run: Option<WorkflowRun> = self.get_json(&url).await?;
        Ok(run.map(WorkflowRun::into_external))
    }

    async fn get_run_detail(&self, run_id: u64) -> Result<RunDetail, CiError> {
        let url = self.repo_url(&format!("/actions/runs/{run_id}/jobs"));
        let jobs: JobsResponse = self.get_json(&url).await?.ok_or_else(|| CiError::Rejected {
            status: 404,
            message: format!("run {run_id} not found"),
        })?;

        Ok(RunDetail {
            run_id,
            payload: jobs.to_payload(),
        })
    }

    async fn list_release_assets(&self, tag: &str) -> Result<Vec<ReleaseAsset>, CiError> {
        let url = self.repo_url(&format!("/releases/tags/{tag}"));
        let release: Option<Release> = self.get_json(&url).await?;
        Ok(release
            .map(|r| r.assets.into_iter().map(Into::into).collect())
            .unwrap_or_default())
    }
}
