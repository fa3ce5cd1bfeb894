//! Status projector: CI run state -> [`StatusView`].
//!
//! A successful run gets exactly one extra lookup to find its artifact. Not
//! finding one is reported as `completed` with no download URL; build success
//! and asset discovery are kept apart.

use std::sync::Arc;

use buildrelay_types::config::CiConfig;
use buildrelay_types::error::CiError;
use buildrelay_types::run::{ExternalRun, ReleaseAsset, RunConclusion, RunStatus};
use buildrelay_types::status::{BuildStatus, StatusView};

use crate::ci::CiQuery;
use crate::retry::RetryPolicy;

/// Map provider status and conclusion onto the relay's status enum.
///
/// A completed run without a conclusion is still finalising and reports as
/// in progress.
pub fn project_status(status: RunStatus, conclusion: Option<&RunConclusion>) -> BuildStatus {
    match (status, conclusion) {
        (RunStatus::Queued, _) => BuildStatus::Queued,
        (RunStatus::InProgress, _) => BuildStatus::InProgress,
        (RunStatus::Completed, Some(RunConclusion::Success)) => BuildStatus::Completed,
        (RunStatus::Completed, Some(_)) => BuildStatus::Failed,
        (RunStatus::Completed, None) => BuildStatus::InProgress,
    }
}

/// Pick the artifact: exact name first, then the first file with the extension.
pub fn select_artifact<'a>(assets: &'a [ReleaseAsset], name: &str, extension: &str) -> Option<&'a ReleaseAsset> {
    assets
        .iter()
        .find(|a| a.name == name)
        .or_else(|| assets.iter().find(|a| a.name.ends_with(extension)))
}

pub struct Projector<Q: CiQuery> {
    query: Arc<Q>,
    ci: CiConfig,
    retry: RetryPolicy,
}

impl<Q: CiQuery> Projector<Q> {
    pub fn new(query: Arc<Q>, ci: CiConfig, retry: RetryPolicy) -> Self {
        Self { query, ci, retry }
    }

    /// Project `run` into a view, resolving the artifact on success.
    ///
    /// Errors only when the artifact lookup itself fails, so a transient
    /// outage is never mistaken for "no artifact".
    pub async fn project(&self, run: &ExternalRun) -> Result<StatusView, CiError> {
        let status = project_status(run.status, run.conclusion.as_ref());
        let mut view = StatusView {
            status,
            conclusion: run.conclusion.as_ref().map(ToString::to_string),
            download_url: None,
            run_id: Some(run.id),
            run_url: run.html_url.clone(),
        };

        if status == BuildStatus::Completed {
            let tag = self.ci.release_tag_for(run.id);
            let assets = self
                .retry
                .run("list_release_assets", || self.query.list_release_assets(&tag))
                .await?;

            match select_artifact(&assets, &self.ci.artifact_name, &self.ci.artifact_extension) {
                Some(asset) => view.download_url = Some(asset.download_url.clone()),
                None => tracing::warn!(
                    run_id = run.id,
                    tag = %tag,
                    assets = assets.len(),
                    "build succeeded but no artifact was found"
                ),
            }
        }

        Ok(view)
    }
}
