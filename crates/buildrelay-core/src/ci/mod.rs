//! CI provider ports.
//!
//! The relay talks to the external CI system through two capabilities:
//! [`CiTrigger`] starts a run, [`CiQuery`] reads runs back. The trigger API
//! returns no handle to the run it starts, which is why correlation exists.
//! Implementations live in buildrelay-infra (e.g. `GitHubActionsClient`).

pub mod box_ci;

use std::future::Future;

use serde::Serialize;

use buildrelay_types::error::CiError;
use buildrelay_types::run::{ExternalRun, ReleaseAsset, RunDetail};

/// Body of one trigger call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchPayload {
    /// Event name the CI workflow listens for.
    pub event_type: String,
    /// Human-readable run title carrying the token.
    #[serde(skip)]
    pub title: String,
    /// Structured payload; always carries the correlation token.
    pub client_payload: serde_json::Value,
}

/// Starts CI runs. Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait CiTrigger: Send + Sync {
    /// Issue one trigger call. Success means "accepted", not "started".
    fn dispatch(
        &self,
        payload: &DispatchPayload,
    ) -> impl Future<Output = Result<(), CiError>> + Send;
}

/// Reads CI runs and their artifacts.
pub trait CiQuery: Send + Sync {
    /// The most recent dispatch-triggered runs, newest first, at most `window`.
    fn list_recent_runs(
        &self,
        window: usize,
    ) -> impl Future<Output = Result<Vec<ExternalRun>, CiError>> + Send;

    /// One run by id. `None` if the provider no longer knows it.
    fn get_run(
        &self,
        run_id: u64,
    ) -> impl Future<Output = Result<Option<ExternalRun>, CiError>> + Send;

    /// Per-run detail used for payload comparison.
    fn get_run_detail(
        &self,
        run_id: u64,
    ) -> impl Future<Output = Result<RunDetail, CiError>> + Send;

    /// Assets attached to the release tagged `tag`. Empty if no such release.
    fn list_release_assets(
        &self,
        tag: &str,
    ) -> impl Future<Output = Result<Vec<ReleaseAsset>, CiError>> + Send;
}
