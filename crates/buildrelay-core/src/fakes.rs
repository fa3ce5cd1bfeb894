//! In-memory CI and asset-store fakes.
//!
//! Deterministic stand-ins for the external systems, used by the unit tests
//! here and (through the `fakes` feature) by the API crate's router tests.
//! Clones share state, so a test can keep a handle while the relay owns
//! another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use buildrelay_types::error::{CiError, StorageError};
use buildrelay_types::request::{BuildRequest, FeatureFlags, TargetDescriptor};
use buildrelay_types::run::{ExternalRun, ReleaseAsset, RunDetail, RunStatus};
use buildrelay_types::token::CorrelationToken;

use crate::ci::{CiQuery, CiTrigger, DispatchPayload};
use crate::storage::asset_store::AssetStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A queued run created `secs` seconds after a fixed epoch.
pub fn run_at(id: u64, secs: i64) -> ExternalRun {
    ExternalRun {
        id,
        created_at: DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap_or_default(),
        title: None,
        status: RunStatus::Queued,
        conclusion: None,
        payload: None,
        html_url: Some(format!("https://ci.test/runs/{id}")),
    }
}

/// A ready-to-dispatch request for `com.demo.app` with the camera enabled.
pub fn sample_request() -> BuildRequest {
    BuildRequest {
        token: CorrelationToken::new(),
        target: TargetDescriptor {
            name: "Demo".to_string(),
            package_id: "com.demo.app".to_string(),
            source_url: "https://demo.test".to_string(),
        },
        icon_url: "https://bucket.test/icons/demo.png".to_string(),
        features: FeatureFlags {
            camera: true,
            ..FeatureFlags::default()
        },
        created_at: Utc::now(),
    }
}

#[derive(Default)]
struct CiState {
    runs: Vec<ExternalRun>,
    details: HashMap<u64, serde_json::Value>,
    assets: HashMap<String, Vec<ReleaseAsset>>,
    dispatched: Vec<DispatchPayload>,
    detail_calls: Vec<u64>,
    dispatch_error: Option<CiError>,
    query_error: Option<CiError>,
}

/// Fake CI system implementing both [`CiTrigger`] and [`CiQuery`].
#[derive(Clone, Default)]
pub struct FakeCi {
    state: Arc<Mutex<CiState>>,
}

impl FakeCi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a run visible to queries. Replaces any run with the same id.
    pub fn push_run(&self, run: ExternalRun) {
        let mut state = lock(&self.state);
        state.runs.retain(|r| r.id != run.id);
        state.runs.push(run);
    }

    pub fn set_detail(&self, run_id: u64, payload: serde_json::Value) {
        lock(&self.state).details.insert(run_id, payload);
    }

    pub fn set_assets(&self, tag: &str, assets: Vec<ReleaseAsset>) {
        lock(&self.state).assets.insert(tag.to_string(), assets);
    }

    pub fn fail_dispatch(&self, error: CiError) {
        lock(&self.state).dispatch_error = Some(error);
    }

    /// Make every query call fail with `error`.
    pub fn fail_queries(&self, error: CiError) {
        lock(&self.state).query_error = Some(error);
    }

    /// Payloads of every accepted dispatch, in order.
    pub fn dispatched(&self) -> Vec<DispatchPayload> {
        lock(&self.state).dispatched.clone()
    }

    /// Run ids passed to `get_run_detail`, in call order.
    pub fn detail_calls(&self) -> Vec<u64> {
        lock(&self.state).detail_calls.clone()
    }

    fn query_error(&self) -> Option<CiError> {
        lock(&self.state).query_error.clone()
    }
}

impl CiTrigger for FakeCi {
    async fn dispatch(&self, payload: &DispatchPayload) -> Result<(), CiError> {
        let mut state = lock(&self.state);
        if let Some(e) = state.dispatch_error.clone() {
            return Err(e);
        }
        state.dispatched.push(payload.clone());
        Ok(())
    }
}

impl CiQuery for FakeCi {
    async fn list_recent_runs(&self, window: usize) -> Result<Vec<ExternalRun>, CiError> {
        if let Some(e) = self.query_error() {
            return Err(e);
        }
        let mut runs = lock(&self.state).runs.clone();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        runs.truncate(window);
        Ok(runs)
    }

    async fn get_run(&self, run_id: u64) -> Result<Option<ExternalRun>, CiError> {
        if let Some(e) = self.query_error() {
            return Err(e);
        }
        Ok(lock(&self.state).runs.iter().find(|r| r.id == run_id).cloned())
    }

    async fn get_run_detail(&self, run_id: u64) -> Result<RunDetail, CiError> {
        if let Some(e) = self.query_error() {
            return Err(e);
        }
        let mut state = lock(&self.state);
        state.detail_calls.push(run_id);
        match state.details.get(&run_id) {
            Some(payload) => Ok(RunDetail {
                run_id,
                payload: payload.clone(),
            }),
            None => Err(CiError::Rejected {
                status: 404,
                message: format!("run {run_id} not found"),
            }),
        }
    }

    async fn list_release_assets(&self, tag: &str) -> Result<Vec<ReleaseAsset>, CiError> {
        if let Some(e) = self.query_error() {
            return Err(e);
        }
        Ok(lock(&self.state).assets.get(tag).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct StoreState {
    uploads: Vec<(String, usize)>,
    error: Option<StorageError>,
}

/// Fake object store returning `<base>/<key>` for every upload.
#[derive(Clone)]
pub struct FakeAssetStore {
    base_url: String,
    state: Arc<Mutex<StoreState>>,
}

impl FakeAssetStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Arc::default(),
        }
    }

    pub fn fail_with(&self, error: StorageError) {
        lock(&self.state).error = Some(error);
    }

    /// `(key, size)` of every successful upload.
    pub fn uploads(&self) -> Vec<(String, usize)> {
        lock(&self.state).uploads.clone()
    }
}

impl AssetStore for FakeAssetStore {
    async fn upload(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String, StorageError> {
        let mut state = lock(&self.state);
        if let Some(e) = state.error.clone() {
            return Err(e);
        }
        state.uploads.push((key.to_string(), bytes.len()));
        Ok(format!("{}/{}", self.base_url, key))
    }
}
