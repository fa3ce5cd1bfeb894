//! Response bodies for the relay endpoints.

use serde::Serialize;

use buildrelay_core::registry::Recorded;
use buildrelay_types::request::BuildRequest;
use buildrelay_types::status::{BuildStatus, StatusView};

/// `POST /api/build` response.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub token: String,
    pub status: BuildStatus,
}

impl From<&BuildRequest> for SubmitResponse {
    fn from(request: &BuildRequest) -> Self {
        Self {
            token: request.token.to_string(),
            status: BuildStatus::Queued,
        }
    }
}

/// `GET /api/status/{token}` response. Null values are kept, not skipped.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub token: String,
    pub status: BuildStatus,
    pub conclusion: Option<String>,
    pub download_url: Option<String>,
    pub run_id: Option<u64>,
    pub run_url: Option<String>,
}

impl StatusResponse {
    pub fn new(token: impl Into<String>, view: StatusView) -> Self {
        Self {
            token: token.into(),
            status: view.status,
            conclusion: view.conclusion,
            download_url: view.download_url,
            run_id: view.run_id,
            run_url: view.run_url,
        }
    }
}

/// `POST /api/callback` response. `applied` is false when a terminal view
/// was already recorded.
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub token: String,
    pub status: BuildStatus,
    pub applied: bool,
}

impl CallbackResponse {
    pub fn new(token: impl Into<String>, recorded: &Recorded) -> Self {
        Self {
            token: token.into(),
            status: recorded.view.status,
            applied: recorded.applied,
        }
    }
}
