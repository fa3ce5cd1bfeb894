//! Dispatcher: one trigger call per build request.
//!
//! The trigger API hands back no run handle, so the token is written into
//! every field the CI system might echo: a structured `correlation_id` and a
//! run title that carries the token in brackets.

use serde_json::json;

use buildrelay_types::error::RelayError;
use buildrelay_types::request::BuildRequest;

use crate::ci::{CiTrigger, DispatchPayload};
use crate::retry::RetryPolicy;

/// Name of the payload field carrying the correlation token.
pub const CORRELATION_FIELD: &str = "correlation_id";

/// Human-readable run title: `"<name> [<token>]"`.
pub fn run_title(request: &BuildRequest) -> String {
    format!("{} [{}]", request.target.name, request.token)
}

/// Build the trigger payload for `request`.
///
/// Key names match what the CI workflow reads from `client_payload`.
pub fn payload_for(event_type: &str, request: &BuildRequest) -> DispatchPayload {
    let title = run_title(request);
    let client_payload = json!({
        CORRELATION_FIELD: request.token.as_str(),
        "run_title": title,
        "app_name": request.target.name,
        "package_name": request.target.package_id,
        "app_url": request.target.source_url,
        "icon_url": request.icon_url,
        "use_camera": request.features.camera,
        "use_mic": request.features.microphone,
        "use_location": request.features.location,
        "use_files": request.features.files,
    });

    DispatchPayload {
        event_type: event_type.to_string(),
        title,
        client_payload,
    }
}

/// Issues trigger calls through a [`CiTrigger`].
pub struct Dispatcher<T: CiTrigger> {
    trigger: T,
    event_type: String,
    retry: RetryPolicy,
}

impl<T: CiTrigger> Dispatcher<T> {
    pub fn new(trigger: T, event_type: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            trigger,
            event_type: event_type.into(),
            retry,
        }
    }

    /// Trigger a run for `request`. Returns once the CI system accepts it.
    ///
    /// A retried attempt can start a second run for the same token; the
    /// correlator picks the earliest.
    pub async fn dispatch(&self, request: &BuildRequest) -> Result<(), RelayError> {
        let payload = payload_for(&self.event_type, request);

        self.retry
            .run("dispatch", || self.trigger.dispatch(&payload))
            .await
            .map_err(|e| {
                tracing::error!(token = %request.token, error = %e, "dispatch failed");
                RelayError::Dependency {
                    service: "CI",
                    message: e.to_string(),
                }
            })?;

        tracing::info!(
            token = %request.token,
            event_type = %self.event_type,
            package = %request.target.package_id,
            "build dispatched"
        );
        Ok(())
    }
}
