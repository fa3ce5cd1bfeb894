//! Build submission handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use buildrelay_types::request::SubmitBuildRequest;

use crate::http::error::AppError;
use crate::http::response::SubmitResponse;
use crate::state::AppState;

/// POST /api/build - Stage the icon, dispatch a CI run and return its token.
///
/// Responds 202: the run is triggered but not yet visible.
pub async fn submit_build(
    State(state): State<AppState>,
    body: Result<Json<SubmitBuildRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let Json(submission) = body?;
    let request = state.relay.submit(&submission).await?;

    tracing::info!(
        token = %request.token,
        package_id = %request.target.package_id,
        "build submitted"
    );
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse::from(&request))))
}
