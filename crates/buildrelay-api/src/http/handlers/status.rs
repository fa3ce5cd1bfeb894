//! Status polling handler.

use axum::Json;
use axum::extract::{Path, State};

use buildrelay_types::status::StatusView;
use buildrelay_types::token::CorrelationToken;

use crate::http::response::StatusResponse;
use crate::state::AppState;

/// GET /api/status/{token} - Current status of a submitted build.
///
/// Always 200. Unknown tokens report `queued` or `not_found`, CI outages
/// report `in_progress`.
pub async fn get_status(State(state): State<AppState>, Path(token): Path<String>) -> Json<StatusResponse> {
    let view = match token.parse::<CorrelationToken>() {
        Ok(parsed) => state.relay.status(&parsed).await,
        Err(_) => StatusView::not_found(),
    };
    Json(StatusResponse::new(token, view))
}
