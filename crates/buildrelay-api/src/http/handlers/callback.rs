//! Push callback handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use buildrelay_types::status::CallbackNotification;

use crate::http::error::AppError;
use crate::http::response::CallbackResponse;
use crate::state::AppState;

/// POST /api/callback - Record a status pushed by the build system.
///
/// Bypasses correlation. A terminal view already on record is kept and
/// returned with `applied: false`.
pub async fn receive_callback(
    State(state): State<AppState>,
    body: Result<Json<CallbackNotification>, JsonRejection>,
) -> Result<Json<CallbackResponse>, AppError> {
    let Json(notification) = body?;
    let token = notification.token.trim().to_string();
    let recorded = state.relay.apply_callback(notification).await?;
    Ok(Json(CallbackResponse::new(token, &recorded)))
}
