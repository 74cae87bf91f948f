use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::error::ApiError;
use crate::reply::MessageReply;
use crate::state::AppState;

/// Readiness: provable store round-trip or 503.
pub async fn ready(State(state): State<AppState>) -> Result<Json<MessageReply>, ApiError> {
    state
        .store
        .get_discovery_statuses()
        .await
        .map_err(|_| ApiError { status: StatusCode::SERVICE_UNAVAILABLE, detail: "store unavailable".to_string() })?;
    Ok(Json(MessageReply::ok("HSM is healthy")))
}

/// Liveness: the process is serving requests.
pub async fn liveness() -> StatusCode {
    StatusCode::NO_CONTENT
}
