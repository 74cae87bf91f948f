use axum::extract::State;
use axum::Json;
use hsm_domain::ProcessingModel;
use hsm_locks::{
    LockRequest, LockResponse, LockStatusResponse, ReservationCheckResponse,
    ReservationCreateRequest, ReservationCreateResponse, ReservationKeyRequest,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Under the rigid model a partial failure fails the whole request.
fn reject_rigid(model: ProcessingModel, failures: usize, detail: String) -> Result<(), ApiError> {
    if model == ProcessingModel::Rigid && failures > 0 {
        return Err(ApiError::bad_request(detail));
    }
    Ok(())
}

fn first_reason(failure: &[hsm_locks::FailedComponent]) -> String {
    failure
        .first()
        .map(|f| format!("{}: {}", f.id, f.reason))
        .unwrap_or_else(|| "batch failed".to_string())
}

// ── Admin locks ───────────────────────────────────────────────────────────────

pub async fn lock(
    State(state): State<AppState>,
    Json(body): Json<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    let (ids, model) = body.validate()?;
    let resp = state.locks.lock(&ids, model).await?;
    reject_rigid(model, resp.counts.failure, first_reason(&resp.failure))?;
    Ok(Json(resp))
}

pub async fn unlock(
    State(state): State<AppState>,
    Json(body): Json<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    let (ids, model) = body.validate()?;
    let resp = state.locks.unlock(&ids, model).await?;
    reject_rigid(model, resp.counts.failure, first_reason(&resp.failure))?;
    Ok(Json(resp))
}

pub async fn disable(
    State(state): State<AppState>,
    Json(body): Json<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    let (ids, model) = body.validate()?;
    let resp = state.locks.disable_reservations(&ids, model).await?;
    reject_rigid(model, resp.counts.failure, first_reason(&resp.failure))?;
    Ok(Json(resp))
}

pub async fn repair(
    State(state): State<AppState>,
    Json(body): Json<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    let (ids, model) = body.validate()?;
    let resp = state.locks.repair(&ids, model).await?;
    reject_rigid(model, resp.counts.failure, first_reason(&resp.failure))?;
    Ok(Json(resp))
}

pub async fn status(
    State(state): State<AppState>,
    Json(body): Json<LockRequest>,
) -> Result<Json<LockStatusResponse>, ApiError> {
    let (ids, _) = body.validate()?;
    Ok(Json(state.locks.status(&ids).await?))
}

// ── Reservations ──────────────────────────────────────────────────────────────

pub async fn reservations_create(
    State(state): State<AppState>,
    Json(body): Json<ReservationCreateRequest>,
) -> Result<Json<ReservationCreateResponse>, ApiError> {
    let req = LockRequest {
        component_ids: body.component_ids,
        processing_model: body.processing_model,
    };
    let (ids, model) = req.validate()?;
    let resp = state.locks.reserve(&ids, model).await?;
    reject_rigid(model, resp.counts.failure, first_reason(&resp.failure))?;
    Ok(Json(resp))
}

pub async fn reservations_release(
    State(state): State<AppState>,
    Json(body): Json<ReservationKeyRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    let model = parse_model(&body)?;
    let keys: Vec<String> = body.reservation_keys.iter().map(|k| k.key.clone()).collect();
    let resp = state.locks.release(&keys, model).await?;
    reject_rigid(model, resp.counts.failure, first_reason(&resp.failure))?;
    Ok(Json(resp))
}

pub async fn reservations_remove(
    State(state): State<AppState>,
    Json(body): Json<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    let (ids, model) = body.validate()?;
    let resp = state.locks.remove(&ids, model).await?;
    reject_rigid(model, resp.counts.failure, first_reason(&resp.failure))?;
    Ok(Json(resp))
}

// ── Service reservations ──────────────────────────────────────────────────────

pub async fn service_reservations_create(
    State(state): State<AppState>,
    Json(body): Json<ReservationCreateRequest>,
) -> Result<Json<ReservationCreateResponse>, ApiError> {
    let duration = body.reservation_duration.unwrap_or(1);
    let req = LockRequest {
        component_ids: body.component_ids,
        processing_model: body.processing_model,
    };
    let (ids, model) = req.validate()?;
    let resp = state.locks.reserve_service(&ids, model, duration).await?;
    reject_rigid(model, resp.counts.failure, first_reason(&resp.failure))?;
    Ok(Json(resp))
}

pub async fn service_reservations_renew(
    State(state): State<AppState>,
    Json(body): Json<ReservationKeyRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    let model = parse_model(&body)?;
    let duration = body.reservation_duration.unwrap_or(1);
    let keys: Vec<String> = body.reservation_keys.iter().map(|k| k.key.clone()).collect();
    let resp = state.locks.renew(&keys, duration, model).await?;
    reject_rigid(model, resp.counts.failure, first_reason(&resp.failure))?;
    Ok(Json(resp))
}

pub async fn service_reservations_release(
    State(state): State<AppState>,
    Json(body): Json<ReservationKeyRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    reservations_release(State(state), Json(body)).await
}

pub async fn service_reservations_check(
    State(state): State<AppState>,
    Json(body): Json<ReservationKeyRequest>,
) -> Result<Json<ReservationCheckResponse>, ApiError> {
    let keys: Vec<String> = body.deputy_keys.iter().map(|k| k.key.clone()).collect();
    Ok(Json(state.locks.check(&keys).await?))
}

fn parse_model(body: &ReservationKeyRequest) -> Result<ProcessingModel, ApiError> {
    match &body.processing_model {
        Some(s) => Ok(ProcessingModel::parse(s)?),
        None => Ok(ProcessingModel::Rigid),
    }
}
