use axum::extract::{Path, State};
use axum::Json;
use hsm_domain::ScnSubscription;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::reply::MessageReply;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let subs = state.store.get_scn_subscriptions().await?;
    Ok(Json(json!({ "SubscriptionList": subs })))
}

pub async fn post(
    State(state): State<AppState>,
    Json(mut sub): Json<ScnSubscription>,
) -> Result<Json<ScnSubscription>, ApiError> {
    sub.verify().map_err(|e| ApiError::bad_request(e.to_string()))?;
    let id = state.store.insert_scn_subscription(sub.clone()).await?;
    sub.id = Some(id);
    state.scn.add_subscription(&sub).await;
    Ok(Json(sub))
}

pub async fn delete_all(State(state): State<AppState>) -> Result<Json<MessageReply>, ApiError> {
    let subs = state.store.get_scn_subscriptions().await?;
    let n = state.store.delete_scn_subscriptions_all().await?;
    for sub in &subs {
        state.scn.remove_subscription(sub).await;
    }
    if n == 0 {
        return Err(ApiError::not_found("no subscriptions to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ScnSubscription>, ApiError> {
    state
        .store
        .get_scn_subscription(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("subscription {} not found", id)))
}

/// PUT: replace the trigger sets wholesale.
pub async fn put_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut sub): Json<ScnSubscription>,
) -> Result<Json<ScnSubscription>, ApiError> {
    sub.verify().map_err(|e| ApiError::bad_request(e.to_string()))?;
    let old = state
        .store
        .get_scn_subscription(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("subscription {} not found", id)))?;
    sub.id = Some(id);
    state.store.update_scn_subscription(id, sub.clone()).await?;
    state.scn.replace_subscription(&old, &sub).await;
    Ok(Json(sub))
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionPatch {
    #[serde(rename = "Op", alias = "op")]
    pub op: Option<String>,
    #[serde(rename = "States", alias = "states")]
    pub states: Option<Vec<String>>,
    #[serde(rename = "Roles", alias = "roles")]
    pub roles: Option<Vec<String>>,
    #[serde(rename = "SubRoles", alias = "subRoles")]
    pub sub_roles: Option<Vec<String>>,
    #[serde(rename = "SoftwareStatus", alias = "softwareStatus")]
    pub software_status: Option<Vec<String>>,
    #[serde(rename = "Enabled", alias = "enabled")]
    pub enabled: Option<bool>,
}

/// PATCH `{op: add|remove, ...}`: adjust individual trigger dimensions.
pub async fn patch_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<SubscriptionPatch>,
) -> Result<Json<ScnSubscription>, ApiError> {
    let op = patch.op.as_deref().unwrap_or("add");
    if !op.eq_ignore_ascii_case("add") && !op.eq_ignore_ascii_case("remove") {
        return Err(ApiError::bad_request(format!("bad op '{}'", op)));
    }
    let adding = op.eq_ignore_ascii_case("add");

    let old = state
        .store
        .get_scn_subscription(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("subscription {} not found", id)))?;
    let mut new = old.clone();

    fn adjust(current: &mut Option<Vec<String>>, delta: &Option<Vec<String>>, adding: bool) {
        let Some(delta) = delta else { return };
        let mut values = current.take().unwrap_or_default();
        if adding {
            for v in delta {
                if !values.iter().any(|e| e.eq_ignore_ascii_case(v)) {
                    values.push(v.clone());
                }
            }
        } else {
            values.retain(|e| !delta.iter().any(|v| v.eq_ignore_ascii_case(e)));
        }
        *current = if values.is_empty() { None } else { Some(values) };
    }

    adjust(&mut new.states, &patch.states, adding);
    adjust(&mut new.roles, &patch.roles, adding);
    adjust(&mut new.sub_roles, &patch.sub_roles, adding);
    adjust(&mut new.software_status, &patch.software_status, adding);
    if let Some(enabled) = patch.enabled {
        new.enabled = if adding { Some(enabled) } else { None };
    }

    new.verify().map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.store.update_scn_subscription(id, new.clone()).await?;
    state.scn.replace_subscription(&old, &new).await;
    Ok(Json(new))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageReply>, ApiError> {
    let old = state
        .store
        .get_scn_subscription(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("subscription {} not found", id)))?;
    state.store.delete_scn_subscription(id).await?;
    state.scn.remove_subscription(&old).await;
    Ok(Json(MessageReply::deleted(1)))
}
