use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use hsm_domain::{RedfishEndpoint, Xname};
use hsm_vault::CompCredentials;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::query::{rf_endpoint_filter, QueryLists};
use crate::reply::{MessageReply, ResourceUri};
use crate::state::AppState;

fn parse_xname(raw: &str) -> Result<Xname, ApiError> {
    Xname::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

fn render(eps: Vec<RedfishEndpoint>) -> Value {
    let scrubbed: Vec<RedfishEndpoint> = eps.iter().map(|ep| ep.scrubbed()).collect();
    json!({ "RedfishEndpoints": scrubbed })
}

/// Hand the posted password to the vault, never to the store.
async fn stash_credentials(state: &AppState, ep: &RedfishEndpoint) {
    if ep.user.is_empty() && ep.password.is_empty() {
        return;
    }
    let cred = CompCredentials {
        xname: ep.id.to_string(),
        username: ep.user.clone(),
        password: ep.password.clone(),
        url: format!("{}/redfish/v1", ep.fqdn),
    };
    if let Err(e) = state.vault.store_comp_cred(cred).await {
        warn!(endpoint = %ep.id, error = %e, "storing endpoint credentials failed");
    }
}

/// Kick a background discovery for freshly added or replaced endpoints.
fn spawn_discovery(state: &AppState, ids: Vec<Xname>, force: bool) {
    let discovery = state.discovery.clone();
    tokio::spawn(async move {
        if let Err(e) = discovery.discover_from_endpoints(&ids, 0, false, force).await {
            warn!(error = %e, "background discovery failed");
        }
    });
}

// ── Collection ────────────────────────────────────────────────────────────────

pub async fn list(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let q = QueryLists::from_pairs(pairs);
    let eps = state.store.get_rf_endpoints(&rf_endpoint_filter(&q)).await?;
    Ok(Json(render(eps)))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PostEndpoints {
    Wrapped {
        #[serde(rename = "RedfishEndpoints", alias = "redfishEndpoints")]
        redfish_endpoints: Vec<RedfishEndpoint>,
    },
    Single(Box<RedfishEndpoint>),
}

pub async fn post(
    State(state): State<AppState>,
    Json(body): Json<PostEndpoints>,
) -> Result<(StatusCode, Json<Vec<ResourceUri>>), ApiError> {
    let mut eps = match body {
        PostEndpoints::Wrapped { redfish_endpoints } => redfish_endpoints,
        PostEndpoints::Single(ep) => vec![*ep],
    };
    if eps.is_empty() {
        return Err(ApiError::bad_request("missing RedfishEndpoints"));
    }
    for ep in &mut eps {
        ep.normalize().map_err(|e| ApiError::bad_request(e.to_string()))?;
    }
    let mut uris = Vec::with_capacity(eps.len());
    let mut new_ids = Vec::with_capacity(eps.len());
    for ep in eps {
        stash_credentials(&state, &ep).await;
        state.store.insert_rf_endpoint(ep.scrubbed()).await?;
        uris.push(ResourceUri {
            uri: format!("/hsm/v2/Inventory/RedfishEndpoints/{}", ep.id),
        });
        new_ids.push(ep.id);
    }
    spawn_discovery(&state, new_ids, false);
    Ok((StatusCode::CREATED, Json(uris)))
}

pub async fn delete_all(State(state): State<AppState>) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_rf_endpoints_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no endpoints to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

// ── Single resource ───────────────────────────────────────────────────────────

pub async fn get_one(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<RedfishEndpoint>, ApiError> {
    let id = parse_xname(&xname)?;
    let ep = state
        .store
        .get_rf_endpoint(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("endpoint '{}' not found", id)))?;
    Ok(Json(ep.scrubbed()))
}

pub async fn put_one(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Json(mut ep): Json<RedfishEndpoint>,
) -> Result<Json<RedfishEndpoint>, ApiError> {
    let id = parse_xname(&xname)?;
    if ep.id != id {
        return Err(ApiError::bad_request("body ID does not match URL"));
    }
    ep.normalize().map_err(|e| ApiError::bad_request(e.to_string()))?;
    stash_credentials(&state, &ep).await;
    state.store.update_rf_endpoint(ep.scrubbed()).await?;
    if ep.rediscover_on_update {
        spawn_discovery(&state, vec![ep.id.clone()], true);
    }
    Ok(Json(ep.scrubbed()))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    let id = parse_xname(&xname)?;
    state.store.delete_rf_endpoint(&id).await?;
    Ok(Json(MessageReply::deleted(1)))
}

// ── Query view ────────────────────────────────────────────────────────────────

pub async fn query(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if xname.eq_ignore_ascii_case("all") {
        let eps = state
            .store
            .get_rf_endpoints(&Default::default())
            .await?;
        return Ok(Json(render(eps)));
    }
    let id = parse_xname(&xname)?;
    let ep = state
        .store
        .get_rf_endpoint(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("endpoint '{}' not found", id)))?;
    Ok(Json(render(vec![ep])))
}
