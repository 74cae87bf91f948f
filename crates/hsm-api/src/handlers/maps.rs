use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use hsm_domain::{NodeMap, PowerMap, Xname};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::reply::MessageReply;
use crate::state::AppState;

fn parse_xname(raw: &str) -> Result<Xname, ApiError> {
    Xname::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

// ── Node maps ─────────────────────────────────────────────────────────────────

pub async fn list_node_maps(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let maps = state.store.get_node_maps().await?;
    Ok(Json(json!({ "NodeMaps": maps })))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PostNodeMaps {
    Wrapped {
        #[serde(rename = "NodeMaps", alias = "nodeMaps")]
        node_maps: Vec<NodeMap>,
    },
    List(Vec<NodeMap>),
    Single(NodeMap),
}

pub async fn post_node_maps(
    State(state): State<AppState>,
    Json(body): Json<PostNodeMaps>,
) -> Result<Json<MessageReply>, ApiError> {
    let maps = match body {
        PostNodeMaps::Wrapped { node_maps } => node_maps,
        PostNodeMaps::List(list) => list,
        PostNodeMaps::Single(one) => vec![one],
    };
    if maps.is_empty() {
        return Err(ApiError::bad_request("missing NodeMaps"));
    }
    let n = maps.len();
    for map in maps {
        map.verify().map_err(|e| ApiError::bad_request(e.to_string()))?;
        state.store.upsert_node_map(map).await?;
    }
    Ok(Json(MessageReply::ok(format!("created or updated {} entries", n))))
}

pub async fn delete_node_maps(State(state): State<AppState>) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_node_maps_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no node maps to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

pub async fn get_node_map(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<NodeMap>, ApiError> {
    let id = parse_xname(&xname)?;
    state
        .store
        .get_node_map(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("node map '{}' not found", id)))
}

pub async fn put_node_map(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Json(map): Json<NodeMap>,
) -> Result<Json<NodeMap>, ApiError> {
    let id = parse_xname(&xname)?;
    if map.id != id {
        return Err(ApiError::bad_request("body ID does not match URL"));
    }
    map.verify().map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.store.upsert_node_map(map.clone()).await?;
    Ok(Json(map))
}

pub async fn delete_node_map(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    let id = parse_xname(&xname)?;
    state.store.delete_node_map(&id).await?;
    Ok(Json(MessageReply::deleted(1)))
}

// ── Power maps ────────────────────────────────────────────────────────────────

pub async fn list_power_maps(State(state): State<AppState>) -> Result<Json<Vec<PowerMap>>, ApiError> {
    Ok(Json(state.store.get_power_maps().await?))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PostPowerMaps {
    List(Vec<PowerMap>),
    Single(PowerMap),
}

pub async fn post_power_maps(
    State(state): State<AppState>,
    Json(body): Json<PostPowerMaps>,
) -> Result<StatusCode, ApiError> {
    let maps = match body {
        PostPowerMaps::List(list) => list,
        PostPowerMaps::Single(one) => vec![one],
    };
    if maps.is_empty() {
        return Err(ApiError::bad_request("missing power maps"));
    }
    for map in maps {
        state.store.upsert_power_map(map).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_power_maps(
    State(state): State<AppState>,
) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_power_maps_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no power maps to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

pub async fn get_power_map(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<PowerMap>, ApiError> {
    let id = parse_xname(&xname)?;
    state
        .store
        .get_power_map(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("power map '{}' not found", id)))
}

pub async fn put_power_map(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Json(map): Json<PowerMap>,
) -> Result<Json<PowerMap>, ApiError> {
    let id = parse_xname(&xname)?;
    if map.id != id {
        return Err(ApiError::bad_request("body ID does not match URL"));
    }
    state.store.upsert_power_map(map.clone()).await?;
    Ok(Json(map))
}

pub async fn delete_power_map(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    let id = parse_xname(&xname)?;
    state.store.delete_power_map(&id).await?;
    Ok(Json(MessageReply::deleted(1)))
}
