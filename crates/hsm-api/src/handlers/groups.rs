use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use hsm_domain::{Group, Membership, Partition, Xname};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::query::QueryLists;
use crate::reply::{MessageReply, ResourceUri};
use crate::state::AppState;

fn parse_xname(raw: &str) -> Result<Xname, ApiError> {
    Xname::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

// ── Groups ────────────────────────────────────────────────────────────────────

pub async fn list_groups(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let q = QueryLists::from_pairs(pairs);
    let groups = state.store.get_groups(q.first("tag")).await?;
    Ok(Json(groups))
}

pub async fn post_group(
    State(state): State<AppState>,
    Json(group): Json<Group>,
) -> Result<(StatusCode, Json<Vec<ResourceUri>>), ApiError> {
    group.verify().map_err(|e| ApiError::bad_request(e.to_string()))?;
    let label = group.label.clone();
    state.store.insert_group(group).await?;
    Ok((
        StatusCode::CREATED,
        Json(vec![ResourceUri { uri: format!("/hsm/v2/groups/{}", label) }]),
    ))
}

pub async fn list_group_labels(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let groups = state.store.get_groups(None).await?;
    Ok(Json(groups.into_iter().map(|g| g.label).collect()))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Json<Group>, ApiError> {
    state
        .store
        .get_group(&label)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("group '{}' not found", label)))
}

#[derive(Debug, Deserialize)]
pub struct GroupPatchBody {
    #[serde(rename = "Description", alias = "description")]
    pub description: Option<String>,
    #[serde(rename = "Tags", alias = "tags")]
    pub tags: Option<Vec<String>>,
}

pub async fn patch_group(
    State(state): State<AppState>,
    Path(label): Path<String>,
    Json(body): Json<GroupPatchBody>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .patch_group(&label, body.description, body.tags)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_group(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    state.store.delete_group(&label).await?;
    Ok(Json(MessageReply::deleted(1)))
}

pub async fn list_group_members(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let group = state
        .store
        .get_group(&label)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("group '{}' not found", label)))?;
    Ok(Json(json!(group.members)))
}

#[derive(Debug, Deserialize)]
pub struct MemberBody {
    #[serde(rename = "ID", alias = "id")]
    pub id: Option<String>,
}

pub async fn post_group_member(
    State(state): State<AppState>,
    Path(label): Path<String>,
    Json(body): Json<MemberBody>,
) -> Result<(StatusCode, Json<Vec<ResourceUri>>), ApiError> {
    let id = parse_xname(body.id.as_deref().ok_or_else(|| ApiError::bad_request("missing ID"))?)?;
    state.store.add_group_member(&label, &id).await?;
    Ok((
        StatusCode::CREATED,
        Json(vec![ResourceUri { uri: format!("/hsm/v2/groups/{}/members/{}", label, id) }]),
    ))
}

pub async fn delete_group_member(
    State(state): State<AppState>,
    Path((label, xname)): Path<(String, String)>,
) -> Result<Json<MessageReply>, ApiError> {
    let id = parse_xname(&xname)?;
    state.store.remove_group_member(&label, &id).await?;
    Ok(Json(MessageReply::deleted(1)))
}

// ── Partitions ────────────────────────────────────────────────────────────────

pub async fn list_partitions(State(state): State<AppState>) -> Result<Json<Vec<Partition>>, ApiError> {
    Ok(Json(state.store.get_partitions().await?))
}

pub async fn post_partition(
    State(state): State<AppState>,
    Json(partition): Json<Partition>,
) -> Result<(StatusCode, Json<Vec<ResourceUri>>), ApiError> {
    partition.verify().map_err(|e| ApiError::bad_request(e.to_string()))?;
    let name = partition.name.clone();
    state.store.insert_partition(partition).await?;
    Ok((
        StatusCode::CREATED,
        Json(vec![ResourceUri { uri: format!("/hsm/v2/partitions/{}", name) }]),
    ))
}

pub async fn list_partition_names(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let partitions = state.store.get_partitions().await?;
    Ok(Json(partitions.into_iter().map(|p| p.name).collect()))
}

pub async fn get_partition(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Partition>, ApiError> {
    state
        .store
        .get_partition(&name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("partition '{}' not found", name)))
}

pub async fn patch_partition(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<GroupPatchBody>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .patch_partition(&name, body.description, body.tags)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_partition(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    state.store.delete_partition(&name).await?;
    Ok(Json(MessageReply::deleted(1)))
}

pub async fn list_partition_members(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let partition = state
        .store
        .get_partition(&name)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("partition '{}' not found", name)))?;
    Ok(Json(json!(partition.members)))
}

pub async fn post_partition_member(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<MemberBody>,
) -> Result<(StatusCode, Json<Vec<ResourceUri>>), ApiError> {
    let id = parse_xname(body.id.as_deref().ok_or_else(|| ApiError::bad_request("missing ID"))?)?;
    state.store.add_partition_member(&name, &id).await?;
    Ok((
        StatusCode::CREATED,
        Json(vec![ResourceUri { uri: format!("/hsm/v2/partitions/{}/members/{}", name, id) }]),
    ))
}

pub async fn delete_partition_member(
    State(state): State<AppState>,
    Path((name, xname)): Path<(String, String)>,
) -> Result<Json<MessageReply>, ApiError> {
    let id = parse_xname(&xname)?;
    state.store.remove_partition_member(&name, &id).await?;
    Ok(Json(MessageReply::deleted(1)))
}

// ── Memberships ───────────────────────────────────────────────────────────────

pub async fn list_memberships(
    State(state): State<AppState>,
) -> Result<Json<Vec<Membership>>, ApiError> {
    Ok(Json(state.store.get_memberships().await?))
}

pub async fn get_membership(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<Membership>, ApiError> {
    let id = parse_xname(&xname)?;
    Ok(Json(state.store.get_membership(&id).await?))
}
