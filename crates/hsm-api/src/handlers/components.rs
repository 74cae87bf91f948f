use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use hsm_domain::{Component, ComponentFlag, ComponentState, HsmError, Xname};
use hsm_store::ComponentFilter;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::query::{component_filter, QueryLists};
use crate::reply::MessageReply;
use crate::state::AppState;

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Apply the stateonly/flagonly/roleonly/nidonly projection to one record.
fn project(c: &Component, q: &QueryLists) -> Value {
    if q.flag("stateonly") {
        json!({ "ID": c.id, "Type": c.hms_type, "State": c.state, "Flag": c.flag })
    } else if q.flag("flagonly") {
        json!({ "ID": c.id, "Type": c.hms_type, "Flag": c.flag })
    } else if q.flag("roleonly") {
        json!({ "ID": c.id, "Type": c.hms_type, "Role": c.role, "SubRole": c.sub_role })
    } else if q.flag("nidonly") {
        json!({ "ID": c.id, "Type": c.hms_type, "NID": c.nid })
    } else {
        json!(c)
    }
}

fn render(components: &[Component], q: &QueryLists) -> Value {
    json!({ "Components": components.iter().map(|c| project(c, q)).collect::<Vec<_>>() })
}

fn parse_xname(raw: &str) -> Result<Xname, ApiError> {
    Xname::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

// ── Collection ────────────────────────────────────────────────────────────────

pub async fn list(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let q = QueryLists::from_pairs(pairs);
    let filter = component_filter(&q);
    let comps = state.store.get_components(&filter).await?;
    Ok(Json(render(&comps, &q)))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PostComponents {
    Wrapped {
        #[serde(rename = "Components", alias = "components")]
        components: Vec<Component>,
    },
    Single(Component),
}

pub async fn post(
    State(state): State<AppState>,
    Json(body): Json<PostComponents>,
) -> Result<StatusCode, ApiError> {
    let comps = match body {
        PostComponents::Wrapped { components } => components,
        PostComponents::Single(c) => vec![c],
    };
    if comps.is_empty() {
        return Err(ApiError::bad_request("missing Components"));
    }
    let changes = state.store.upsert_components(comps).await?;
    state.scn.enqueue_changes(&changes).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all(State(state): State<AppState>) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_components_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no components to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

// ── Single resource ───────────────────────────────────────────────────────────

pub async fn get_one(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<Component>, ApiError> {
    let id = parse_xname(&xname)?;
    let c = state
        .store
        .get_component(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("component '{}' not found", id)))?;
    Ok(Json(c))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    let id = parse_xname(&xname)?;
    state.store.delete_component(&id).await?;
    Ok(Json(MessageReply::deleted(1)))
}

// ── Single-component PATCH ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StateDataBody {
    #[serde(rename = "State", alias = "state")]
    pub state: Option<String>,
    #[serde(rename = "Flag", alias = "flag")]
    pub flag: Option<String>,
    #[serde(rename = "Force", alias = "force", default)]
    pub force: bool,
}

pub async fn patch_state_data(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Json(body): Json<StateDataBody>,
) -> Result<StatusCode, ApiError> {
    let id = parse_xname(&xname)?;
    let new_state: ComponentState = body
        .state
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("missing State"))?
        .parse()
        .map_err(|e: HsmError| ApiError::bad_request(e.to_string()))?;
    let flag = body
        .flag
        .as_deref()
        .map(|f| f.parse::<ComponentFlag>())
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let changes = state
        .store
        .update_component_state(std::slice::from_ref(&id), new_state, flag, body.force)
        .await?;
    state.scn.enqueue_changes(&changes).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct FlagOnlyBody {
    #[serde(rename = "Flag", alias = "flag")]
    pub flag: Option<String>,
}

pub async fn patch_flag_only(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Json(body): Json<FlagOnlyBody>,
) -> Result<StatusCode, ApiError> {
    let id = parse_xname(&xname)?;
    let flag: ComponentFlag = body
        .flag
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("missing Flag"))?
        .parse()
        .map_err(|e: HsmError| ApiError::bad_request(e.to_string()))?;
    let changes = state
        .store
        .update_component_flag(std::slice::from_ref(&id), flag)
        .await?;
    state.scn.enqueue_changes(&changes).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    #[serde(rename = "Role", alias = "role")]
    pub role: Option<String>,
    #[serde(rename = "SubRole", alias = "subRole", alias = "subrole")]
    pub sub_role: Option<String>,
}

pub async fn patch_role(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Json(body): Json<RoleBody>,
) -> Result<StatusCode, ApiError> {
    let id = parse_xname(&xname)?;
    let role = body.role.as_deref().ok_or_else(|| ApiError::bad_request("missing Role"))?;
    let changes = state
        .store
        .update_component_role(std::slice::from_ref(&id), role, body.sub_role.as_deref())
        .await?;
    state.scn.enqueue_changes(&changes).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct NidBody {
    #[serde(rename = "NID", alias = "nid")]
    pub nid: Option<i64>,
}

pub async fn patch_nid(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Json(body): Json<NidBody>,
) -> Result<StatusCode, ApiError> {
    let id = parse_xname(&xname)?;
    let nid = body.nid.ok_or_else(|| ApiError::bad_request("missing NID"))?;
    state.store.update_component_nid(&id, nid).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Bulk PATCH ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BulkBody {
    #[serde(rename = "ComponentIDs", alias = "componentIDs", default)]
    pub component_ids: Vec<String>,
    #[serde(rename = "State", alias = "state")]
    pub state: Option<String>,
    #[serde(rename = "Flag", alias = "flag")]
    pub flag: Option<String>,
    #[serde(rename = "Enabled", alias = "enabled")]
    pub enabled: Option<bool>,
    #[serde(rename = "SoftwareStatus", alias = "softwareStatus")]
    pub software_status: Option<String>,
    #[serde(rename = "Role", alias = "role")]
    pub role: Option<String>,
    #[serde(rename = "SubRole", alias = "subRole")]
    pub sub_role: Option<String>,
    #[serde(rename = "Force", alias = "force", default)]
    pub force: bool,
}

impl BulkBody {
    fn ids(&self) -> Result<Vec<Xname>, ApiError> {
        if self.component_ids.is_empty() {
            return Err(ApiError::bad_request("missing ComponentIDs"));
        }
        self.component_ids
            .iter()
            .map(|s| parse_xname(s))
            .collect()
    }
}

pub async fn bulk_state_data(
    State(state): State<AppState>,
    Json(body): Json<BulkBody>,
) -> Result<StatusCode, ApiError> {
    let ids = body.ids()?;
    let new_state: ComponentState = body
        .state
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("missing State"))?
        .parse()
        .map_err(|e: HsmError| ApiError::bad_request(e.to_string()))?;
    let flag = body
        .flag
        .as_deref()
        .map(|f| f.parse::<ComponentFlag>())
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let changes = state
        .store
        .update_component_state(&ids, new_state, flag, body.force)
        .await?;
    state.scn.enqueue_changes(&changes).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_flag_only(
    State(state): State<AppState>,
    Json(body): Json<BulkBody>,
) -> Result<StatusCode, ApiError> {
    let ids = body.ids()?;
    let flag: ComponentFlag = body
        .flag
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("missing Flag"))?
        .parse()
        .map_err(|e: HsmError| ApiError::bad_request(e.to_string()))?;
    let changes = state.store.update_component_flag(&ids, flag).await?;
    state.scn.enqueue_changes(&changes).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_enabled(
    State(state): State<AppState>,
    Json(body): Json<BulkBody>,
) -> Result<StatusCode, ApiError> {
    let ids = body.ids()?;
    let enabled = body.enabled.ok_or_else(|| ApiError::bad_request("missing Enabled"))?;
    let changes = state.store.update_component_enabled(&ids, enabled).await?;
    state.scn.enqueue_changes(&changes).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_software_status(
    State(state): State<AppState>,
    Json(body): Json<BulkBody>,
) -> Result<StatusCode, ApiError> {
    let ids = body.ids()?;
    let sw = body
        .software_status
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("missing SoftwareStatus"))?;
    let changes = state.store.update_component_software_status(&ids, sw).await?;
    state.scn.enqueue_changes(&changes).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_role(
    State(state): State<AppState>,
    Json(body): Json<BulkBody>,
) -> Result<StatusCode, ApiError> {
    let ids = body.ids()?;
    let role = body.role.as_deref().ok_or_else(|| ApiError::bad_request("missing Role"))?;
    let changes = state
        .store
        .update_component_role(&ids, role, body.sub_role.as_deref())
        .await?;
    state.scn.enqueue_changes(&changes).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct BulkNidBody {
    #[serde(rename = "Components", alias = "components", default)]
    pub components: Vec<NidEntry>,
}

#[derive(Debug, Deserialize)]
pub struct NidEntry {
    #[serde(rename = "ID", alias = "id")]
    pub id: String,
    #[serde(rename = "NID", alias = "nid")]
    pub nid: i64,
}

pub async fn bulk_nid(
    State(state): State<AppState>,
    Json(body): Json<BulkNidBody>,
) -> Result<StatusCode, ApiError> {
    if body.components.is_empty() {
        return Err(ApiError::bad_request("missing Components"));
    }
    for entry in &body.components {
        let id = parse_xname(&entry.id)?;
        state.store.update_component_nid(&id, entry.nid).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── NID lookup ────────────────────────────────────────────────────────────────

pub async fn get_by_nid(
    State(state): State<AppState>,
    Path(nid): Path<String>,
) -> Result<Json<Component>, ApiError> {
    let _: i64 = nid
        .parse()
        .map_err(|_| ApiError::bad_request(format!("bad NID '{}'", nid)))?;
    let filter = ComponentFilter { nid: vec![nid.clone()], ..Default::default() };
    let comps = state.store.get_components(&filter).await?;
    comps
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no component with NID {}", nid)))
}

#[derive(Debug, Deserialize)]
pub struct NidQueryBody {
    #[serde(rename = "NIDRanges", alias = "nidRanges", default)]
    pub nid_ranges: Vec<String>,
}

pub async fn query_by_nid(
    State(state): State<AppState>,
    Json(body): Json<NidQueryBody>,
) -> Result<Json<Value>, ApiError> {
    if body.nid_ranges.is_empty() {
        return Err(ApiError::bad_request("missing NIDRanges"));
    }
    let mut filter = ComponentFilter::default();
    for range in &body.nid_ranges {
        match range.split_once('-') {
            Some((lo, hi)) => {
                filter.nid_start.push(lo.trim().to_string());
                filter.nid_end.push(hi.trim().to_string());
            }
            None => filter.nid.push(range.trim().to_string()),
        }
    }
    let comps = state.store.get_components(&filter).await?;
    Ok(Json(render(&comps, &QueryLists::default())))
}

// ── Subtree query ─────────────────────────────────────────────────────────────

async fn subtree(state: &AppState, roots: &[Xname], q: &QueryLists) -> Result<Value, ApiError> {
    let filter = component_filter(q);
    let all = state.store.get_components(&filter).await?;
    let selected: Vec<Component> = all
        .into_iter()
        .filter(|c| roots.iter().any(|r| c.id == *r || c.id.is_child_of(r)))
        .collect();
    Ok(render(&selected, q))
}

pub async fn query_one(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_xname(&xname)?;
    let q = QueryLists::from_pairs(pairs);
    Ok(Json(subtree(&state, std::slice::from_ref(&id), &q).await?))
}

#[derive(Debug, Deserialize)]
pub struct ComponentQueryBody {
    #[serde(rename = "ComponentIDs", alias = "componentIDs", default)]
    pub component_ids: Vec<String>,
}

pub async fn query_post(
    State(state): State<AppState>,
    Json(body): Json<ComponentQueryBody>,
) -> Result<Json<Value>, ApiError> {
    if body.component_ids.is_empty() {
        return Err(ApiError::bad_request("missing ComponentIDs"));
    }
    let roots = body
        .component_ids
        .iter()
        .map(|s| parse_xname(s))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(subtree(&state, &roots, &QueryLists::default()).await?))
}
