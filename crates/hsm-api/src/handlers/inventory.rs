use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use hsm_domain::{
    ComponentEndpoint, HmsType, HwInvByFru, HwInvByLoc, HwInvHist, RedfishService,
    ServiceEndpoint, Xname,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::query::{hw_hist_filter, QueryLists};
use crate::reply::MessageReply;
use crate::state::AppState;

fn parse_xname(raw: &str) -> Result<Xname, ApiError> {
    Xname::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

fn parse_service(raw: &str) -> Result<RedfishService, ApiError> {
    RedfishService::parse(raw)
        .ok_or_else(|| ApiError::bad_request(format!("bad service '{}'", raw)))
}

// ── Component endpoints ───────────────────────────────────────────────────────

pub async fn list_comp_endpoints(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let q = QueryLists::from_pairs(pairs);
    let rf_id = match q.first("redfishendpointid") {
        Some(raw) => Some(parse_xname(raw)?),
        None => None,
    };
    let ces = state.store.get_comp_endpoints(rf_id.as_ref()).await?;
    Ok(Json(json!({ "ComponentEndpoints": ces })))
}

pub async fn get_comp_endpoint(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<ComponentEndpoint>, ApiError> {
    let id = parse_xname(&xname)?;
    state
        .store
        .get_comp_endpoint(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("component endpoint '{}' not found", id)))
}

pub async fn delete_comp_endpoint(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    let id = parse_xname(&xname)?;
    state.store.delete_comp_endpoint(&id).await?;
    Ok(Json(MessageReply::deleted(1)))
}

pub async fn delete_comp_endpoints(
    State(state): State<AppState>,
) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_comp_endpoints_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no component endpoints to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

// ── Service endpoints ─────────────────────────────────────────────────────────

pub async fn list_service_endpoints(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let ses = state.store.get_service_endpoints(None).await?;
    Ok(Json(json!({ "ServiceEndpoints": ses })))
}

pub async fn list_service_endpoints_for(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let svc = parse_service(&service)?;
    let ses = state.store.get_service_endpoints(Some(svc)).await?;
    Ok(Json(json!({ "ServiceEndpoints": ses })))
}

pub async fn get_service_endpoint(
    State(state): State<AppState>,
    Path((service, xname)): Path<(String, String)>,
) -> Result<Json<ServiceEndpoint>, ApiError> {
    let svc = parse_service(&service)?;
    let id = parse_xname(&xname)?;
    state
        .store
        .get_service_endpoint(svc, &id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found(format!("service endpoint '{}/{}' not found", svc, id))
        })
}

pub async fn delete_service_endpoint(
    State(state): State<AppState>,
    Path((service, xname)): Path<(String, String)>,
) -> Result<Json<MessageReply>, ApiError> {
    let svc = parse_service(&service)?;
    let id = parse_xname(&xname)?;
    state.store.delete_service_endpoint(svc, &id).await?;
    Ok(Json(MessageReply::deleted(1)))
}

pub async fn delete_service_endpoints(
    State(state): State<AppState>,
) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_service_endpoints_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no service endpoints to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

// ── Hardware inventory ────────────────────────────────────────────────────────

pub async fn list_hardware(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let locs = state.store.get_hw_locs().await?;
    Ok(Json(json!(locs)))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PostHardware {
    Wrapped {
        #[serde(rename = "Hardware", alias = "hardware")]
        hardware: Vec<HwInvByLoc>,
    },
    List(Vec<HwInvByLoc>),
}

pub async fn post_hardware(
    State(state): State<AppState>,
    Json(body): Json<PostHardware>,
) -> Result<StatusCode, ApiError> {
    let locs = match body {
        PostHardware::Wrapped { hardware } => hardware,
        PostHardware::List(list) => list,
    };
    if locs.is_empty() {
        return Err(ApiError::bad_request("missing Hardware"));
    }
    state.store.upsert_hw_locs(locs).await?;
    Ok(StatusCode::CREATED)
}

pub async fn delete_hardware_all(
    State(state): State<AppState>,
) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_hw_locs_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no hardware inventory to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

pub async fn get_hardware(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<HwInvByLoc>, ApiError> {
    let id = parse_xname(&xname)?;
    state
        .store
        .get_hw_loc(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("hardware '{}' not found", id)))
}

pub async fn delete_hardware(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    let id = parse_xname(&xname)?;
    state.store.delete_hw_loc(&id).await?;
    Ok(Json(MessageReply::deleted(1)))
}

/// Grouped system view: locations at/under the query root, bucketed by type
/// (`fullyflat`, the default) or nested under their parents (`hierarchical`).
pub async fn query_hardware(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let q = QueryLists::from_pairs(pairs);
    let format = q.first("format").unwrap_or("fullyflat");

    let locs = if xname.eq_ignore_ascii_case("all") || xname.eq_ignore_ascii_case("s0") {
        state.store.get_hw_locs().await?
    } else {
        let id = parse_xname(&xname)?;
        state.store.get_hw_locs_under(&id).await?
    };

    match format {
        _ if format.eq_ignore_ascii_case("fullyflat") => Ok(Json(flat_view(&xname, &locs))),
        _ if format.eq_ignore_ascii_case("hierarchical") => {
            Ok(Json(hierarchical_view(&xname, &locs)))
        }
        other => Err(ApiError::bad_request(format!("bad format '{}'", other))),
    }
}

fn type_bucket(t: HmsType) -> &'static str {
    match t {
        HmsType::Cabinet => "Cabinets",
        HmsType::Chassis => "Chassis",
        HmsType::ComputeModule => "ComputeModules",
        HmsType::RouterModule => "RouterModules",
        HmsType::NodeEnclosure => "NodeEnclosures",
        HmsType::HsnBoard => "HSNBoards",
        HmsType::Node => "Nodes",
        HmsType::Processor => "Processors",
        HmsType::NodeAccel => "NodeAccels",
        HmsType::Memory => "Memory",
        HmsType::Drive => "Drives",
        HmsType::CabinetPdu => "CabinetPDUs",
        HmsType::CabinetPduOutlet => "CabinetPDUOutlets",
        _ => "Other",
    }
}

fn flat_view(root: &str, locs: &[HwInvByLoc]) -> Value {
    let mut buckets: Map<String, Value> = Map::new();
    buckets.insert("XName".to_string(), json!(root));
    buckets.insert("Format".to_string(), json!("FullyFlat"));
    for loc in locs {
        let bucket = type_bucket(loc.hms_type);
        let entry = buckets.entry(bucket.to_string()).or_insert_with(|| json!([]));
        if let Value::Array(arr) = entry {
            arr.push(json!(loc));
        }
    }
    Value::Object(buckets)
}

fn hierarchical_view(root: &str, locs: &[HwInvByLoc]) -> Value {
    fn node_for(loc: &HwInvByLoc, all: &[HwInvByLoc]) -> Value {
        let children: Vec<Value> = all
            .iter()
            .filter(|c| c.id.parent().map_or(false, |p| p == loc.id))
            .map(|c| node_for(c, all))
            .collect();
        let mut v = json!(loc);
        if !children.is_empty() {
            v.as_object_mut()
                .expect("loc serializes to object")
                .insert("Children".to_string(), Value::Array(children));
        }
        v
    }
    // Roots: locations whose parent is not in the result set.
    let roots: Vec<Value> = locs
        .iter()
        .filter(|l| {
            l.id.parent()
                .map_or(true, |p| !locs.iter().any(|o| o.id == p))
        })
        .map(|l| node_for(l, locs))
        .collect();
    json!({ "XName": root, "Format": "Hierarchical", "Hardware": roots })
}

// ── Hardware by FRU ───────────────────────────────────────────────────────────

pub async fn list_frus(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let frus = state.store.get_hw_frus().await?;
    Ok(Json(json!(frus)))
}

pub async fn get_fru(
    State(state): State<AppState>,
    Path(fru_id): Path<String>,
) -> Result<Json<HwInvByFru>, ApiError> {
    state
        .store
        .get_hw_fru(&fru_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("FRU '{}' not found", fru_id)))
}

pub async fn delete_fru(
    State(state): State<AppState>,
    Path(fru_id): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    state.store.delete_hw_fru(&fru_id).await?;
    Ok(Json(MessageReply::deleted(1)))
}

pub async fn delete_frus(State(state): State<AppState>) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_hw_frus_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no FRUs to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

// ── Hardware history ──────────────────────────────────────────────────────────

/// History grouped per location id, the `{"Components": [{ID, History}]}` shape.
fn group_history(events: Vec<HwInvHist>, by_fru: bool) -> Value {
    let mut order: Vec<String> = Vec::new();
    let mut groups: Map<String, Value> = Map::new();
    for ev in events {
        let key = if by_fru { ev.fru_id.clone() } else { ev.id.to_string() };
        if !groups.contains_key(&key) {
            order.push(key.clone());
            groups.insert(key.clone(), json!([]));
        }
        if let Some(Value::Array(arr)) = groups.get_mut(&key) {
            arr.push(json!(ev));
        }
    }
    let components: Vec<Value> = order
        .into_iter()
        .map(|key| {
            let history = groups.remove(&key).unwrap_or_else(|| json!([]));
            if by_fru {
                json!({ "FRUID": key, "History": history })
            } else {
                json!({ "ID": key, "History": history })
            }
        })
        .collect();
    json!({ "Components": components })
}

pub async fn list_history(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let q = QueryLists::from_pairs(pairs);
    let filter = hw_hist_filter(&q)?;
    let events = state.store.get_hw_hist(&filter).await?;
    Ok(Json(group_history(events, false)))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(xname): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_xname(&xname)?;
    let q = QueryLists::from_pairs(pairs);
    let mut filter = hw_hist_filter(&q)?;
    filter.id = vec![id.to_string()];
    let events = state.store.get_hw_hist(&filter).await?;
    Ok(Json(group_history(events, false)))
}

pub async fn delete_history(
    State(state): State<AppState>,
    Path(xname): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    let id = parse_xname(&xname)?;
    let n = state.store.delete_hw_hist_for(&id).await?;
    Ok(Json(MessageReply::deleted(n)))
}

pub async fn delete_history_all(
    State(state): State<AppState>,
) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_hw_hist_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no history to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

pub async fn list_fru_history(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let q = QueryLists::from_pairs(pairs);
    let filter = hw_hist_filter(&q)?;
    let events = state.store.get_hw_hist(&filter).await?;
    Ok(Json(group_history(events, true)))
}

pub async fn get_fru_history(
    State(state): State<AppState>,
    Path(fru_id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let q = QueryLists::from_pairs(pairs);
    let mut filter = hw_hist_filter(&q)?;
    filter.fru_id = vec![fru_id];
    let events = state.store.get_hw_hist(&filter).await?;
    Ok(Json(group_history(events, true)))
}

pub async fn delete_fru_history(
    State(state): State<AppState>,
    Path(fru_id): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_hw_hist_for_fru(&fru_id).await?;
    Ok(Json(MessageReply::deleted(n)))
}
