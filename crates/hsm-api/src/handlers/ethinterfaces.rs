use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use hsm_domain::{CompEthInterface, IpAddressMapping, Xname};
use hsm_store::EthInterfaceFilter;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::query::QueryLists;
use crate::reply::{MessageReply, ResourceUri};
use crate::state::AppState;

fn filter_from(q: &QueryLists) -> Result<EthInterfaceFilter, ApiError> {
    let parse_time = |key: &str| -> Result<Option<chrono::DateTime<chrono::Utc>>, ApiError> {
        match q.first(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("bad {} timestamp '{}'", key, raw))),
        }
    };
    Ok(EthInterfaceFilter {
        mac_addr: q.list("macaddress"),
        ip_addr: q.list("ipaddress"),
        network: q.list("network"),
        component_id: q.list("componentid"),
        hms_type: q.list("type"),
        newer_than: parse_time("newerthan")?,
        older_than: parse_time("olderthan")?,
    })
}

pub async fn list(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<CompEthInterface>>, ApiError> {
    let q = QueryLists::from_pairs(pairs);
    let eis = state.store.get_eth_interfaces(&filter_from(&q)?).await?;
    Ok(Json(eis))
}

pub async fn post(
    State(state): State<AppState>,
    Json(ei): Json<CompEthInterface>,
) -> Result<(StatusCode, Json<ResourceUri>), ApiError> {
    if ei.mac_addr.is_empty() {
        return Err(ApiError::bad_request("missing MACAddress"));
    }
    let id = hsm_domain::mac_to_eth_interface_id(&ei.mac_addr)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.store.insert_eth_interface(ei).await?;
    Ok((
        StatusCode::CREATED,
        Json(ResourceUri { uri: format!("/hsm/v2/Inventory/EthernetInterfaces/{}", id) }),
    ))
}

pub async fn delete_all(State(state): State<AppState>) -> Result<Json<MessageReply>, ApiError> {
    let n = state.store.delete_eth_interfaces_all().await?;
    if n == 0 {
        return Err(ApiError::not_found("no ethernet interfaces to delete"));
    }
    Ok(Json(MessageReply::deleted(n)))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompEthInterface>, ApiError> {
    state
        .store
        .get_eth_interface(&id.to_ascii_lowercase())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("ethernet interface '{}' not found", id)))
}

#[derive(Debug, Deserialize)]
pub struct EthPatchBody {
    #[serde(rename = "Description", alias = "description")]
    pub description: Option<String>,
    #[serde(rename = "ComponentID", alias = "componentID", alias = "componentid")]
    pub component_id: Option<String>,
    #[serde(rename = "IPAddresses", alias = "ipAddresses")]
    pub ip_addresses: Option<Vec<IpAddressMapping>>,
}

pub async fn patch_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EthPatchBody>,
) -> Result<Json<CompEthInterface>, ApiError> {
    let component_id = body
        .component_id
        .as_deref()
        .map(Xname::parse)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let ei = state
        .store
        .patch_eth_interface(
            &id.to_ascii_lowercase(),
            body.description,
            component_id,
            body.ip_addresses,
        )
        .await?;
    Ok(Json(ei))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageReply>, ApiError> {
    state
        .store
        .delete_eth_interface(&id.to_ascii_lowercase())
        .await?;
    Ok(Json(MessageReply::deleted(1)))
}

// ── IP address subresource ────────────────────────────────────────────────────

pub async fn list_ips(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let ei = state
        .store
        .get_eth_interface(&id.to_ascii_lowercase())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("ethernet interface '{}' not found", id)))?;
    Ok(Json(json!(ei.ip_addresses)))
}

#[derive(Debug, Deserialize)]
pub struct IpBody {
    #[serde(rename = "IPAddress", alias = "ipAddress")]
    pub ip_address: Option<String>,
    #[serde(rename = "Network", alias = "network", default)]
    pub network: String,
}

pub async fn post_ip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<IpBody>,
) -> Result<(StatusCode, Json<ResourceUri>), ApiError> {
    let ip = body.ip_address.ok_or_else(|| ApiError::bad_request("missing IPAddress"))?;
    let eid = id.to_ascii_lowercase();
    state
        .store
        .add_eth_interface_ip(
            &eid,
            IpAddressMapping { ip_address: ip.clone(), network: body.network },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ResourceUri {
            uri: format!("/hsm/v2/Inventory/EthernetInterfaces/{}/IPAddresses/{}", eid, ip),
        }),
    ))
}

pub async fn patch_ip(
    State(state): State<AppState>,
    Path((id, ip)): Path<(String, String)>,
    Json(body): Json<IpBody>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .update_eth_interface_ip(&id.to_ascii_lowercase(), &ip, &body.network)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_ip(
    State(state): State<AppState>,
    Path((id, ip)): Path<(String, String)>,
) -> Result<Json<MessageReply>, ApiError> {
    state
        .store
        .delete_eth_interface_ip(&id.to_ascii_lowercase(), &ip)
        .await?;
    Ok(Json(MessageReply::deleted(1)))
}
