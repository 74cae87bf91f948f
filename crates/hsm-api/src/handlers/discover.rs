use axum::extract::{Path, State};
use axum::Json;
use hsm_domain::{DiscoveryStatus, Xname};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::reply::ResourceUri;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DiscoverBody {
    #[serde(rename = "xnames", alias = "Xnames", default)]
    pub xnames: Vec<String>,
    #[serde(rename = "force", alias = "Force", default)]
    pub force: bool,
}

/// Kick a discovery run in the background and point the caller at its
/// status resource.
pub async fn post_discover(
    State(state): State<AppState>,
    body: Option<Json<DiscoverBody>>,
) -> Result<Json<Vec<ResourceUri>>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let ids = body
        .xnames
        .iter()
        .map(|s| Xname::parse(s).map_err(|e| ApiError::bad_request(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    // Validate the named endpoints exist before detaching the run.
    for id in &ids {
        if state.store.get_rf_endpoint(id).await?.is_none() {
            return Err(ApiError::not_found(format!("endpoint '{}' not found", id)));
        }
    }

    let status_id = 0;
    let discovery = state.discovery.clone();
    let force = body.force;
    tokio::spawn(async move {
        if let Err(e) = discovery.discover_from_endpoints(&ids, status_id, false, force).await {
            warn!(error = %e, "discovery run failed");
        }
    });

    Ok(Json(vec![ResourceUri {
        uri: format!("/hsm/v2/Inventory/DiscoveryStatus/{}", status_id),
    }]))
}

pub async fn list_status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let statuses = state.store.get_discovery_statuses().await?;
    Ok(Json(json!({ "DiscoveryStatus": statuses })))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<DiscoveryStatus>, ApiError> {
    state
        .store
        .get_discovery_status(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("discovery status {} not found", id)))
}
