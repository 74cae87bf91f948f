use chrono::{DateTime, Utc};
use hsm_domain::{HsmError, ProcessingModel, Xname};
use serde::{Deserialize, Serialize};

// ── Request bodies ────────────────────────────────────────────────────────────

/// Body for the batch lock/unlock/disable/repair/status/remove operations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LockRequest {
    #[serde(rename = "ComponentIDs", default)]
    pub component_ids: Vec<String>,
    #[serde(rename = "ProcessingModel", default)]
    pub processing_model: Option<String>,
}

impl LockRequest {
    /// Parse xnames and the processing model; empty id lists are rejected.
    pub fn validate(&self) -> Result<(Vec<Xname>, ProcessingModel), HsmError> {
        if self.component_ids.is_empty() {
            return Err(HsmError::ArgMissing("ComponentIDs".to_string()));
        }
        let ids = self
            .component_ids
            .iter()
            .map(|s| Xname::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        let model = match &self.processing_model {
            Some(s) => ProcessingModel::parse(s)?,
            None => ProcessingModel::Rigid,
        };
        Ok((ids, model))
    }
}

/// Body for reservation creation; service reservations add a duration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationCreateRequest {
    #[serde(rename = "ComponentIDs", default)]
    pub component_ids: Vec<String>,
    #[serde(rename = "ProcessingModel", default)]
    pub processing_model: Option<String>,
    #[serde(rename = "ReservationDuration", default)]
    pub reservation_duration: Option<u32>,
}

/// Body for key-carrying operations (renew, release, check).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationKeyRequest {
    #[serde(rename = "ReservationKeys", default)]
    pub reservation_keys: Vec<KeyEntry>,
    #[serde(rename = "DeputyKeys", default)]
    pub deputy_keys: Vec<KeyEntry>,
    #[serde(rename = "ProcessingModel", default)]
    pub processing_model: Option<String>,
    #[serde(rename = "ReservationDuration", default)]
    pub reservation_duration: Option<u32>,
}

/// Keys arrive as `{ID, Key}` pairs; only the key authorizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyEntry {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Key")]
    pub key: String,
}

// ── Response bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counts {
    #[serde(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Success")]
    pub success: usize,
    #[serde(rename = "Failure")]
    pub failure: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailedComponent {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Reason")]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuccessIds {
    #[serde(rename = "ComponentIDs")]
    pub component_ids: Vec<String>,
}

/// Response for lock/unlock/disable/repair/release/remove.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockResponse {
    #[serde(rename = "Counts")]
    pub counts: Counts,
    #[serde(rename = "Success")]
    pub success: SuccessIds,
    #[serde(rename = "Failure")]
    pub failure: Vec<FailedComponent>,
}

impl LockResponse {
    pub fn from_batch(batch: hsm_store::BatchResult) -> LockResponse {
        let success: Vec<String> =
            batch.success.iter().map(|x| x.as_str().to_string()).collect();
        let failure: Vec<FailedComponent> = batch
            .failure
            .into_iter()
            .map(|(id, reason)| FailedComponent { id, reason: reason.to_string() })
            .collect();
        LockResponse {
            counts: Counts {
                total: success.len() + failure.len(),
                success: success.len(),
                failure: failure.len(),
            },
            success: SuccessIds { component_ids: success },
            failure,
        }
    }
}

/// One granted reservation as returned to the caller. The only place the
/// reservation key ever appears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationGrant {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "DeputyKey")]
    pub deputy_key: String,
    #[serde(rename = "ReservationKey")]
    pub reservation_key: String,
    #[serde(rename = "ExpirationTime", skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationCreateResponse {
    #[serde(rename = "Success")]
    pub success: Vec<ReservationGrant>,
    #[serde(rename = "Failure")]
    pub failure: Vec<FailedComponent>,
    #[serde(rename = "Counts")]
    pub counts: Counts,
}

/// Deputy-facing check response entry: no reservation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationCheckEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "DeputyKey")]
    pub deputy_key: String,
    #[serde(rename = "CreationTime")]
    pub creation_time: DateTime<Utc>,
    #[serde(rename = "ExpirationTime", skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationCheckResponse {
    #[serde(rename = "Success")]
    pub success: Vec<ReservationCheckEntry>,
    #[serde(rename = "Failure")]
    pub failure: Vec<FailedComponent>,
    #[serde(rename = "Counts")]
    pub counts: Counts,
}

/// `/locks/status` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockStatusResponse {
    #[serde(rename = "Components")]
    pub components: Vec<hsm_domain::ComponentLockState>,
    #[serde(rename = "NotFound", default, skip_serializing_if = "Vec::is_empty")]
    pub not_found: Vec<String>,
}
