use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HsmError;
use crate::xname::Xname;

// ── Processing model ──────────────────────────────────────────────────────────

/// How a batch lock/reservation operation treats per-element failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessingModel {
    /// The whole batch fails if any element fails; nothing is applied.
    #[default]
    Rigid,
    /// Per-element: successes apply, failures are reported alongside.
    Flexible,
}

impl ProcessingModel {
    pub fn parse(s: &str) -> Result<ProcessingModel, HsmError> {
        match s {
            _ if s.eq_ignore_ascii_case("rigid") => Ok(ProcessingModel::Rigid),
            _ if s.eq_ignore_ascii_case("flexible") => Ok(ProcessingModel::Flexible),
            _ => Err(HsmError::LockBadProcessingModel(s.to_string())),
        }
    }
}

// ── Reservation duration ──────────────────────────────────────────────────────

/// Admissible service-reservation duration, minutes.
pub const RESERVATION_DURATION_MIN: u32 = 1;
pub const RESERVATION_DURATION_MAX: u32 = 15;

/// Validate a requested duration and convert to a `Duration`.
pub fn verify_reservation_duration(minutes: u32) -> Result<Duration, HsmError> {
    if !(RESERVATION_DURATION_MIN..=RESERVATION_DURATION_MAX).contains(&minutes) {
        return Err(HsmError::LockBadDuration(minutes));
    }
    Ok(Duration::minutes(minutes as i64))
}

// ── Reservation ───────────────────────────────────────────────────────────────

/// An active reservation on one component. At most one exists per component.
///
/// The reservation key authorizes mutation (renew, release); the deputy key
/// authorizes read-only visibility (check). Both are opaque tokens compared
/// by equality; the embedded xname is for debuggability only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(rename = "ID")]
    pub component_id: Xname,
    #[serde(rename = "DeputyKey")]
    pub deputy_key: String,
    #[serde(rename = "ReservationKey")]
    pub reservation_key: String,
    #[serde(rename = "CreationTime")]
    pub create_timestamp: DateTime<Utc>,
    #[serde(rename = "ExpirationTime", default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_timestamp.map_or(false, |exp| exp < now)
    }
}

/// The deputy-facing view: everything except the reservation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationCheck {
    #[serde(rename = "ID")]
    pub component_id: Xname,
    #[serde(rename = "DeputyKey")]
    pub deputy_key: String,
    #[serde(rename = "CreationTime")]
    pub create_timestamp: DateTime<Utc>,
    #[serde(rename = "ExpirationTime", default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<DateTime<Utc>>,
}

impl From<&Reservation> for ReservationCheck {
    fn from(r: &Reservation) -> Self {
        ReservationCheck {
            component_id: r.component_id.clone(),
            deputy_key: r.deputy_key.clone(),
            create_timestamp: r.create_timestamp,
            expiration_timestamp: r.expiration_timestamp,
        }
    }
}

// ── Batch failure reasons ─────────────────────────────────────────────────────

/// Per-element failure reason reported in a batch operation's `Failure` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailReason {
    NotFound,
    Locked,
    Unlocked,
    Disabled,
    Enabled,
    Reserved,
    NotReserved,
    ExpirationTimeRequired,
    ServerError,
}

impl FailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailReason::NotFound => "NotFound",
            FailReason::Locked => "Locked",
            FailReason::Unlocked => "Unlocked",
            FailReason::Disabled => "Disabled",
            FailReason::Enabled => "Enabled",
            FailReason::Reserved => "Reserved",
            FailReason::NotReserved => "NotReserved",
            FailReason::ExpirationTimeRequired => "ExpirationTimeRequired",
            FailReason::ServerError => "ServerError",
        }
    }
}

impl std::fmt::Display for FailReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Lock state ────────────────────────────────────────────────────────────────

/// The admin-facing lock status of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentLockState {
    #[serde(rename = "ID")]
    pub id: Xname,
    #[serde(rename = "Locked")]
    pub locked: bool,
    #[serde(rename = "Reserved")]
    pub reserved: bool,
    #[serde(rename = "ReservationDisabled")]
    pub reservation_disabled: bool,
    #[serde(rename = "ExpirationTime", default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_model_parse() {
        assert_eq!(ProcessingModel::parse("rigid").unwrap(), ProcessingModel::Rigid);
        assert_eq!(ProcessingModel::parse("Flexible").unwrap(), ProcessingModel::Flexible);
        assert!(ProcessingModel::parse("squishy").is_err());
    }

    #[test]
    fn duration_bounds() {
        assert!(verify_reservation_duration(0).is_err());
        assert!(verify_reservation_duration(1).is_ok());
        assert!(verify_reservation_duration(15).is_ok());
        assert!(verify_reservation_duration(16).is_err());
    }

    #[test]
    fn expiry() {
        let now = Utc::now();
        let res = Reservation {
            component_id: Xname::parse("x0c0s0b0n0").unwrap(),
            deputy_key: "dk".to_string(),
            reservation_key: "rk".to_string(),
            create_timestamp: now,
            expiration_timestamp: Some(now + Duration::minutes(1)),
        };
        assert!(!res.is_expired(now));
        assert!(res.is_expired(now + Duration::minutes(2)));

        let indefinite = Reservation { expiration_timestamp: None, ..res };
        assert!(!indefinite.is_expired(now + Duration::days(365)));
    }

    #[test]
    fn check_view_hides_reservation_key() {
        let res = Reservation {
            component_id: Xname::parse("x0c0s0b0n0").unwrap(),
            deputy_key: "x0c0s0b0n0:dk:aaaa".to_string(),
            reservation_key: "x0c0s0b0n0:rk:bbbb".to_string(),
            create_timestamp: Utc::now(),
            expiration_timestamp: None,
        };
        let check = ReservationCheck::from(&res);
        let v = serde_json::to_value(&check).unwrap();
        assert!(v.get("ReservationKey").is_none());
        assert_eq!(v["DeputyKey"], "x0c0s0b0n0:dk:aaaa");
    }
}
