use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HsmError;
use crate::xname::{HmsType, Xname};

// ── Endpoint discovery status ─────────────────────────────────────────────────

/// Per-endpoint (and per-subcomponent) outcome of the most recent discovery
/// attempt. Persisted verbatim in `DiscoveryInfo.LastStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndpointStatus {
    #[default]
    NotYetQueried,
    DiscoverOK,
    RedfishSubtypeNoSupport,
    EndpointTypeNotSupported,
    EndpointNotEnabled,
    #[serde(rename = "HTTPsGetFailed")]
    HttpsGetFailed,
    #[serde(rename = "EPResponseFailedDecode")]
    EpResponseFailedDecode,
    UnexpectedErrorPreStore,
    StoreFailed,
    DiscoverFailed,
    ChildVerificationFailed,
    /// Set while a discovery task holds the endpoint's discovery slot.
    DiscoveryStarted,
}

impl EndpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointStatus::NotYetQueried => "NotYetQueried",
            EndpointStatus::DiscoverOK => "DiscoverOK",
            EndpointStatus::RedfishSubtypeNoSupport => "RedfishSubtypeNoSupport",
            EndpointStatus::EndpointTypeNotSupported => "EndpointTypeNotSupported",
            EndpointStatus::EndpointNotEnabled => "EndpointNotEnabled",
            EndpointStatus::HttpsGetFailed => "HTTPsGetFailed",
            EndpointStatus::EpResponseFailedDecode => "EPResponseFailedDecode",
            EndpointStatus::UnexpectedErrorPreStore => "UnexpectedErrorPreStore",
            EndpointStatus::StoreFailed => "StoreFailed",
            EndpointStatus::DiscoverFailed => "DiscoverFailed",
            EndpointStatus::ChildVerificationFailed => "ChildVerificationFailed",
            EndpointStatus::DiscoveryStarted => "DiscoveryStarted",
        }
    }

    /// Whether a discovery task currently owns this endpoint.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, EndpointStatus::DiscoveryStarted)
    }
}

impl std::fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discovery bookkeeping attached to every RedfishEndpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    #[serde(rename = "LastAttempt", skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(rename = "LastDiscovery", skip_serializing_if = "Option::is_none")]
    pub last_discovery: Option<DateTime<Utc>>,
    #[serde(rename = "LastStatus", default)]
    pub last_status: EndpointStatus,
}

// ── RedfishEndpoint ───────────────────────────────────────────────────────────

/// One manageable controller (BMC, PDU controller, switch controller).
///
/// The `password` field is write-only: it is accepted on POST/PUT, handed to
/// the credential vault, and blanked before any store write or read response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedfishEndpoint {
    #[serde(rename = "ID")]
    pub id: Xname,
    #[serde(rename = "Type")]
    pub hms_type: HmsType,
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "Hostname", default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(rename = "Domain", default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(rename = "FQDN", default, skip_serializing_if = "String::is_empty")]
    pub fqdn: String,
    #[serde(rename = "Enabled", default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "UUID", default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(rename = "User", default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(rename = "Password", default)]
    pub password: String,
    #[serde(rename = "MACAddr", default, skip_serializing_if = "String::is_empty")]
    pub mac_addr: String,
    #[serde(rename = "IPAddress", default, skip_serializing_if = "String::is_empty")]
    pub ip_addr: String,
    #[serde(rename = "RediscoverOnUpdate", default)]
    pub rediscover_on_update: bool,
    #[serde(rename = "DiscoveryInfo", default)]
    pub discovery_info: DiscoveryInfo,
}

fn default_true() -> bool {
    true
}

impl RedfishEndpoint {
    /// Normalize and validate a freshly posted endpoint: the xname must spell
    /// a controller type, `Type` must agree, and an FQDN is synthesized from
    /// hostname+domain when absent (and vice versa).
    pub fn normalize(&mut self) -> Result<(), HsmError> {
        let t = self.id.hms_type();
        if !t.is_controller() {
            return Err(HsmError::BadType(format!(
                "xname '{}' is not a Redfish endpoint type",
                self.id
            )));
        }
        self.hms_type = t;
        if self.fqdn.is_empty() {
            if self.hostname.is_empty() {
                return Err(HsmError::ArgMissing("Hostname or FQDN".to_string()));
            }
            self.fqdn = if self.domain.is_empty() {
                self.hostname.clone()
            } else {
                format!("{}.{}", self.hostname, self.domain)
            };
        } else if self.hostname.is_empty() {
            match self.fqdn.split_once('.') {
                Some((host, dom)) => {
                    self.hostname = host.to_string();
                    self.domain = dom.to_string();
                }
                None => self.hostname = self.fqdn.clone(),
            }
        }
        Ok(())
    }

    /// Copy with the password blanked, for read responses and store writes.
    pub fn scrubbed(&self) -> RedfishEndpoint {
        let mut ep = self.clone();
        ep.password = String::new();
        ep
    }
}

// ── ComponentEndpoint ─────────────────────────────────────────────────────────

/// Per-type Redfish detail carried by a ComponentEndpoint. Exactly one
/// variant per record; the tag is the wire field `ComponentEndpointType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ComponentEndpointType")]
pub enum ComponentEndpointInfo {
    Chassis {
        #[serde(rename = "RedfishChassisInfo")]
        info: RedfishChassisInfo,
    },
    System {
        #[serde(rename = "RedfishSystemInfo")]
        info: RedfishSystemInfo,
    },
    Manager {
        #[serde(rename = "RedfishManagerInfo")]
        info: RedfishManagerInfo,
    },
    #[serde(rename = "PDU")]
    Pdu {
        #[serde(rename = "RedfishPDUInfo")]
        info: RedfishPduInfo,
    },
    Outlet {
        #[serde(rename = "RedfishOutletInfo")]
        info: RedfishOutletInfo,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedfishChassisInfo {
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "Actions", default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedfishSystemInfo {
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "Actions", default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Value>,
    #[serde(rename = "EthernetNICInfo", default, skip_serializing_if = "Vec::is_empty")]
    pub ethernet_nics: Vec<EthernetNicInfo>,
    #[serde(rename = "PowerURL", default, skip_serializing_if = "String::is_empty")]
    pub power_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedfishManagerInfo {
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "Actions", default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Value>,
    #[serde(rename = "EthernetNICInfo", default, skip_serializing_if = "Vec::is_empty")]
    pub ethernet_nics: Vec<EthernetNicInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedfishPduInfo {
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedfishOutletInfo {
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// One NIC as reported by the controller, kept for MAC↔component mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EthernetNicInfo {
    #[serde(rename = "RedfishId", default, skip_serializing_if = "String::is_empty")]
    pub redfish_id: String,
    #[serde(rename = "@odata.id", default, skip_serializing_if = "String::is_empty")]
    pub odata_id: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "MACAddress", default, skip_serializing_if = "String::is_empty")]
    pub mac_address: String,
    #[serde(rename = "PermanentMACAddress", default, skip_serializing_if = "String::is_empty")]
    pub permanent_mac_address: String,
}

/// The HMS-level view of one Redfish resource under a RedfishEndpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEndpoint {
    #[serde(rename = "ID")]
    pub id: Xname,
    #[serde(rename = "Type")]
    pub hms_type: HmsType,
    #[serde(rename = "RedfishType")]
    pub redfish_type: String,
    #[serde(rename = "RedfishSubtype", default, skip_serializing_if = "String::is_empty")]
    pub redfish_subtype: String,
    #[serde(rename = "MACAddr", default, skip_serializing_if = "String::is_empty")]
    pub mac_addr: String,
    #[serde(rename = "UUID", default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(rename = "OdataID")]
    pub odata_id: String,
    #[serde(rename = "RedfishEndpointID")]
    pub rf_endpoint_id: Xname,
    #[serde(rename = "RedfishEndpointFQDN", default, skip_serializing_if = "String::is_empty")]
    pub rf_endpoint_fqdn: String,
    #[serde(rename = "RedfishURL", default, skip_serializing_if = "String::is_empty")]
    pub redfish_url: String,
    #[serde(flatten)]
    pub info: ComponentEndpointInfo,
}

// ── ServiceEndpoint ───────────────────────────────────────────────────────────

/// Redfish services advertised by a controller's service root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedfishService {
    AccountService,
    SessionService,
    EventService,
    TaskService,
    UpdateService,
}

impl RedfishService {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedfishService::AccountService => "AccountService",
            RedfishService::SessionService => "SessionService",
            RedfishService::EventService => "EventService",
            RedfishService::TaskService => "TaskService",
            RedfishService::UpdateService => "UpdateService",
        }
    }

    pub fn parse(s: &str) -> Option<RedfishService> {
        [
            RedfishService::AccountService,
            RedfishService::SessionService,
            RedfishService::EventService,
            RedfishService::TaskService,
            RedfishService::UpdateService,
        ]
        .into_iter()
        .find(|v| v.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for RedfishService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    #[serde(rename = "RedfishEndpointID")]
    pub rf_endpoint_id: Xname,
    #[serde(rename = "RedfishType")]
    pub service: RedfishService,
    #[serde(rename = "RedfishSubtype", default, skip_serializing_if = "String::is_empty")]
    pub redfish_subtype: String,
    #[serde(rename = "UUID", default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(rename = "OdataID")]
    pub odata_id: String,
    #[serde(rename = "RedfishEndpointFQDN", default, skip_serializing_if = "String::is_empty")]
    pub rf_endpoint_fqdn: String,
    /// Raw Redfish service description, passed through untouched.
    #[serde(rename = "ServiceInfo", default, skip_serializing_if = "Option::is_none")]
    pub service_info: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalize_synthesizes_fqdn() {
        let mut ep: RedfishEndpoint = serde_json::from_value(serde_json::json!({
            "ID": "x0c0s14b0",
            "Type": "NodeBMC",
            "Hostname": "bmc14",
            "Domain": "example.net",
            "User": "root",
            "Password": "s3cret",
        }))
        .unwrap();
        ep.normalize().unwrap();
        assert_eq!(ep.fqdn, "bmc14.example.net");
        assert!(ep.enabled, "Enabled defaults true");
    }

    #[test]
    fn endpoint_normalize_splits_fqdn() {
        let mut ep: RedfishEndpoint = serde_json::from_value(serde_json::json!({
            "ID": "x0c0s14b0",
            "Type": "NodeBMC",
            "FQDN": "10.10.255.11",
        }))
        .unwrap();
        ep.normalize().unwrap();
        assert_eq!(ep.hostname, "10");
        // An IP FQDN splits oddly but remains usable; real deployments use
        // hostnames. The FQDN itself is what discovery dials.
        assert_eq!(ep.fqdn, "10.10.255.11");
    }

    #[test]
    fn endpoint_rejects_non_controller_xname() {
        let mut ep: RedfishEndpoint = serde_json::from_value(serde_json::json!({
            "ID": "x0c0s14b0n0",
            "Type": "Node",
            "FQDN": "foo",
        }))
        .unwrap();
        assert!(ep.normalize().is_err());
    }

    #[test]
    fn scrubbed_clears_password_only() {
        let mut ep: RedfishEndpoint = serde_json::from_value(serde_json::json!({
            "ID": "x0c0s14b0",
            "Type": "NodeBMC",
            "FQDN": "bmc",
            "User": "root",
            "Password": "hunter2",
        }))
        .unwrap();
        ep.normalize().unwrap();
        let s = ep.scrubbed();
        assert_eq!(s.password, "");
        assert_eq!(s.user, "root");
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["Password"], "");
    }

    #[test]
    fn component_endpoint_tag_round_trips() {
        let ce = ComponentEndpoint {
            id: Xname::parse("x0c0s14b0n0").unwrap(),
            hms_type: HmsType::Node,
            redfish_type: "ComputerSystem".to_string(),
            redfish_subtype: "Physical".to_string(),
            mac_addr: "a4:bf:01:2e:7f:aa".to_string(),
            uuid: String::new(),
            odata_id: "/redfish/v1/Systems/Node0".to_string(),
            rf_endpoint_id: Xname::parse("x0c0s14b0").unwrap(),
            rf_endpoint_fqdn: "bmc14".to_string(),
            redfish_url: "bmc14/redfish/v1/Systems/Node0".to_string(),
            info: ComponentEndpointInfo::System {
                info: RedfishSystemInfo { name: "Node0".to_string(), ..Default::default() },
            },
        };
        let v = serde_json::to_value(&ce).unwrap();
        assert_eq!(v["ComponentEndpointType"], "System");
        assert!(v.get("RedfishSystemInfo").is_some());
        let back: ComponentEndpoint = serde_json::from_value(v).unwrap();
        assert_eq!(back, ce);
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_value(EndpointStatus::HttpsGetFailed).unwrap(),
            serde_json::json!("HTTPsGetFailed")
        );
        assert_eq!(
            serde_json::to_value(EndpointStatus::EpResponseFailedDecode).unwrap(),
            serde_json::json!("EPResponseFailedDecode")
        );
    }
}
