use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HsmError;
use crate::xname::{HmsType, Xname};

// ── FRU identity ──────────────────────────────────────────────────────────────

/// Persistent identity fields read from Redfish for FRU-bearing hardware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FruIdentity {
    #[serde(rename = "Manufacturer", default, skip_serializing_if = "String::is_empty")]
    pub manufacturer: String,
    #[serde(rename = "Model", default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(rename = "PartNumber", default, skip_serializing_if = "String::is_empty")]
    pub part_number: String,
    #[serde(rename = "SerialNumber", default, skip_serializing_if = "String::is_empty")]
    pub serial_number: String,
    #[serde(rename = "SKU", default, skip_serializing_if = "String::is_empty")]
    pub sku: String,
}

/// Build a FRUID from the persistent identity triple:
/// `<Manufacturer>-<PartNumber>-<SerialNumber>`, uppercased, with internal
/// whitespace runs collapsed to single dashes. Any missing part means no
/// FRUID and therefore no FRU record for the location.
pub fn build_fru_id(identity: &FruIdentity) -> Option<String> {
    if identity.manufacturer.trim().is_empty()
        || identity.part_number.trim().is_empty()
        || identity.serial_number.trim().is_empty()
    {
        return None;
    }
    let squash = |s: &str| -> String {
        s.trim().split_whitespace().collect::<Vec<_>>().join("-").to_uppercase()
    };
    Some(format!(
        "{}-{}-{}",
        squash(&identity.manufacturer),
        squash(&identity.part_number),
        squash(&identity.serial_number)
    ))
}

// ── Hardware inventory, by FRU ────────────────────────────────────────────────

/// Per-type detail for a FRU record; the tag is `HWInventoryByFRUType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "HWInventoryByFRUType")]
pub enum HwFruInfo {
    #[serde(rename = "HWInvByFRUCabinet")]
    Cabinet {
        #[serde(rename = "CabinetFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUChassis")]
    Chassis {
        #[serde(rename = "ChassisFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUComputeModule")]
    ComputeModule {
        #[serde(rename = "ComputeModuleFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRURouterModule")]
    RouterModule {
        #[serde(rename = "RouterModuleFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUNodeEnclosure")]
    NodeEnclosure {
        #[serde(rename = "NodeEnclosureFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUHSNBoard")]
    HsnBoard {
        #[serde(rename = "HSNBoardFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUNode")]
    Node {
        #[serde(rename = "NodeFRUInfo")]
        info: NodeFruInfo,
    },
    #[serde(rename = "HWInvByFRUProcessor")]
    Processor {
        #[serde(rename = "ProcessorFRUInfo")]
        info: ProcessorFruInfo,
    },
    #[serde(rename = "HWInvByFRUMemory")]
    Memory {
        #[serde(rename = "MemoryFRUInfo")]
        info: MemoryFruInfo,
    },
    #[serde(rename = "HWInvByFRUDrive")]
    Drive {
        #[serde(rename = "DriveFRUInfo")]
        info: DriveFruInfo,
    },
    #[serde(rename = "HWInvByFRUNodeAccel")]
    NodeAccel {
        #[serde(rename = "NodeAccelFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUNodeHsnNic")]
    NodeHsnNic {
        #[serde(rename = "NodeHsnNicFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUPDU")]
    Pdu {
        #[serde(rename = "PDUFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUOutlet")]
    Outlet {
        #[serde(rename = "OutletFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUCMMRectifier")]
    CmmRectifier {
        #[serde(rename = "CMMRectifierFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUNodeEnclosurePowerSupply")]
    NodeEnclosurePowerSupply {
        #[serde(rename = "NodeEnclosurePowerSupplyFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUNodeBMC")]
    NodeBmc {
        #[serde(rename = "NodeBMCFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRURouterBMC")]
    RouterBmc {
        #[serde(rename = "RouterBMCFRUInfo")]
        info: FruIdentity,
    },
    #[serde(rename = "HWInvByFRUMgmtSwitch")]
    MgmtSwitch {
        #[serde(rename = "MgmtSwitchFRUInfo")]
        info: FruIdentity,
    },
}

impl HwFruInfo {
    /// The identity triple regardless of variant.
    pub fn identity(&self) -> &FruIdentity {
        match self {
            HwFruInfo::Cabinet { info } => info,
            HwFruInfo::Chassis { info } => info,
            HwFruInfo::ComputeModule { info } => info,
            HwFruInfo::RouterModule { info } => info,
            HwFruInfo::NodeEnclosure { info } => info,
            HwFruInfo::HsnBoard { info } => info,
            HwFruInfo::Node { info } => &info.identity,
            HwFruInfo::Processor { info } => &info.identity,
            HwFruInfo::Memory { info } => &info.identity,
            HwFruInfo::Drive { info } => &info.identity,
            HwFruInfo::NodeAccel { info } => info,
            HwFruInfo::NodeHsnNic { info } => info,
            HwFruInfo::Pdu { info } => info,
            HwFruInfo::Outlet { info } => info,
            HwFruInfo::CmmRectifier { info } => info,
            HwFruInfo::NodeEnclosurePowerSupply { info } => info,
            HwFruInfo::NodeBmc { info } => info,
            HwFruInfo::RouterBmc { info } => info,
            HwFruInfo::MgmtSwitch { info } => info,
        }
    }

    /// Wrap an identity in the variant matching the HMS type.
    pub fn for_type(hms_type: HmsType, identity: FruIdentity) -> Result<HwFruInfo, HsmError> {
        let info = identity;
        Ok(match hms_type {
            HmsType::Cabinet => HwFruInfo::Cabinet { info },
            HmsType::Chassis => HwFruInfo::Chassis { info },
            HmsType::ComputeModule => HwFruInfo::ComputeModule { info },
            HmsType::RouterModule => HwFruInfo::RouterModule { info },
            HmsType::NodeEnclosure => HwFruInfo::NodeEnclosure { info },
            HmsType::HsnBoard => HwFruInfo::HsnBoard { info },
            HmsType::Node => HwFruInfo::Node { info: NodeFruInfo { identity: info, ..Default::default() } },
            HmsType::Processor => {
                HwFruInfo::Processor { info: ProcessorFruInfo { identity: info, ..Default::default() } }
            }
            HmsType::Memory => {
                HwFruInfo::Memory { info: MemoryFruInfo { identity: info, ..Default::default() } }
            }
            HmsType::Drive => {
                HwFruInfo::Drive { info: DriveFruInfo { identity: info, ..Default::default() } }
            }
            HmsType::NodeAccel => HwFruInfo::NodeAccel { info },
            HmsType::NodeHsnNic => HwFruInfo::NodeHsnNic { info },
            HmsType::CabinetPdu => HwFruInfo::Pdu { info },
            HmsType::CabinetPduOutlet => HwFruInfo::Outlet { info },
            HmsType::CmmRectifier => HwFruInfo::CmmRectifier { info },
            HmsType::NodeEnclosurePowerSupply => HwFruInfo::NodeEnclosurePowerSupply { info },
            HmsType::NodeBmc => HwFruInfo::NodeBmc { info },
            HmsType::RouterBmc => HwFruInfo::RouterBmc { info },
            HmsType::MgmtSwitch => HwFruInfo::MgmtSwitch { info },
            other => return Err(HsmError::BadType(format!("no FRU variant for '{}'", other))),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFruInfo {
    #[serde(flatten)]
    pub identity: FruIdentity,
    #[serde(rename = "BiosVersion", default, skip_serializing_if = "String::is_empty")]
    pub bios_version: String,
    #[serde(rename = "SystemType", default, skip_serializing_if = "String::is_empty")]
    pub system_type: String,
    #[serde(rename = "UUID", default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorFruInfo {
    #[serde(flatten)]
    pub identity: FruIdentity,
    #[serde(rename = "ProcessorType", default, skip_serializing_if = "String::is_empty")]
    pub processor_type: String,
    #[serde(rename = "MaxSpeedMHz", default, skip_serializing_if = "Option::is_none")]
    pub max_speed_mhz: Option<u64>,
    #[serde(rename = "TotalCores", default, skip_serializing_if = "Option::is_none")]
    pub total_cores: Option<u32>,
    #[serde(rename = "TotalThreads", default, skip_serializing_if = "Option::is_none")]
    pub total_threads: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFruInfo {
    #[serde(flatten)]
    pub identity: FruIdentity,
    #[serde(rename = "MemoryType", default, skip_serializing_if = "String::is_empty")]
    pub memory_type: String,
    #[serde(rename = "CapacityMiB", default, skip_serializing_if = "Option::is_none")]
    pub capacity_mib: Option<u64>,
    #[serde(rename = "OperatingSpeedMhz", default, skip_serializing_if = "Option::is_none")]
    pub operating_speed_mhz: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveFruInfo {
    #[serde(flatten)]
    pub identity: FruIdentity,
    #[serde(rename = "CapacityBytes", default, skip_serializing_if = "Option::is_none")]
    pub capacity_bytes: Option<u64>,
    #[serde(rename = "MediaType", default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
}

/// A Field-Replaceable Unit, identified independently of where it sits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HwInvByFru {
    #[serde(rename = "FRUID")]
    pub fru_id: String,
    #[serde(rename = "Type")]
    pub hms_type: HmsType,
    #[serde(rename = "Subtype", default, skip_serializing_if = "String::is_empty")]
    pub subtype: String,
    #[serde(flatten)]
    pub info: HwFruInfo,
}

// ── Hardware inventory, by location ───────────────────────────────────────────

/// Per-type location detail; the tag is `HWInventoryByLocationType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "HWInventoryByLocationType")]
pub enum HwLocInfo {
    #[serde(rename = "HWInvByLocCabinet")]
    Cabinet {
        #[serde(rename = "CabinetLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocChassis")]
    Chassis {
        #[serde(rename = "ChassisLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocComputeModule")]
    ComputeModule {
        #[serde(rename = "ComputeModuleLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocRouterModule")]
    RouterModule {
        #[serde(rename = "RouterModuleLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocNodeEnclosure")]
    NodeEnclosure {
        #[serde(rename = "NodeEnclosureLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocHSNBoard")]
    HsnBoard {
        #[serde(rename = "HSNBoardLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocNode")]
    Node {
        #[serde(rename = "NodeLocationInfo")]
        info: NodeLocationInfo,
    },
    #[serde(rename = "HWInvByLocProcessor")]
    Processor {
        #[serde(rename = "ProcessorLocationInfo")]
        info: ProcessorLocationInfo,
    },
    #[serde(rename = "HWInvByLocMemory")]
    Memory {
        #[serde(rename = "MemoryLocationInfo")]
        info: MemoryLocationInfo,
    },
    #[serde(rename = "HWInvByLocDrive")]
    Drive {
        #[serde(rename = "DriveLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocNodeAccel")]
    NodeAccel {
        #[serde(rename = "NodeAccelLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocNodeHsnNic")]
    NodeHsnNic {
        #[serde(rename = "NodeHsnNicLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocPDU")]
    Pdu {
        #[serde(rename = "PDULocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocOutlet")]
    Outlet {
        #[serde(rename = "OutletLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocCMMRectifier")]
    CmmRectifier {
        #[serde(rename = "CMMRectifierLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocNodeEnclosurePowerSupply")]
    NodeEnclosurePowerSupply {
        #[serde(rename = "NodeEnclosurePowerSupplyLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocNodeBMC")]
    NodeBmc {
        #[serde(rename = "NodeBMCLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocRouterBMC")]
    RouterBmc {
        #[serde(rename = "RouterBMCLocationInfo")]
        info: StdLocationInfo,
    },
    #[serde(rename = "HWInvByLocMgmtSwitch")]
    MgmtSwitch {
        #[serde(rename = "MgmtSwitchLocationInfo")]
        info: StdLocationInfo,
    },
}

impl HwLocInfo {
    pub fn for_type(hms_type: HmsType, info: StdLocationInfo) -> Result<HwLocInfo, HsmError> {
        Ok(match hms_type {
            HmsType::Cabinet => HwLocInfo::Cabinet { info },
            HmsType::Chassis => HwLocInfo::Chassis { info },
            HmsType::ComputeModule => HwLocInfo::ComputeModule { info },
            HmsType::RouterModule => HwLocInfo::RouterModule { info },
            HmsType::NodeEnclosure => HwLocInfo::NodeEnclosure { info },
            HmsType::HsnBoard => HwLocInfo::HsnBoard { info },
            HmsType::Node => HwLocInfo::Node {
                info: NodeLocationInfo { base: info, ..Default::default() },
            },
            HmsType::Processor => HwLocInfo::Processor {
                info: ProcessorLocationInfo { base: info, socket: String::new() },
            },
            HmsType::Memory => HwLocInfo::Memory {
                info: MemoryLocationInfo { base: info, memory_location: None },
            },
            HmsType::Drive => HwLocInfo::Drive { info },
            HmsType::NodeAccel => HwLocInfo::NodeAccel { info },
            HmsType::NodeHsnNic => HwLocInfo::NodeHsnNic { info },
            HmsType::CabinetPdu => HwLocInfo::Pdu { info },
            HmsType::CabinetPduOutlet => HwLocInfo::Outlet { info },
            HmsType::CmmRectifier => HwLocInfo::CmmRectifier { info },
            HmsType::NodeEnclosurePowerSupply => HwLocInfo::NodeEnclosurePowerSupply { info },
            HmsType::NodeBmc => HwLocInfo::NodeBmc { info },
            HmsType::RouterBmc => HwLocInfo::RouterBmc { info },
            HmsType::MgmtSwitch => HwLocInfo::MgmtSwitch { info },
            other => return Err(HsmError::BadType(format!("no location variant for '{}'", other))),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StdLocationInfo {
    #[serde(rename = "Id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "Hostname", default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeLocationInfo {
    #[serde(flatten)]
    pub base: StdLocationInfo,
    #[serde(rename = "ProcessorSummary", default, skip_serializing_if = "Option::is_none")]
    pub processor_summary: Option<ProcessorSummary>,
    #[serde(rename = "MemorySummary", default, skip_serializing_if = "Option::is_none")]
    pub memory_summary: Option<MemorySummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSummary {
    #[serde(rename = "Count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(rename = "Model", default, skip_serializing_if = "String::is_empty")]
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    #[serde(rename = "TotalSystemMemoryGiB", default, skip_serializing_if = "Option::is_none")]
    pub total_system_memory_gib: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorLocationInfo {
    #[serde(flatten)]
    pub base: StdLocationInfo,
    #[serde(rename = "Socket", default, skip_serializing_if = "String::is_empty")]
    pub socket: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryLocationInfo {
    #[serde(flatten)]
    pub base: StdLocationInfo,
    #[serde(rename = "MemoryLocation", default, skip_serializing_if = "Option::is_none")]
    pub memory_location: Option<MemoryLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryLocation {
    #[serde(rename = "Socket", default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<u32>,
    #[serde(rename = "MemoryController", default, skip_serializing_if = "Option::is_none")]
    pub memory_controller: Option<u32>,
    #[serde(rename = "Channel", default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
    #[serde(rename = "Slot", default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u32>,
}

/// One physical location and, when occupied, the FRU sitting in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HwInvByLoc {
    #[serde(rename = "ID")]
    pub id: Xname,
    #[serde(rename = "Type")]
    pub hms_type: HmsType,
    #[serde(rename = "Ordinal")]
    pub ordinal: u32,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(flatten)]
    pub info: HwLocInfo,
    #[serde(rename = "PopulatedFRU", default, skip_serializing_if = "Option::is_none")]
    pub populated_fru: Option<HwInvByFru>,
}

impl HwInvByLoc {
    pub const STATUS_POPULATED: &'static str = "Populated";
    pub const STATUS_EMPTY: &'static str = "Empty";

    /// The populated-FRU invariant: a non-Empty location with a FRUID carries
    /// exactly one PopulatedFRU; an Empty location carries none.
    pub fn verify(&self) -> Result<(), HsmError> {
        if self.id.hms_type() != self.hms_type {
            return Err(HsmError::BadType(format!(
                "Type '{}' does not match xname '{}'",
                self.hms_type, self.id
            )));
        }
        // A populated location may lack a FRU (identity fields missing from
        // Redfish); an empty one may never carry one.
        match (&self.populated_fru, self.status.as_str()) {
            (Some(_), Self::STATUS_EMPTY) => Err(HsmError::BadType(format!(
                "empty location '{}' carries a FRU",
                self.id
            ))),
            _ => Ok(()),
        }
    }

    pub fn fru_id(&self) -> Option<&str> {
        self.populated_fru.as_ref().map(|f| f.fru_id.as_str())
    }
}

// ── Hardware inventory history ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HwInvHistEventType {
    Added,
    Removed,
    Scanned,
    Detected,
}

impl HwInvHistEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HwInvHistEventType::Added => "Added",
            HwInvHistEventType::Removed => "Removed",
            HwInvHistEventType::Scanned => "Scanned",
            HwInvHistEventType::Detected => "Detected",
        }
    }

    pub fn parse(s: &str) -> Option<HwInvHistEventType> {
        [
            HwInvHistEventType::Added,
            HwInvHistEventType::Removed,
            HwInvHistEventType::Scanned,
            HwInvHistEventType::Detected,
        ]
        .into_iter()
        .find(|v| v.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for HwInvHistEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of a FRU sighting at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HwInvHist {
    #[serde(rename = "ID")]
    pub id: Xname,
    #[serde(rename = "FRUID")]
    pub fru_id: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "EventType")]
    pub event_type: HwInvHistEventType,
}

// ── Component ethernet interfaces ─────────────────────────────────────────────

/// Derive the CompEthInterface ID from a MAC: separators stripped, lowercased.
pub fn mac_to_eth_interface_id(mac: &str) -> Result<String, HsmError> {
    let id: String = mac
        .chars()
        .filter(|c| *c != ':' && *c != '-' && *c != '.')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if id.len() != 12 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HsmError::BadId(format!("MAC address '{}'", mac)));
    }
    Ok(id)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpAddressMapping {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    #[serde(rename = "Network", default, skip_serializing_if = "String::is_empty")]
    pub network: String,
}

/// A MAC-keyed ethernet interface record, optionally bound to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompEthInterface {
    /// Derived from the MAC on insert; clients may omit it.
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "MACAddress")]
    pub mac_addr: String,
    #[serde(rename = "LastUpdate", default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(rename = "ComponentID", default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<Xname>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub hms_type: Option<HmsType>,
    #[serde(rename = "IPAddresses", default)]
    pub ip_addresses: Vec<IpAddressMapping>,
}

impl CompEthInterface {
    /// Build a record from a MAC, deriving (and validating) the ID.
    pub fn from_mac(mac: &str) -> Result<CompEthInterface, HsmError> {
        Ok(CompEthInterface {
            id: mac_to_eth_interface_id(mac)?,
            description: String::new(),
            mac_addr: mac.to_string(),
            last_update: None,
            component_id: None,
            hms_type: None,
            ip_addresses: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fru_id_requires_all_three_parts() {
        let full = FruIdentity {
            manufacturer: "Cray Inc".to_string(),
            part_number: "102095000".to_string(),
            serial_number: "HC19460226".to_string(),
            ..Default::default()
        };
        assert_eq!(build_fru_id(&full).unwrap(), "CRAY-INC-102095000-HC19460226");

        let missing = FruIdentity { serial_number: String::new(), ..full };
        assert!(build_fru_id(&missing).is_none());
    }

    #[test]
    fn fru_id_collapses_whitespace() {
        let id = FruIdentity {
            manufacturer: "  Intel   Corporation ".to_string(),
            part_number: "E5 2680".to_string(),
            serial_number: "abc123".to_string(),
            ..Default::default()
        };
        assert_eq!(build_fru_id(&id).unwrap(), "INTEL-CORPORATION-E5-2680-ABC123");
    }

    #[test]
    fn loc_verify_populated_fru_invariant() {
        let fru = HwInvByFru {
            fru_id: "X-Y-Z".to_string(),
            hms_type: HmsType::Node,
            subtype: String::new(),
            info: HwFruInfo::for_type(HmsType::Node, FruIdentity::default()).unwrap(),
        };
        let mut loc = HwInvByLoc {
            id: Xname::parse("x0c0s0b0n0").unwrap(),
            hms_type: HmsType::Node,
            ordinal: 0,
            status: HwInvByLoc::STATUS_POPULATED.to_string(),
            info: HwLocInfo::for_type(HmsType::Node, StdLocationInfo::default()).unwrap(),
            populated_fru: Some(fru),
        };
        assert!(loc.verify().is_ok());

        loc.status = HwInvByLoc::STATUS_EMPTY.to_string();
        assert!(loc.verify().is_err());

        // Populated without a FRU is legal: identity fields may be missing.
        loc.status = HwInvByLoc::STATUS_POPULATED.to_string();
        loc.populated_fru = None;
        assert!(loc.verify().is_ok());
    }

    #[test]
    fn loc_serde_tags() {
        let loc = HwInvByLoc {
            id: Xname::parse("x0c0s0b0n0p1").unwrap(),
            hms_type: HmsType::Processor,
            ordinal: 1,
            status: HwInvByLoc::STATUS_EMPTY.to_string(),
            info: HwLocInfo::Processor {
                info: ProcessorLocationInfo {
                    base: StdLocationInfo { id: "CPU1".to_string(), ..Default::default() },
                    socket: "CPU 1".to_string(),
                },
            },
            populated_fru: None,
        };
        let v = serde_json::to_value(&loc).unwrap();
        assert_eq!(v["HWInventoryByLocationType"], "HWInvByLocProcessor");
        assert_eq!(v["ProcessorLocationInfo"]["Socket"], "CPU 1");
        let back: HwInvByLoc = serde_json::from_value(v).unwrap();
        assert_eq!(back, loc);
    }

    #[test]
    fn mac_id_derivation() {
        assert_eq!(mac_to_eth_interface_id("A4:BF:01:2E:7F:AA").unwrap(), "a4bf012e7faa");
        assert_eq!(mac_to_eth_interface_id("a4-bf-01-2e-7f-aa").unwrap(), "a4bf012e7faa");
        assert!(mac_to_eth_interface_id("a4:bf:01").is_err());
        assert!(mac_to_eth_interface_id("zz:bf:01:2e:7f:aa").is_err());
    }
}
