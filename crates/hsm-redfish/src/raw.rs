//! Raw Redfish payload shapes: only the fields discovery consumes, with
//! everything optional. Unrecognized structure is retrieved separately via
//! `RedfishClient::get_raw` when passthrough is wanted.

use hsm_domain::FruIdentity;
use serde::Deserialize;
use serde_json::Value;

/// `{"@odata.id": "..."}` navigation stub.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OdataRef {
    #[serde(rename = "@odata.id", default)]
    pub odata_id: String,
}

/// A Redfish resource collection: `Members` of odata refs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceCollection {
    #[serde(rename = "Members", default)]
    pub members: Vec<OdataRef>,
    #[serde(rename = "Members@odata.count", default)]
    pub member_count: Option<u64>,
}

/// Common `Status` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceStatus {
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "Health", default)]
    pub health: Option<String>,
}

impl ResourceStatus {
    /// Redfish `Absent` means the slot exists but nothing is in it.
    pub fn is_absent(&self) -> bool {
        self.state.as_deref() == Some("Absent")
    }
}

/// `/redfish/v1` service root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceRoot {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "RedfishVersion", default)]
    pub redfish_version: String,
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    #[serde(rename = "Chassis", default)]
    pub chassis: Option<OdataRef>,
    #[serde(rename = "Systems", default)]
    pub systems: Option<OdataRef>,
    #[serde(rename = "Managers", default)]
    pub managers: Option<OdataRef>,
    #[serde(rename = "PowerEquipment", default)]
    pub power_equipment: Option<OdataRef>,
    #[serde(rename = "AccountService", default)]
    pub account_service: Option<OdataRef>,
    #[serde(rename = "SessionService", default)]
    pub session_service: Option<OdataRef>,
    #[serde(rename = "EventService", default)]
    pub event_service: Option<OdataRef>,
    #[serde(rename = "TaskService", default)]
    pub task_service: Option<OdataRef>,
    #[serde(rename = "UpdateService", default)]
    pub update_service: Option<OdataRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawChassis {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "ChassisType", default)]
    pub chassis_type: String,
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    #[serde(rename = "Status", default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub identity: FruIdentity,
    #[serde(rename = "Actions", default)]
    pub actions: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawComputerSystem {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "SystemType", default)]
    pub system_type: String,
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    #[serde(rename = "BiosVersion", default)]
    pub bios_version: String,
    #[serde(rename = "PowerState", default)]
    pub power_state: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub identity: FruIdentity,
    #[serde(rename = "ProcessorSummary", default)]
    pub processor_summary: Option<RawProcessorSummary>,
    #[serde(rename = "MemorySummary", default)]
    pub memory_summary: Option<RawMemorySummary>,
    #[serde(rename = "Processors", default)]
    pub processors: Option<OdataRef>,
    #[serde(rename = "Memory", default)]
    pub memory: Option<OdataRef>,
    #[serde(rename = "Storage", default)]
    pub storage: Option<OdataRef>,
    #[serde(rename = "EthernetInterfaces", default)]
    pub ethernet_interfaces: Option<OdataRef>,
    #[serde(rename = "NetworkAdapters", default)]
    pub network_adapters: Option<OdataRef>,
    #[serde(rename = "Actions", default)]
    pub actions: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProcessorSummary {
    #[serde(rename = "Count", default)]
    pub count: Option<u32>,
    #[serde(rename = "Model", default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMemorySummary {
    #[serde(rename = "TotalSystemMemoryGiB", default)]
    pub total_system_memory_gib: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawManager {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "ManagerType", default)]
    pub manager_type: String,
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    #[serde(rename = "Status", default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub identity: FruIdentity,
    #[serde(rename = "EthernetInterfaces", default)]
    pub ethernet_interfaces: Option<OdataRef>,
    #[serde(rename = "Actions", default)]
    pub actions: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPowerEquipment {
    #[serde(rename = "RackPDUs", default)]
    pub rack_pdus: Option<OdataRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPowerDistribution {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "EquipmentType", default)]
    pub equipment_type: String,
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    #[serde(rename = "Status", default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub identity: FruIdentity,
    #[serde(rename = "Outlets", default)]
    pub outlets: Option<OdataRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOutlet {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "OutletType", default)]
    pub outlet_type: String,
    #[serde(rename = "PowerState", default)]
    pub power_state: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub identity: FruIdentity,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProcessor {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Socket", default)]
    pub socket: String,
    #[serde(rename = "ProcessorType", default)]
    pub processor_type: String,
    #[serde(rename = "MaxSpeedMHz", default)]
    pub max_speed_mhz: Option<u64>,
    #[serde(rename = "TotalCores", default)]
    pub total_cores: Option<u32>,
    #[serde(rename = "TotalThreads", default)]
    pub total_threads: Option<u32>,
    #[serde(rename = "Status", default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub identity: FruIdentity,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMemory {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "MemoryDeviceType", default)]
    pub memory_device_type: String,
    #[serde(rename = "CapacityMiB", default)]
    pub capacity_mib: Option<u64>,
    #[serde(rename = "OperatingSpeedMhz", default)]
    pub operating_speed_mhz: Option<u64>,
    #[serde(rename = "MemoryLocation", default)]
    pub memory_location: Option<RawMemoryLocation>,
    #[serde(rename = "Status", default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub identity: FruIdentity,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMemoryLocation {
    #[serde(rename = "Socket", default)]
    pub socket: Option<u32>,
    #[serde(rename = "MemoryController", default)]
    pub memory_controller: Option<u32>,
    #[serde(rename = "Channel", default)]
    pub channel: Option<u32>,
    #[serde(rename = "Slot", default)]
    pub slot: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStorage {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Drives", default)]
    pub drives: Vec<OdataRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDrive {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "MediaType", default)]
    pub media_type: String,
    #[serde(rename = "CapacityBytes", default)]
    pub capacity_bytes: Option<u64>,
    #[serde(rename = "Status", default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub identity: FruIdentity,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNetworkAdapter {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Status", default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub identity: FruIdentity,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEthernetInterface {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "MACAddress", default)]
    pub mac_address: String,
    #[serde(rename = "PermanentMACAddress", default)]
    pub permanent_mac_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_root_decodes_minimal_payload() {
        let root: ServiceRoot = serde_json::from_value(serde_json::json!({
            "Id": "RootService",
            "RedfishVersion": "1.7.0",
            "Chassis": { "@odata.id": "/redfish/v1/Chassis" },
            "Systems": { "@odata.id": "/redfish/v1/Systems" },
        }))
        .unwrap();
        assert_eq!(root.chassis.unwrap().odata_id, "/redfish/v1/Chassis");
        assert!(root.managers.is_none());
    }

    #[test]
    fn system_flattens_fru_identity() {
        let sys: RawComputerSystem = serde_json::from_value(serde_json::json!({
            "Id": "Node0",
            "Manufacturer": "Cray Inc",
            "PartNumber": "102095000",
            "SerialNumber": "HC19460226",
            "PowerState": "On",
            "Status": { "State": "Enabled" },
        }))
        .unwrap();
        assert_eq!(sys.identity.manufacturer, "Cray Inc");
        assert_eq!(sys.power_state.as_deref(), Some("On"));
        assert!(!sys.status.is_absent());
    }

    #[test]
    fn absent_status() {
        let st: ResourceStatus =
            serde_json::from_value(serde_json::json!({ "State": "Absent" })).unwrap();
        assert!(st.is_absent());
    }
}
