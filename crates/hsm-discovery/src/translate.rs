use std::collections::HashMap;

use hsm_domain::{
    CompEthInterface, Component, ComponentEndpoint, ComponentEndpointInfo, ComponentState,
    DriveFruInfo, FruIdentity, HmsType, HwFruInfo, HwInvByFru, HwInvByLoc, HwLocInfo,
    MemoryFruInfo, MemoryLocationInfo, MemorySummary, NodeFruInfo, NodeLocationInfo, NodeMap,
    ProcessorFruInfo, ProcessorLocationInfo, ProcessorSummary, RedfishChassisInfo,
    RedfishEndpoint, RedfishManagerInfo, RedfishOutletInfo, RedfishPduInfo, RedfishSystemInfo,
    ServiceEndpoint, Xname,
};
use hsm_redfish::{DiscoveredComponent, RedfishEndpointTree, RfResourceKind};
use tracing::debug;

/// The five store slices built from one endpoint's discovery tree.
#[derive(Debug, Default)]
pub struct EntitySlices {
    pub comp_endpoints: Vec<ComponentEndpoint>,
    pub components: Vec<Component>,
    pub hw_locs: Vec<HwInvByLoc>,
    pub service_endpoints: Vec<ServiceEndpoint>,
    pub eth_interfaces: Vec<CompEthInterface>,
}

/// Translate the adapter's intermediate records into store entities.
///
/// Per-item argument problems (a subtype with no HMS mapping, a garbled MAC)
/// skip the item and keep the batch; one bad DIMM record must not lose a
/// whole endpoint.
pub fn build_entities(
    tree: &RedfishEndpointTree,
    ep: &RedfishEndpoint,
    node_maps: &HashMap<Xname, NodeMap>,
) -> EntitySlices {
    let mut out = EntitySlices::default();

    for dc in &tree.components {
        if dc.last_status != hsm_domain::EndpointStatus::DiscoverOK {
            debug!(xname = %dc.xname, status = %dc.last_status, "skipping failed subcomponent");
            continue;
        }

        if let Some(ce) = build_comp_endpoint(dc, ep) {
            // NIC records ride on the endpoint's components.
            for nic in &dc.ethernet_nics {
                let mac = if nic.permanent_mac_address.is_empty() {
                    &nic.mac_address
                } else {
                    &nic.permanent_mac_address
                };
                match CompEthInterface::from_mac(mac) {
                    Ok(mut ei) => {
                        ei.description = nic.description.clone();
                        ei.component_id = Some(dc.xname.clone());
                        ei.hms_type = Some(dc.hms_type);
                        out.eth_interfaces.push(ei);
                    }
                    Err(e) => debug!(xname = %dc.xname, error = %e, "skipping unusable NIC MAC"),
                }
            }
            out.comp_endpoints.push(ce);
        }

        out.components.push(build_component(dc, node_maps));

        match build_hw_loc(dc) {
            Ok(loc) => out.hw_locs.push(loc),
            Err(e) => debug!(xname = %dc.xname, error = %e, "skipping inventory item"),
        }
    }

    // The controller's own management MAC.
    if !ep.mac_addr.is_empty() {
        match CompEthInterface::from_mac(&ep.mac_addr) {
            Ok(mut ei) => {
                ei.description = "BMC management interface".to_string();
                ei.component_id = Some(ep.id.clone());
                ei.hms_type = Some(ep.hms_type);
                if !ep.ip_addr.is_empty() {
                    ei.ip_addresses.push(hsm_domain::IpAddressMapping {
                        ip_address: ep.ip_addr.clone(),
                        network: String::new(),
                    });
                }
                out.eth_interfaces.push(ei);
            }
            Err(e) => debug!(endpoint = %ep.id, error = %e, "endpoint MAC unusable"),
        }
    }

    for svc in &tree.services {
        out.service_endpoints.push(ServiceEndpoint {
            rf_endpoint_id: ep.id.clone(),
            service: svc.service,
            redfish_subtype: String::new(),
            uuid: tree.uuid.clone(),
            odata_id: svc.odata_id.clone(),
            rf_endpoint_fqdn: ep.fqdn.clone(),
            service_info: svc.raw.clone(),
        });
    }

    out
}

fn build_comp_endpoint(dc: &DiscoveredComponent, ep: &RedfishEndpoint) -> Option<ComponentEndpoint> {
    let info = match dc.kind {
        RfResourceKind::Chassis => ComponentEndpointInfo::Chassis {
            info: RedfishChassisInfo {
                name: dc.location_info.name.clone(),
                actions: dc.actions.clone(),
            },
        },
        RfResourceKind::System => ComponentEndpointInfo::System {
            info: RedfishSystemInfo {
                name: dc.location_info.name.clone(),
                actions: dc.actions.clone(),
                ethernet_nics: dc.ethernet_nics.clone(),
                power_url: String::new(),
            },
        },
        RfResourceKind::Manager => ComponentEndpointInfo::Manager {
            info: RedfishManagerInfo {
                name: dc.location_info.name.clone(),
                actions: dc.actions.clone(),
                ethernet_nics: dc.ethernet_nics.clone(),
            },
        },
        RfResourceKind::Pdu => ComponentEndpointInfo::Pdu {
            info: RedfishPduInfo { name: dc.location_info.name.clone() },
        },
        RfResourceKind::Outlet => ComponentEndpointInfo::Outlet {
            info: RedfishOutletInfo { name: dc.location_info.name.clone() },
        },
        // Subcomponents surface in inventory, not as endpoints.
        _ => return None,
    };
    let mac = dc
        .ethernet_nics
        .first()
        .map(|n| {
            if n.permanent_mac_address.is_empty() {
                n.mac_address.clone()
            } else {
                n.permanent_mac_address.clone()
            }
        })
        .unwrap_or_default();
    Some(ComponentEndpoint {
        id: dc.xname.clone(),
        hms_type: dc.hms_type,
        redfish_type: dc.redfish_type.clone(),
        redfish_subtype: dc.redfish_subtype.clone(),
        mac_addr: mac,
        uuid: dc.uuid.clone(),
        odata_id: dc.odata_id.clone(),
        rf_endpoint_id: ep.id.clone(),
        rf_endpoint_fqdn: ep.fqdn.clone(),
        redfish_url: format!("{}{}", ep.fqdn, dc.odata_id),
        info,
    })
}

fn build_component(dc: &DiscoveredComponent, node_maps: &HashMap<Xname, NodeMap>) -> Component {
    let state = if !dc.populated {
        ComponentState::Empty
    } else {
        match dc.hms_type {
            HmsType::Node | HmsType::CabinetPduOutlet => {
                match dc.power_state.as_deref() {
                    Some("On") => ComponentState::On,
                    Some(_) => ComponentState::Off,
                    None => ComponentState::Unknown,
                }
            }
            _ => ComponentState::Populated,
        }
    };
    let mut c = Component::new(dc.xname.clone(), state);
    c.subtype = if dc.redfish_subtype.is_empty() { None } else { Some(dc.redfish_subtype.clone()) };
    if dc.hms_type == HmsType::Node {
        c.net_type = Some(hsm_domain::NetType::Sling);
        c.arch = Some(hsm_domain::ComponentArch::UNKNOWN);
        if let Some(map) = node_maps.get(&dc.xname) {
            c.nid = Some(map.nid);
            c.role = map.role.clone();
            c.sub_role = map.sub_role.clone();
        }
    }
    c
}

fn build_hw_loc(dc: &DiscoveredComponent) -> Result<HwInvByLoc, hsm_domain::HsmError> {
    let info = match dc.hms_type {
        HmsType::Node => HwLocInfo::Node {
            info: NodeLocationInfo {
                base: dc.location_info.clone(),
                processor_summary: dc.detail.processor_count.map(|count| ProcessorSummary {
                    count: Some(count),
                    model: dc.detail.processor_model.clone(),
                }),
                memory_summary: dc
                    .detail
                    .memory_gib
                    .map(|gib| MemorySummary { total_system_memory_gib: Some(gib) }),
            },
        },
        HmsType::Processor | HmsType::NodeAccel if dc.kind == RfResourceKind::Processor => {
            if dc.hms_type == HmsType::NodeAccel {
                HwLocInfo::for_type(dc.hms_type, dc.location_info.clone())?
            } else {
                HwLocInfo::Processor {
                    info: ProcessorLocationInfo {
                        base: dc.location_info.clone(),
                        socket: dc.location_info.id.clone(),
                    },
                }
            }
        }
        HmsType::Memory => HwLocInfo::Memory {
            info: MemoryLocationInfo {
                base: dc.location_info.clone(),
                memory_location: dc.detail.memory_location.clone(),
            },
        },
        other => HwLocInfo::for_type(other, dc.location_info.clone())?,
    };

    let populated_fru = match (&dc.fru_id, dc.populated) {
        (Some(fru_id), true) => Some(HwInvByFru {
            fru_id: fru_id.clone(),
            hms_type: dc.hms_type,
            subtype: dc.redfish_subtype.clone(),
            info: build_fru_info(dc)?,
        }),
        _ => None,
    };

    Ok(HwInvByLoc {
        id: dc.xname.clone(),
        hms_type: dc.hms_type,
        ordinal: dc.ordinal,
        status: if populated_fru.is_some() || dc.populated {
            HwInvByLoc::STATUS_POPULATED.to_string()
        } else {
            HwInvByLoc::STATUS_EMPTY.to_string()
        },
        info,
        populated_fru,
    })
}

fn build_fru_info(dc: &DiscoveredComponent) -> Result<HwFruInfo, hsm_domain::HsmError> {
    let identity: FruIdentity = dc.fru_identity.clone();
    Ok(match dc.hms_type {
        HmsType::Node => HwFruInfo::Node {
            info: NodeFruInfo {
                identity,
                bios_version: dc.detail.bios_version.clone(),
                system_type: dc.detail.system_type.clone(),
                uuid: dc.uuid.clone(),
            },
        },
        HmsType::Processor => HwFruInfo::Processor {
            info: ProcessorFruInfo {
                identity,
                processor_type: dc.detail.processor_type.clone(),
                max_speed_mhz: dc.detail.max_speed_mhz,
                total_cores: dc.detail.total_cores,
                total_threads: dc.detail.total_threads,
            },
        },
        HmsType::Memory => HwFruInfo::Memory {
            info: MemoryFruInfo {
                identity,
                memory_type: dc.detail.memory_type.clone(),
                capacity_mib: dc.detail.capacity_mib,
                operating_speed_mhz: dc.detail.operating_speed_mhz,
            },
        },
        HmsType::Drive => HwFruInfo::Drive {
            info: DriveFruInfo {
                identity,
                capacity_bytes: dc.detail.capacity_bytes,
                media_type: dc.detail.media_type.clone(),
            },
        },
        other => HwFruInfo::for_type(other, identity)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_domain::EndpointStatus;
    use hsm_redfish::{ComponentDetail, RedfishEpDescription};

    fn endpoint() -> RedfishEndpoint {
        let mut ep: RedfishEndpoint = serde_json::from_value(serde_json::json!({
            "ID": "x0c0s14b0",
            "Type": "NodeBMC",
            "FQDN": "bmc14.local",
            "MACAddr": "a4:bf:01:2e:7f:00",
        }))
        .unwrap();
        ep.normalize().unwrap();
        ep
    }

    fn node_component(xname: &str, power: &str, fru: Option<&str>) -> DiscoveredComponent {
        DiscoveredComponent {
            xname: Xname::parse(xname).unwrap(),
            hms_type: HmsType::Node,
            kind: RfResourceKind::System,
            last_status: EndpointStatus::DiscoverOK,
            redfish_id: "Node0".to_string(),
            redfish_type: "ComputerSystem".to_string(),
            redfish_subtype: "Physical".to_string(),
            odata_id: "/redfish/v1/Systems/Node0".to_string(),
            ordinal: 0,
            populated: true,
            power_state: Some(power.to_string()),
            uuid: String::new(),
            location_info: Default::default(),
            fru_identity: Default::default(),
            fru_id: fru.map(|s| s.to_string()),
            ethernet_nics: vec![hsm_domain::EthernetNicInfo {
                redfish_id: "1".to_string(),
                odata_id: "/redfish/v1/Systems/Node0/EthernetInterfaces/1".to_string(),
                description: String::new(),
                mac_address: "a4:bf:01:2e:7f:aa".to_string(),
                permanent_mac_address: String::new(),
            }],
            actions: None,
            detail: ComponentDetail::default(),
        }
    }

    fn tree_with(components: Vec<DiscoveredComponent>) -> RedfishEndpointTree {
        RedfishEndpointTree {
            endpoint: RedfishEpDescription {
                id: Xname::parse("x0c0s14b0").unwrap(),
                hms_type: HmsType::NodeBmc,
                fqdn: "bmc14.local".to_string(),
                enabled: true,
            },
            last_status: EndpointStatus::DiscoverOK,
            redfish_version: "1.7.0".to_string(),
            uuid: String::new(),
            services: Vec::new(),
            components,
        }
    }

    #[test]
    fn node_translates_to_all_slices() {
        let tree = tree_with(vec![node_component("x0c0s14b0n0", "On", Some("CRAY-1-SN1"))]);
        let slices = build_entities(&tree, &endpoint(), &HashMap::new());

        assert_eq!(slices.comp_endpoints.len(), 1);
        assert_eq!(slices.components.len(), 1);
        assert_eq!(slices.components[0].state, ComponentState::On);
        assert_eq!(slices.hw_locs.len(), 1);
        assert!(slices.hw_locs[0].populated_fru.is_some());
        // One NIC from the system plus the BMC management MAC.
        assert_eq!(slices.eth_interfaces.len(), 2);
    }

    #[test]
    fn node_map_seeds_nid_and_role() {
        let tree = tree_with(vec![node_component("x0c0s14b0n0", "Off", None)]);
        let mut maps = HashMap::new();
        maps.insert(
            Xname::parse("x0c0s14b0n0").unwrap(),
            NodeMap {
                id: Xname::parse("x0c0s14b0n0").unwrap(),
                nid: 42,
                role: Some("Compute".to_string()),
                sub_role: None,
            },
        );
        let slices = build_entities(&tree, &endpoint(), &maps);
        let c = &slices.components[0];
        assert_eq!(c.nid, Some(42));
        assert_eq!(c.role.as_deref(), Some("Compute"));
        assert_eq!(c.state, ComponentState::Off);
    }

    #[test]
    fn failed_subcomponent_is_skipped() {
        let mut bad = node_component("x0c0s14b0n1", "On", None);
        bad.last_status = EndpointStatus::HttpsGetFailed;
        let tree = tree_with(vec![node_component("x0c0s14b0n0", "On", None), bad]);
        let slices = build_entities(&tree, &endpoint(), &HashMap::new());
        assert_eq!(slices.components.len(), 1);
    }

    #[test]
    fn no_fru_identity_means_no_fru_record() {
        let tree = tree_with(vec![node_component("x0c0s14b0n0", "On", None)]);
        let slices = build_entities(&tree, &endpoint(), &HashMap::new());
        assert!(slices.hw_locs[0].populated_fru.is_none());
        // Location still records as populated: the node is there, it just
        // lacks persistent identity fields.
        assert_eq!(slices.hw_locs[0].status, HwInvByLoc::STATUS_POPULATED);
    }
}
