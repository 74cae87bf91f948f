use hsm_domain::{
    build_fru_id, EndpointStatus, EthernetNicInfo, FruIdentity, HmsType, RedfishService,
    StdLocationInfo, Xname,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::RedfishClient;
use crate::error::RedfishError;
use crate::raw::{
    RawChassis, RawComputerSystem, RawDrive, RawEthernetInterface, RawManager, RawMemory,
    RawNetworkAdapter, RawOutlet, RawPowerDistribution, RawPowerEquipment, RawProcessor,
    RawStorage, ResourceCollection, ServiceRoot,
};

// ── Input / output records ────────────────────────────────────────────────────

/// What the orchestrator hands the adapter: identity plus dialing info.
/// Credentials arrive separately from the vault.
#[derive(Debug, Clone)]
pub struct RedfishEpDescription {
    pub id: Xname,
    pub hms_type: HmsType,
    pub fqdn: String,
    pub enabled: bool,
}

/// Which Redfish resource class a discovered item came from. The first five
/// map 1:1 onto ComponentEndpoint variants; the rest are inventory-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfResourceKind {
    Chassis,
    System,
    Manager,
    Pdu,
    Outlet,
    Processor,
    Memory,
    Drive,
    NetworkAdapter,
}

/// One discovered Redfish resource, normalized to HMS terms but not yet a
/// store entity.
#[derive(Debug, Clone)]
pub struct DiscoveredComponent {
    pub xname: Xname,
    pub hms_type: HmsType,
    pub kind: RfResourceKind,
    pub last_status: EndpointStatus,
    pub redfish_id: String,
    pub redfish_type: String,
    pub redfish_subtype: String,
    pub odata_id: String,
    pub ordinal: u32,
    /// `Populated` or `Empty`, from the Redfish `Status.State`.
    pub populated: bool,
    pub power_state: Option<String>,
    pub uuid: String,
    pub location_info: StdLocationInfo,
    pub fru_identity: FruIdentity,
    /// Assigned after the tie-break pass; absent when identity is incomplete.
    pub fru_id: Option<String>,
    pub ethernet_nics: Vec<EthernetNicInfo>,
    pub actions: Option<Value>,
    /// Extra typed detail consumed by the entity builders.
    pub detail: ComponentDetail,
}

/// Type-specific fields preserved for FRU-info construction.
#[derive(Debug, Clone, Default)]
pub struct ComponentDetail {
    pub processor_type: String,
    pub max_speed_mhz: Option<u64>,
    pub total_cores: Option<u32>,
    pub total_threads: Option<u32>,
    pub memory_type: String,
    pub capacity_mib: Option<u64>,
    pub operating_speed_mhz: Option<u64>,
    pub memory_location: Option<hsm_domain::MemoryLocation>,
    pub media_type: String,
    pub capacity_bytes: Option<u64>,
    pub bios_version: String,
    pub system_type: String,
    pub processor_count: Option<u32>,
    pub processor_model: String,
    pub memory_gib: Option<u64>,
}

/// One Redfish service advertised by the root, kept raw for passthrough.
#[derive(Debug, Clone)]
pub struct DiscoveredService {
    pub service: RedfishService,
    pub odata_id: String,
    pub raw: Option<Value>,
}

/// The adapter's full answer for one endpoint.
#[derive(Debug, Clone)]
pub struct RedfishEndpointTree {
    pub endpoint: RedfishEpDescription,
    pub last_status: EndpointStatus,
    pub redfish_version: String,
    pub uuid: String,
    pub services: Vec<DiscoveredService>,
    pub components: Vec<DiscoveredComponent>,
}

impl RedfishEndpointTree {
    fn failed(endpoint: RedfishEpDescription, status: EndpointStatus) -> Self {
        RedfishEndpointTree {
            endpoint,
            last_status: status,
            redfish_version: String::new(),
            uuid: String::new(),
            services: Vec::new(),
            components: Vec::new(),
        }
    }
}

// ── Classification helpers ────────────────────────────────────────────────────

/// Map a Redfish `ChassisType` to the HMS type it represents for the given
/// controller, or `None` when the subtype isn't supported.
pub fn classify_chassis(endpoint_type: HmsType, chassis_type: &str) -> Option<HmsType> {
    match chassis_type {
        "RackMount" | "Rack" => Some(HmsType::Cabinet),
        "Enclosure" | "Drawer" | "Sled" | "Blade" | "StandAlone" => match endpoint_type {
            HmsType::NodeBmc => Some(HmsType::NodeEnclosure),
            HmsType::RouterBmc => Some(HmsType::HsnBoard),
            HmsType::ChassisBmc => Some(HmsType::Chassis),
            _ => None,
        },
        _ => None,
    }
}

/// Ordinal from a Redfish `Id` when it is (or ends with) a number, else the
/// traversal index.
pub fn ordinal_from_id(redfish_id: &str, traversal_index: u32) -> u32 {
    if let Ok(n) = redfish_id.parse::<u32>() {
        return n;
    }
    let digits: String = redfish_id
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().unwrap_or(traversal_index)
}

/// Apply the FRUID collision rule: when two or more locations share one
/// FRUID, every one of them takes a `_<ordinal>` suffix, so the ids stay
/// stable however many siblings show up on a later pass.
pub fn apply_fru_id_tiebreak(components: &mut [DiscoveredComponent]) {
    use std::collections::HashMap;
    let mut by_fru: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, c) in components.iter().enumerate() {
        if let Some(fru_id) = &c.fru_id {
            by_fru.entry(fru_id.clone()).or_default().push(i);
        }
    }
    for (fru_id, idxs) in by_fru {
        if idxs.len() < 2 {
            continue;
        }
        for i in idxs {
            let ordinal = components[i].ordinal;
            components[i].fru_id = Some(format!("{}_{}", fru_id, ordinal));
        }
    }
}

// ── Discovery walk ────────────────────────────────────────────────────────────

/// Retrieve the service root and recursively enumerate everything the HSM
/// models. Child failures are recorded per item and never abort siblings;
/// only a failure to fetch or decode the root fails the endpoint.
pub async fn discover_endpoint(
    desc: RedfishEpDescription,
    client: &RedfishClient,
) -> RedfishEndpointTree {
    if !desc.enabled {
        return RedfishEndpointTree::failed(desc, EndpointStatus::EndpointNotEnabled);
    }
    if !desc.hms_type.is_controller() {
        return RedfishEndpointTree::failed(desc, EndpointStatus::EndpointTypeNotSupported);
    }

    let root: ServiceRoot = match client.get("/redfish/v1").await {
        Ok(root) => root,
        Err(e) if e.is_transport() => {
            warn!(endpoint = %desc.id, error = %e, "service root unreachable");
            return RedfishEndpointTree::failed(desc, EndpointStatus::HttpsGetFailed);
        }
        Err(e) => {
            warn!(endpoint = %desc.id, error = %e, "service root undecodable");
            return RedfishEndpointTree::failed(desc, EndpointStatus::EpResponseFailedDecode);
        }
    };

    let mut tree = RedfishEndpointTree {
        redfish_version: root.redfish_version.clone(),
        uuid: root.uuid.clone(),
        endpoint: desc,
        last_status: EndpointStatus::DiscoverOK,
        services: Vec::new(),
        components: Vec::new(),
    };

    discover_services(&root, client, &mut tree).await;

    if let Some(chassis) = &root.chassis {
        walk_chassis(&chassis.odata_id, client, &mut tree).await;
    }
    if let Some(systems) = &root.systems {
        walk_systems(&systems.odata_id, client, &mut tree).await;
    }
    if let Some(managers) = &root.managers {
        walk_managers(&managers.odata_id, client, &mut tree).await;
    }
    if let Some(pe) = &root.power_equipment {
        walk_power_equipment(&pe.odata_id, client, &mut tree).await;
    }

    apply_fru_id_tiebreak(&mut tree.components);
    tree
}

async fn discover_services(
    root: &ServiceRoot,
    client: &RedfishClient,
    tree: &mut RedfishEndpointTree,
) {
    let candidates = [
        (RedfishService::AccountService, &root.account_service),
        (RedfishService::SessionService, &root.session_service),
        (RedfishService::EventService, &root.event_service),
        (RedfishService::TaskService, &root.task_service),
        (RedfishService::UpdateService, &root.update_service),
    ];
    for (service, link) in candidates {
        let Some(link) = link else { continue };
        if link.odata_id.is_empty() {
            continue;
        }
        let raw = match client.get_raw(&link.odata_id).await {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!(%service, error = %e, "service description unavailable");
                None
            }
        };
        tree.services.push(DiscoveredService {
            service,
            odata_id: link.odata_id.clone(),
            raw,
        });
    }
}

fn base_component(
    xname: Xname,
    hms_type: HmsType,
    kind: RfResourceKind,
    redfish_id: &str,
    odata_id: &str,
    ordinal: u32,
    identity: FruIdentity,
) -> DiscoveredComponent {
    let fru_id = build_fru_id(&identity);
    DiscoveredComponent {
        xname,
        hms_type,
        kind,
        last_status: EndpointStatus::DiscoverOK,
        redfish_id: redfish_id.to_string(),
        redfish_type: String::new(),
        redfish_subtype: String::new(),
        odata_id: odata_id.to_string(),
        ordinal,
        populated: true,
        power_state: None,
        uuid: String::new(),
        location_info: StdLocationInfo { id: redfish_id.to_string(), ..Default::default() },
        fru_identity: identity,
        fru_id,
        ethernet_nics: Vec::new(),
        actions: None,
        detail: ComponentDetail::default(),
    }
}

async fn collection_members(
    path: &str,
    client: &RedfishClient,
) -> Result<Vec<String>, RedfishError> {
    let coll: ResourceCollection = client.get(path).await?;
    Ok(coll
        .members
        .into_iter()
        .filter(|m| !m.odata_id.is_empty())
        .map(|m| m.odata_id)
        .collect())
}

async fn walk_chassis(path: &str, client: &RedfishClient, tree: &mut RedfishEndpointTree) {
    let members = match collection_members(path, client).await {
        Ok(members) => members,
        Err(e) => {
            warn!(endpoint = %tree.endpoint.id, error = %e, "chassis collection unavailable");
            return;
        }
    };
    for (i, member) in members.iter().enumerate() {
        let chassis: RawChassis = match client.get(member).await {
            Ok(c) => c,
            Err(e) => {
                warn!(endpoint = %tree.endpoint.id, path = %member, error = %e, "chassis fetch failed");
                continue;
            }
        };
        let Some(target) = classify_chassis(tree.endpoint.hms_type, &chassis.chassis_type) else {
            debug!(subtype = %chassis.chassis_type, "unsupported chassis subtype");
            let mut c = base_component(
                tree.endpoint.id.clone(),
                tree.endpoint.hms_type,
                RfResourceKind::Chassis,
                &chassis.id,
                member,
                i as u32,
                chassis.identity.clone(),
            );
            c.last_status = EndpointStatus::RedfishSubtypeNoSupport;
            c.redfish_type = "Chassis".to_string();
            c.redfish_subtype = chassis.chassis_type.clone();
            tree.components.push(c);
            continue;
        };

        // The chassis xname comes from walking up (or sideways from) the
        // controller's own xname.
        let xname = match chassis_xname(&tree.endpoint.id, target) {
            Some(x) => x,
            None => {
                warn!(endpoint = %tree.endpoint.id, ?target, "no xname for chassis resource");
                continue;
            }
        };
        let ordinal = ordinal_from_id(&chassis.id, i as u32);
        let mut c = base_component(
            xname,
            target,
            RfResourceKind::Chassis,
            &chassis.id,
            member,
            ordinal,
            chassis.identity.clone(),
        );
        c.redfish_type = "Chassis".to_string();
        c.redfish_subtype = chassis.chassis_type.clone();
        c.uuid = chassis.uuid.clone();
        c.populated = !chassis.status.is_absent();
        c.location_info.name = chassis.name.clone();
        c.actions = chassis.actions.clone();
        tree.components.push(c);
    }
}

/// Chassis-class resources sit at or above the controller in the hierarchy.
fn chassis_xname(endpoint_id: &Xname, target: HmsType) -> Option<Xname> {
    match target {
        // The cabinet is always an ancestor.
        HmsType::Cabinet => endpoint_id
            .ancestors()
            .into_iter()
            .find(|a| a.hms_type() == HmsType::Cabinet),
        // NodeBMC xXcCsSbB → enclosure xXcCsSeB (sibling of the BMC, same index).
        HmsType::NodeEnclosure => endpoint_id
            .parent()
            .and_then(|slot| slot.child('e', endpoint_id.ordinal()).ok()),
        // RouterBMC xXcCrRbB → HSN board xXcCrReB.
        HmsType::HsnBoard => endpoint_id
            .parent()
            .and_then(|slot| slot.child('e', endpoint_id.ordinal()).ok()),
        // ChassisBMC xXcCbB → the chassis itself.
        HmsType::Chassis => endpoint_id.parent(),
        _ => None,
    }
}

async fn walk_systems(path: &str, client: &RedfishClient, tree: &mut RedfishEndpointTree) {
    if tree.endpoint.hms_type != HmsType::NodeBmc {
        return;
    }
    let members = match collection_members(path, client).await {
        Ok(members) => members,
        Err(e) => {
            warn!(endpoint = %tree.endpoint.id, error = %e, "systems collection unavailable");
            return;
        }
    };
    for (i, member) in members.iter().enumerate() {
        let sys: RawComputerSystem = match client.get(member).await {
            Ok(s) => s,
            Err(e) => {
                warn!(endpoint = %tree.endpoint.id, path = %member, error = %e, "system fetch failed");
                continue;
            }
        };
        let ordinal = ordinal_from_id(&sys.id, i as u32);
        let Ok(node_xname) = tree.endpoint.id.child('n', ordinal) else {
            continue;
        };
        let mut node = base_component(
            node_xname.clone(),
            HmsType::Node,
            RfResourceKind::System,
            &sys.id,
            member,
            ordinal,
            sys.identity.clone(),
        );
        node.redfish_type = "ComputerSystem".to_string();
        node.redfish_subtype =
            if sys.system_type.is_empty() { "Physical".to_string() } else { sys.system_type.clone() };
        node.uuid = sys.uuid.clone();
        node.populated = !sys.status.is_absent();
        node.power_state = sys.power_state.clone();
        node.location_info.name = sys.name.clone();
        node.actions = sys.actions.clone();
        node.detail.bios_version = sys.bios_version.clone();
        node.detail.system_type = sys.system_type.clone();
        if let Some(ps) = &sys.processor_summary {
            node.detail.processor_count = ps.count;
            node.detail.processor_model = ps.model.clone().unwrap_or_default();
        }
        if let Some(ms) = &sys.memory_summary {
            node.detail.memory_gib = ms.total_system_memory_gib.map(|g| g as u64);
        }

        if let Some(eth) = &sys.ethernet_interfaces {
            node.ethernet_nics = walk_ethernet_interfaces(&eth.odata_id, client).await;
        }
        tree.components.push(node);

        if let Some(procs) = &sys.processors {
            walk_processors(&procs.odata_id, &node_xname, client, tree).await;
        }
        if let Some(mem) = &sys.memory {
            walk_memory(&mem.odata_id, &node_xname, client, tree).await;
        }
        if let Some(storage) = &sys.storage {
            walk_storage(&storage.odata_id, &node_xname, client, tree).await;
        }
        if let Some(adapters) = &sys.network_adapters {
            walk_network_adapters(&adapters.odata_id, &node_xname, client, tree).await;
        }
    }
}

async fn walk_ethernet_interfaces(path: &str, client: &RedfishClient) -> Vec<EthernetNicInfo> {
    let members = match collection_members(path, client).await {
        Ok(members) => members,
        Err(e) => {
            debug!(path = %path, error = %e, "ethernet interface collection unavailable");
            return Vec::new();
        }
    };
    let mut out = Vec::new();
    for member in members {
        match client.get::<RawEthernetInterface>(&member).await {
            Ok(eth) => out.push(EthernetNicInfo {
                redfish_id: eth.id,
                odata_id: member,
                description: eth.description,
                mac_address: eth.mac_address,
                permanent_mac_address: eth.permanent_mac_address,
            }),
            Err(e) => debug!(path = %member, error = %e, "ethernet interface fetch failed"),
        }
    }
    out
}

async fn walk_processors(
    path: &str,
    node: &Xname,
    client: &RedfishClient,
    tree: &mut RedfishEndpointTree,
) {
    let members = match collection_members(path, client).await {
        Ok(m) => m,
        Err(e) => {
            debug!(path = %path, error = %e, "processor collection unavailable");
            return;
        }
    };
    for (i, member) in members.iter().enumerate() {
        let proc: RawProcessor = match client.get(member).await {
            Ok(p) => p,
            Err(e) => {
                debug!(path = %member, error = %e, "processor fetch failed");
                continue;
            }
        };
        let ordinal = ordinal_from_id(&proc.id, i as u32);
        // GPUs and other accelerators enumerate alongside CPUs.
        let (prefix, hms_type) = if proc.processor_type.eq_ignore_ascii_case("GPU") {
            ('a', HmsType::NodeAccel)
        } else {
            ('p', HmsType::Processor)
        };
        let Ok(xname) = node.child(prefix, ordinal) else { continue };
        let mut c = base_component(
            xname,
            hms_type,
            RfResourceKind::Processor,
            &proc.id,
            member,
            ordinal,
            proc.identity.clone(),
        );
        c.redfish_type = "Processor".to_string();
        c.redfish_subtype = proc.processor_type.clone();
        c.populated = !proc.status.is_absent();
        c.location_info.name = proc.name.clone();
        c.detail.processor_type = proc.processor_type.clone();
        c.detail.max_speed_mhz = proc.max_speed_mhz;
        c.detail.total_cores = proc.total_cores;
        c.detail.total_threads = proc.total_threads;
        c.location_info.id = if proc.socket.is_empty() { proc.id.clone() } else { proc.socket.clone() };
        tree.components.push(c);
    }
}

async fn walk_memory(
    path: &str,
    node: &Xname,
    client: &RedfishClient,
    tree: &mut RedfishEndpointTree,
) {
    let members = match collection_members(path, client).await {
        Ok(m) => m,
        Err(e) => {
            debug!(path = %path, error = %e, "memory collection unavailable");
            return;
        }
    };
    for (i, member) in members.iter().enumerate() {
        let dimm: RawMemory = match client.get(member).await {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %member, error = %e, "memory fetch failed");
                continue;
            }
        };
        let ordinal = ordinal_from_id(&dimm.id, i as u32);
        let Ok(xname) = node.child('d', ordinal) else { continue };
        let mut c = base_component(
            xname,
            HmsType::Memory,
            RfResourceKind::Memory,
            &dimm.id,
            member,
            ordinal,
            dimm.identity.clone(),
        );
        c.redfish_type = "Memory".to_string();
        c.redfish_subtype = dimm.memory_device_type.clone();
        c.populated = !dimm.status.is_absent();
        c.location_info.name = dimm.name.clone();
        c.detail.memory_type = dimm.memory_device_type.clone();
        c.detail.capacity_mib = dimm.capacity_mib;
        c.detail.operating_speed_mhz = dimm.operating_speed_mhz;
        c.detail.memory_location = dimm.memory_location.as_ref().map(|l| {
            hsm_domain::MemoryLocation {
                socket: l.socket,
                memory_controller: l.memory_controller,
                channel: l.channel,
                slot: l.slot,
            }
        });
        tree.components.push(c);
    }
}

async fn walk_storage(
    path: &str,
    node: &Xname,
    client: &RedfishClient,
    tree: &mut RedfishEndpointTree,
) {
    let members = match collection_members(path, client).await {
        Ok(m) => m,
        Err(e) => {
            debug!(path = %path, error = %e, "storage collection unavailable");
            return;
        }
    };
    for (gi, member) in members.iter().enumerate() {
        let storage: RawStorage = match client.get(member).await {
            Ok(s) => s,
            Err(e) => {
                debug!(path = %member, error = %e, "storage fetch failed");
                continue;
            }
        };
        let group_ordinal = ordinal_from_id(&storage.id, gi as u32);
        let Ok(group_xname) = node.child('g', group_ordinal) else { continue };
        for (di, drive_ref) in storage.drives.iter().enumerate() {
            let drive: RawDrive = match client.get(&drive_ref.odata_id).await {
                Ok(d) => d,
                Err(e) => {
                    debug!(path = %drive_ref.odata_id, error = %e, "drive fetch failed");
                    continue;
                }
            };
            let ordinal = ordinal_from_id(&drive.id, di as u32);
            let Ok(xname) = group_xname.child('k', ordinal) else { continue };
            let mut c = base_component(
                xname,
                HmsType::Drive,
                RfResourceKind::Drive,
                &drive.id,
                &drive_ref.odata_id,
                ordinal,
                drive.identity.clone(),
            );
            c.redfish_type = "Drive".to_string();
            c.redfish_subtype = drive.media_type.clone();
            c.populated = !drive.status.is_absent();
            c.location_info.name = drive.name.clone();
            c.detail.media_type = drive.media_type.clone();
            c.detail.capacity_bytes = drive.capacity_bytes;
            tree.components.push(c);
        }
    }
}

async fn walk_network_adapters(
    path: &str,
    node: &Xname,
    client: &RedfishClient,
    tree: &mut RedfishEndpointTree,
) {
    let members = match collection_members(path, client).await {
        Ok(m) => m,
        Err(e) => {
            debug!(path = %path, error = %e, "network adapter collection unavailable");
            return;
        }
    };
    for (i, member) in members.iter().enumerate() {
        let nic: RawNetworkAdapter = match client.get(member).await {
            Ok(n) => n,
            Err(e) => {
                debug!(path = %member, error = %e, "network adapter fetch failed");
                continue;
            }
        };
        let ordinal = ordinal_from_id(&nic.id, i as u32);
        let Ok(xname) = node.child('h', ordinal) else { continue };
        let mut c = base_component(
            xname,
            HmsType::NodeHsnNic,
            RfResourceKind::NetworkAdapter,
            &nic.id,
            member,
            ordinal,
            nic.identity.clone(),
        );
        c.redfish_type = "NetworkAdapter".to_string();
        c.populated = !nic.status.is_absent();
        c.location_info.name = nic.name.clone();
        tree.components.push(c);
    }
}

async fn walk_managers(path: &str, client: &RedfishClient, tree: &mut RedfishEndpointTree) {
    let members = match collection_members(path, client).await {
        Ok(m) => m,
        Err(e) => {
            warn!(endpoint = %tree.endpoint.id, error = %e, "managers collection unavailable");
            return;
        }
    };
    for (i, member) in members.iter().enumerate() {
        let mgr: RawManager = match client.get(member).await {
            Ok(m) => m,
            Err(e) => {
                warn!(endpoint = %tree.endpoint.id, path = %member, error = %e, "manager fetch failed");
                continue;
            }
        };
        // The manager *is* the controller we dialed; NodeBMC vs RouterBMC is
        // already decided by the hardware it manages (the endpoint xname).
        let ordinal = ordinal_from_id(&mgr.id, i as u32);
        let mut c = base_component(
            tree.endpoint.id.clone(),
            tree.endpoint.hms_type,
            RfResourceKind::Manager,
            &mgr.id,
            member,
            ordinal,
            mgr.identity.clone(),
        );
        c.redfish_type = "Manager".to_string();
        c.redfish_subtype = mgr.manager_type.clone();
        c.uuid = mgr.uuid.clone();
        c.populated = !mgr.status.is_absent();
        c.location_info.name = mgr.name.clone();
        c.actions = mgr.actions.clone();
        if let Some(eth) = &mgr.ethernet_interfaces {
            c.ethernet_nics = walk_ethernet_interfaces(&eth.odata_id, client).await;
        }
        tree.components.push(c);
    }
}

async fn walk_power_equipment(
    path: &str,
    client: &RedfishClient,
    tree: &mut RedfishEndpointTree,
) {
    if tree.endpoint.hms_type != HmsType::CabinetPduController {
        return;
    }
    let pe: RawPowerEquipment = match client.get(path).await {
        Ok(pe) => pe,
        Err(e) => {
            warn!(endpoint = %tree.endpoint.id, error = %e, "power equipment unavailable");
            return;
        }
    };
    let Some(rack_pdus) = &pe.rack_pdus else { return };
    let members = match collection_members(&rack_pdus.odata_id, client).await {
        Ok(m) => m,
        Err(e) => {
            warn!(endpoint = %tree.endpoint.id, error = %e, "rack PDU collection unavailable");
            return;
        }
    };
    for (i, member) in members.iter().enumerate() {
        let pdu: RawPowerDistribution = match client.get(member).await {
            Ok(p) => p,
            Err(e) => {
                warn!(endpoint = %tree.endpoint.id, path = %member, error = %e, "PDU fetch failed");
                continue;
            }
        };
        let ordinal = ordinal_from_id(&pdu.id, i as u32);
        let Ok(pdu_xname) = tree.endpoint.id.child('p', ordinal) else { continue };
        let mut c = base_component(
            pdu_xname.clone(),
            HmsType::CabinetPdu,
            RfResourceKind::Pdu,
            &pdu.id,
            member,
            ordinal,
            pdu.identity.clone(),
        );
        c.redfish_type = "PowerDistribution".to_string();
        c.redfish_subtype = pdu.equipment_type.clone();
        c.uuid = pdu.uuid.clone();
        c.populated = !pdu.status.is_absent();
        c.location_info.name = pdu.name.clone();
        tree.components.push(c);

        if let Some(outlets) = &pdu.outlets {
            walk_outlets(&outlets.odata_id, &pdu_xname, client, tree).await;
        }
    }
}

async fn walk_outlets(
    path: &str,
    pdu: &Xname,
    client: &RedfishClient,
    tree: &mut RedfishEndpointTree,
) {
    let members = match collection_members(path, client).await {
        Ok(m) => m,
        Err(e) => {
            debug!(path = %path, error = %e, "outlet collection unavailable");
            return;
        }
    };
    for (i, member) in members.iter().enumerate() {
        let outlet: RawOutlet = match client.get(member).await {
            Ok(o) => o,
            Err(e) => {
                debug!(path = %member, error = %e, "outlet fetch failed");
                continue;
            }
        };
        let ordinal = ordinal_from_id(&outlet.id, i as u32);
        let Ok(xname) = pdu.child('j', ordinal) else { continue };
        let mut c = base_component(
            xname,
            HmsType::CabinetPduOutlet,
            RfResourceKind::Outlet,
            &outlet.id,
            member,
            ordinal,
            outlet.identity.clone(),
        );
        c.redfish_type = "Outlet".to_string();
        c.redfish_subtype = outlet.outlet_type.clone();
        c.populated = !outlet.status.is_absent();
        c.power_state = outlet.power_state.clone();
        c.location_info.name = outlet.name.clone();
        tree.components.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(xname: &str, ordinal: u32, fru_id: Option<&str>) -> DiscoveredComponent {
        let x = Xname::parse(xname).unwrap();
        let mut c = base_component(
            x.clone(),
            x.hms_type(),
            RfResourceKind::System,
            "Id",
            "/redfish/v1/x",
            ordinal,
            FruIdentity::default(),
        );
        c.fru_id = fru_id.map(|s| s.to_string());
        c
    }

    #[test]
    fn chassis_classification() {
        assert_eq!(
            classify_chassis(HmsType::NodeBmc, "RackMount"),
            Some(HmsType::Cabinet)
        );
        assert_eq!(
            classify_chassis(HmsType::NodeBmc, "Enclosure"),
            Some(HmsType::NodeEnclosure)
        );
        assert_eq!(
            classify_chassis(HmsType::RouterBmc, "Enclosure"),
            Some(HmsType::HsnBoard)
        );
        assert_eq!(classify_chassis(HmsType::NodeBmc, "Zone"), None);
    }

    #[test]
    fn chassis_xname_placement() {
        let bmc = Xname::parse("x3000c0s9b0").unwrap();
        assert_eq!(
            chassis_xname(&bmc, HmsType::Cabinet).unwrap().as_str(),
            "x3000"
        );
        assert_eq!(
            chassis_xname(&bmc, HmsType::NodeEnclosure).unwrap().as_str(),
            "x3000c0s9e0"
        );
        let rtr = Xname::parse("x3000c0r7b0").unwrap();
        assert_eq!(
            chassis_xname(&rtr, HmsType::HsnBoard).unwrap().as_str(),
            "x3000c0r7e0"
        );
    }

    #[test]
    fn ordinal_extraction() {
        assert_eq!(ordinal_from_id("3", 9), 3);
        assert_eq!(ordinal_from_id("Node2", 9), 2);
        assert_eq!(ordinal_from_id("CPU", 9), 9);
        assert_eq!(ordinal_from_id("", 4), 4);
    }

    #[test]
    fn fru_tiebreak_suffixes_every_collider() {
        // A dual-node blade reports one FRU triple for both node locations.
        let mut comps = vec![
            component("x0c0s0b0n0", 0, Some("CRAY-100-SN1")),
            component("x0c0s0b0n1", 1, Some("CRAY-100-SN1")),
            component("x0c0s1b0n0", 0, Some("CRAY-100-SN2")),
            component("x0c0s2b0n0", 0, None),
        ];
        apply_fru_id_tiebreak(&mut comps);
        assert_eq!(comps[0].fru_id.as_deref(), Some("CRAY-100-SN1_0"));
        assert_eq!(comps[1].fru_id.as_deref(), Some("CRAY-100-SN1_1"));
        // The lone holder keeps its FRUID bare; no-FRU stays no-FRU.
        assert_eq!(comps[2].fru_id.as_deref(), Some("CRAY-100-SN2"));
        assert_eq!(comps[3].fru_id, None);
    }

    #[test]
    fn tiebreak_is_stable_across_rediscovery() {
        // Re-running the pass over already-suffixed ids must not change them:
        // the suffixed ids no longer collide.
        let mut comps = vec![
            component("x0c0s0b0n0", 0, Some("CRAY-100-SN1_0")),
            component("x0c0s0b0n1", 1, Some("CRAY-100-SN1_1")),
        ];
        apply_fru_id_tiebreak(&mut comps);
        assert_eq!(comps[0].fru_id.as_deref(), Some("CRAY-100-SN1_0"));
        assert_eq!(comps[1].fru_id.as_deref(), Some("CRAY-100-SN1_1"));
    }
}
