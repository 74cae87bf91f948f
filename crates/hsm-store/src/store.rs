use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hsm_domain::{
    CompEthInterface, Component, ComponentEndpoint, ComponentFlag, ComponentLockState,
    ComponentState, DiscoveryStatus, FailReason, Group, HsmError, HwInvByFru, HwInvByLoc,
    HwInvHist, IpAddressMapping, Membership, NodeMap, Partition, PowerMap, ProcessingModel,
    RedfishEndpoint, RedfishService, Reservation, ReservationCheck, ScnSubscription,
    ServiceEndpoint, Xname,
};

use crate::filter::{
    ComponentFilter, EthInterfaceFilter, HwInvHistFilter, RfEndpointFilter,
};

// ── Result carriers ───────────────────────────────────────────────────────────

/// One component's observable fields before and after a commit. Consumed by
/// the SCN engine to compute per-dimension deltas.
#[derive(Debug, Clone)]
pub struct ComponentChange {
    pub old: Option<Component>,
    pub new: Component,
}

/// Per-element outcome of a batch lock/reservation operation. Failure ids
/// are strings because a bad key may not resolve to a component at all.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub success: Vec<Xname>,
    pub failure: Vec<(String, FailReason)>,
}

impl BatchResult {
    /// Under the rigid model a non-empty failure list poisons the batch.
    pub fn ok(&self) -> bool {
        self.failure.is_empty()
    }
}

/// What cascades from deleting a RedfishEndpoint.
#[derive(Debug, Clone, Default)]
pub struct RfEndpointDeletion {
    pub component_endpoints: Vec<Xname>,
    pub service_endpoints: Vec<Xname>,
}

// ── The store trait ───────────────────────────────────────────────────────────

/// The transactional handle over HSM state.
///
/// Implementations guarantee that each method is atomic: compound writes
/// (notably [`HsmStore::update_all_for_rf_endpoint`]) commit every slice or
/// none, and reservation methods serialize per component.
#[async_trait]
pub trait HsmStore: Send + Sync + 'static {
    // ── Components ──────────────────────────────────────────────────────────

    async fn get_component(&self, id: &Xname) -> Result<Option<Component>, HsmError>;
    async fn get_components(&self, filter: &ComponentFilter) -> Result<Vec<Component>, HsmError>;
    /// Upsert; NID uniqueness is enforced across all components.
    async fn upsert_components(
        &self,
        comps: Vec<Component>,
    ) -> Result<Vec<ComponentChange>, HsmError>;
    async fn update_component_state(
        &self,
        ids: &[Xname],
        state: ComponentState,
        flag: Option<ComponentFlag>,
        force: bool,
    ) -> Result<Vec<ComponentChange>, HsmError>;
    async fn update_component_flag(
        &self,
        ids: &[Xname],
        flag: ComponentFlag,
    ) -> Result<Vec<ComponentChange>, HsmError>;
    async fn update_component_enabled(
        &self,
        ids: &[Xname],
        enabled: bool,
    ) -> Result<Vec<ComponentChange>, HsmError>;
    async fn update_component_software_status(
        &self,
        ids: &[Xname],
        software_status: &str,
    ) -> Result<Vec<ComponentChange>, HsmError>;
    async fn update_component_role(
        &self,
        ids: &[Xname],
        role: &str,
        sub_role: Option<&str>,
    ) -> Result<Vec<ComponentChange>, HsmError>;
    async fn update_component_nid(&self, id: &Xname, nid: i64) -> Result<(), HsmError>;
    async fn delete_component(&self, id: &Xname) -> Result<(), HsmError>;
    async fn delete_components_all(&self) -> Result<usize, HsmError>;

    // ── Redfish endpoints ───────────────────────────────────────────────────

    async fn get_rf_endpoint(&self, id: &Xname) -> Result<Option<RedfishEndpoint>, HsmError>;
    async fn get_rf_endpoints(
        &self,
        filter: &RfEndpointFilter,
    ) -> Result<Vec<RedfishEndpoint>, HsmError>;
    /// Insert; `DuplicateKey` if the xname already exists.
    async fn insert_rf_endpoint(&self, ep: RedfishEndpoint) -> Result<(), HsmError>;
    /// Full replace keyed by id; `NotFound` if absent.
    async fn update_rf_endpoint(&self, ep: RedfishEndpoint) -> Result<(), HsmError>;
    /// Cascade delete: ComponentEndpoints, ServiceEndpoints, the eth
    /// interfaces derived from them and the inventory under the endpoint go;
    /// Components stay but read Empty.
    async fn delete_rf_endpoint(&self, id: &Xname) -> Result<RfEndpointDeletion, HsmError>;
    async fn delete_rf_endpoints_all(&self) -> Result<usize, HsmError>;
    /// The discovery mutex: atomically mark each endpoint DiscoveryStarted
    /// iff not already in flight (or `force`), returning the acquired set.
    async fn update_rf_endpoints_for_discover(
        &self,
        ids: &[Xname],
        force: bool,
    ) -> Result<Vec<RedfishEndpoint>, HsmError>;
    async fn update_rf_endpoint_discovery_info(
        &self,
        id: &Xname,
        info: hsm_domain::DiscoveryInfo,
    ) -> Result<(), HsmError>;

    // ── Component / service endpoints ───────────────────────────────────────

    async fn get_comp_endpoint(&self, id: &Xname) -> Result<Option<ComponentEndpoint>, HsmError>;
    async fn get_comp_endpoints(
        &self,
        rf_endpoint_id: Option<&Xname>,
    ) -> Result<Vec<ComponentEndpoint>, HsmError>;
    async fn delete_comp_endpoint(&self, id: &Xname) -> Result<(), HsmError>;
    async fn delete_comp_endpoints_all(&self) -> Result<usize, HsmError>;

    async fn get_service_endpoint(
        &self,
        service: RedfishService,
        rf_endpoint_id: &Xname,
    ) -> Result<Option<ServiceEndpoint>, HsmError>;
    async fn get_service_endpoints(
        &self,
        service: Option<RedfishService>,
    ) -> Result<Vec<ServiceEndpoint>, HsmError>;
    async fn delete_service_endpoint(
        &self,
        service: RedfishService,
        rf_endpoint_id: &Xname,
    ) -> Result<(), HsmError>;
    async fn delete_service_endpoints_all(&self) -> Result<usize, HsmError>;

    // ── Hardware inventory ──────────────────────────────────────────────────

    async fn get_hw_loc(&self, id: &Xname) -> Result<Option<HwInvByLoc>, HsmError>;
    async fn get_hw_locs(&self) -> Result<Vec<HwInvByLoc>, HsmError>;
    /// All locations at or under `root` in the xname hierarchy.
    async fn get_hw_locs_under(&self, root: &Xname) -> Result<Vec<HwInvByLoc>, HsmError>;
    async fn upsert_hw_locs(&self, locs: Vec<HwInvByLoc>) -> Result<(), HsmError>;
    async fn delete_hw_loc(&self, id: &Xname) -> Result<(), HsmError>;
    async fn delete_hw_locs_all(&self) -> Result<usize, HsmError>;

    async fn get_hw_fru(&self, fru_id: &str) -> Result<Option<HwInvByFru>, HsmError>;
    async fn get_hw_frus(&self) -> Result<Vec<HwInvByFru>, HsmError>;
    async fn delete_hw_fru(&self, fru_id: &str) -> Result<(), HsmError>;
    async fn delete_hw_frus_all(&self) -> Result<usize, HsmError>;

    // ── Hardware history ────────────────────────────────────────────────────

    async fn get_hw_hist(&self, filter: &HwInvHistFilter) -> Result<Vec<HwInvHist>, HsmError>;
    /// Most recent event per location, for the locations given.
    async fn last_hw_hist_for(
        &self,
        ids: &[Xname],
    ) -> Result<Vec<(Xname, HwInvHist)>, HsmError>;
    async fn append_hw_hist(&self, events: Vec<HwInvHist>) -> Result<(), HsmError>;
    async fn delete_hw_hist_for(&self, id: &Xname) -> Result<usize, HsmError>;
    async fn delete_hw_hist_for_fru(&self, fru_id: &str) -> Result<usize, HsmError>;
    async fn delete_hw_hist_all(&self) -> Result<usize, HsmError>;

    // ── Component ethernet interfaces ───────────────────────────────────────

    async fn get_eth_interface(&self, id: &str) -> Result<Option<CompEthInterface>, HsmError>;
    async fn get_eth_interfaces(
        &self,
        filter: &EthInterfaceFilter,
    ) -> Result<Vec<CompEthInterface>, HsmError>;
    async fn insert_eth_interface(&self, ei: CompEthInterface) -> Result<(), HsmError>;
    async fn upsert_eth_interfaces(&self, eis: Vec<CompEthInterface>) -> Result<(), HsmError>;
    async fn patch_eth_interface(
        &self,
        id: &str,
        description: Option<String>,
        component_id: Option<Xname>,
        ip_addresses: Option<Vec<IpAddressMapping>>,
    ) -> Result<CompEthInterface, HsmError>;
    async fn add_eth_interface_ip(
        &self,
        id: &str,
        ip: IpAddressMapping,
    ) -> Result<(), HsmError>;
    async fn update_eth_interface_ip(
        &self,
        id: &str,
        ip_address: &str,
        network: &str,
    ) -> Result<(), HsmError>;
    async fn delete_eth_interface_ip(&self, id: &str, ip_address: &str) -> Result<(), HsmError>;
    async fn delete_eth_interface(&self, id: &str) -> Result<(), HsmError>;
    async fn delete_eth_interfaces_all(&self) -> Result<usize, HsmError>;

    // ── Groups / partitions / memberships ───────────────────────────────────

    async fn get_group(&self, label: &str) -> Result<Option<Group>, HsmError>;
    async fn get_groups(&self, tag: Option<&str>) -> Result<Vec<Group>, HsmError>;
    async fn insert_group(&self, group: Group) -> Result<(), HsmError>;
    async fn patch_group(
        &self,
        label: &str,
        description: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<(), HsmError>;
    async fn delete_group(&self, label: &str) -> Result<(), HsmError>;
    async fn add_group_member(&self, label: &str, id: &Xname) -> Result<(), HsmError>;
    async fn remove_group_member(&self, label: &str, id: &Xname) -> Result<(), HsmError>;

    async fn get_partition(&self, name: &str) -> Result<Option<Partition>, HsmError>;
    async fn get_partitions(&self) -> Result<Vec<Partition>, HsmError>;
    async fn insert_partition(&self, partition: Partition) -> Result<(), HsmError>;
    async fn patch_partition(
        &self,
        name: &str,
        description: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<(), HsmError>;
    async fn delete_partition(&self, name: &str) -> Result<(), HsmError>;
    async fn add_partition_member(&self, name: &str, id: &Xname) -> Result<(), HsmError>;
    async fn remove_partition_member(&self, name: &str, id: &Xname) -> Result<(), HsmError>;

    async fn get_membership(&self, id: &Xname) -> Result<Membership, HsmError>;
    async fn get_memberships(&self) -> Result<Vec<Membership>, HsmError>;

    // ── Power maps / node maps ──────────────────────────────────────────────

    async fn get_power_map(&self, id: &Xname) -> Result<Option<PowerMap>, HsmError>;
    async fn get_power_maps(&self) -> Result<Vec<PowerMap>, HsmError>;
    async fn upsert_power_map(&self, map: PowerMap) -> Result<(), HsmError>;
    async fn delete_power_map(&self, id: &Xname) -> Result<(), HsmError>;
    async fn delete_power_maps_all(&self) -> Result<usize, HsmError>;

    async fn get_node_map(&self, id: &Xname) -> Result<Option<NodeMap>, HsmError>;
    async fn get_node_maps(&self) -> Result<Vec<NodeMap>, HsmError>;
    /// Insert or replace; the NID must not collide with a *different* node's.
    async fn upsert_node_map(&self, map: NodeMap) -> Result<(), HsmError>;
    async fn delete_node_map(&self, id: &Xname) -> Result<(), HsmError>;
    async fn delete_node_maps_all(&self) -> Result<usize, HsmError>;

    // ── Discovery status ────────────────────────────────────────────────────

    async fn get_discovery_status(&self, id: u32) -> Result<Option<DiscoveryStatus>, HsmError>;
    async fn get_discovery_statuses(&self) -> Result<Vec<DiscoveryStatus>, HsmError>;
    async fn upsert_discovery_status(&self, status: DiscoveryStatus) -> Result<(), HsmError>;

    // ── SCN subscriptions ───────────────────────────────────────────────────

    async fn get_scn_subscription(&self, id: i64) -> Result<Option<ScnSubscription>, HsmError>;
    async fn get_scn_subscriptions(&self) -> Result<Vec<ScnSubscription>, HsmError>;
    /// Returns the assigned subscription id.
    async fn insert_scn_subscription(&self, sub: ScnSubscription) -> Result<i64, HsmError>;
    async fn update_scn_subscription(
        &self,
        id: i64,
        sub: ScnSubscription,
    ) -> Result<(), HsmError>;
    async fn delete_scn_subscription(&self, id: i64) -> Result<(), HsmError>;
    async fn delete_scn_subscriptions_all(&self) -> Result<usize, HsmError>;

    // ── Locks and reservations ──────────────────────────────────────────────

    async fn get_lock_states(
        &self,
        ids: &[Xname],
    ) -> Result<Vec<ComponentLockState>, HsmError>;
    async fn update_comp_locked(
        &self,
        ids: &[Xname],
        locked: bool,
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError>;
    async fn update_comp_reservation_disabled(
        &self,
        ids: &[Xname],
        disabled: bool,
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError>;
    /// Insert pre-minted reservations. Fails per element when the component
    /// is locked, reservation-disabled, already reserved, or absent. Under
    /// the rigid model any failure leaves the store untouched.
    async fn create_reservations(
        &self,
        reservations: Vec<Reservation>,
        model: ProcessingModel,
    ) -> Result<(BatchResult, Vec<Reservation>), HsmError>;
    async fn renew_reservations(
        &self,
        reservation_keys: &[String],
        extend_by: Duration,
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError>;
    async fn check_reservations(
        &self,
        deputy_keys: &[String],
    ) -> Result<(Vec<ReservationCheck>, Vec<(String, FailReason)>), HsmError>;
    async fn release_reservations(
        &self,
        reservation_keys: &[String],
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError>;
    /// Admin force-release by component id, no key required.
    async fn release_reservations_force(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError>;
    /// Drop every reservation with `ExpirationTime < now`; returns the freed
    /// component ids.
    async fn expire_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Xname>, HsmError>;

    // ── Compound ────────────────────────────────────────────────────────────

    /// Atomic multi-slice commit after a discovery pass: either every slice
    /// lands or none. Returns the component changes for SCN fan-out.
    async fn update_all_for_rf_endpoint(
        &self,
        ep: RedfishEndpoint,
        comp_endpoints: Vec<ComponentEndpoint>,
        hw_locs: Vec<HwInvByLoc>,
        components: Vec<Component>,
        service_endpoints: Vec<ServiceEndpoint>,
        eth_interfaces: Vec<CompEthInterface>,
    ) -> Result<Vec<ComponentChange>, HsmError>;

    /// Reset in-flight discovery older than `stale_after`; startup recovery.
    async fn reset_stale_discoveries(&self, stale_after: Duration) -> Result<usize, HsmError>;
}
