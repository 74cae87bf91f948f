use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hsm_domain::{
    CompEthInterface, Component, ComponentEndpoint, ComponentFlag, ComponentLockState,
    ComponentState, DiscoveryInfo, DiscoveryStatus, EndpointStatus, FailReason, Group, HsmError,
    HwInvByFru, HwInvByLoc, HwInvHist, IpAddressMapping, Membership, NodeMap, Partition,
    PowerMap, ProcessingModel, RedfishEndpoint, RedfishService, Reservation, ReservationCheck,
    ScnSubscription, ServiceEndpoint, Xname,
};
use tokio::sync::RwLock;

use crate::filter::{ComponentFilter, EthInterfaceFilter, HwInvHistFilter, RfEndpointFilter};
use crate::store::{BatchResult, ComponentChange, HsmStore, RfEndpointDeletion};

#[derive(Debug, Default)]
struct Inner {
    components: HashMap<Xname, Component>,
    rf_endpoints: HashMap<Xname, RedfishEndpoint>,
    comp_endpoints: HashMap<Xname, ComponentEndpoint>,
    service_endpoints: HashMap<(Xname, RedfishService), ServiceEndpoint>,
    hw_locs: HashMap<Xname, HwInvByLoc>,
    hw_frus: HashMap<String, HwInvByFru>,
    hw_hist: Vec<HwInvHist>,
    eth_interfaces: HashMap<String, CompEthInterface>,
    groups: HashMap<String, Group>,
    partitions: HashMap<String, Partition>,
    power_maps: HashMap<Xname, PowerMap>,
    node_maps: HashMap<Xname, NodeMap>,
    discovery_status: HashMap<u32, DiscoveryStatus>,
    subscriptions: HashMap<i64, ScnSubscription>,
    next_subscription_id: i64,
    reservations: HashMap<Xname, Reservation>,
}

impl Inner {
    fn membership_of(&self, id: &Xname) -> Membership {
        let mut group_labels: Vec<String> = self
            .groups
            .values()
            .filter(|g| g.members.ids.contains(id))
            .map(|g| g.label.clone())
            .collect();
        group_labels.sort();
        let partition_name = self
            .partitions
            .values()
            .find(|p| p.members.ids.contains(id))
            .map(|p| p.name.clone());
        Membership { id: id.clone(), group_labels, partition_name }
    }

    /// Unexpired reservation lookup; `Reserved` is defined by this.
    fn active_reservation(&self, id: &Xname, now: DateTime<Utc>) -> Option<&Reservation> {
        self.reservations.get(id).filter(|r| !r.is_expired(now))
    }

    fn lock_state_of(&self, c: &Component, now: DateTime<Utc>) -> ComponentLockState {
        let res = self.active_reservation(&c.id, now);
        ComponentLockState {
            id: c.id.clone(),
            locked: c.locked,
            reserved: res.is_some(),
            reservation_disabled: c.reservation_disabled,
            expiration_timestamp: res.and_then(|r| r.expiration_timestamp),
        }
    }

    /// Upsert one component, preserving admin- and lock-owned fields that the
    /// incoming record does not carry. Returns the change when anything
    /// observable moved.
    fn upsert_component(&mut self, mut new: Component) -> Result<Option<ComponentChange>, HsmError> {
        new.verify()?;
        if let Some(nid) = new.nid {
            let clash = self
                .components
                .values()
                .any(|c| c.nid == Some(nid) && c.id != new.id);
            if clash {
                return Err(HsmError::DuplicateKey(format!("NID {}", nid)));
            }
        }
        let old = self.components.get(&new.id).cloned();
        if let Some(prev) = &old {
            new.locked = prev.locked;
            new.reservation_disabled = prev.reservation_disabled;
            if new.role.is_none() {
                new.role = prev.role.clone();
            }
            if new.sub_role.is_none() {
                new.sub_role = prev.sub_role.clone();
            }
            if new.nid.is_none() {
                new.nid = prev.nid;
            }
            if new.class.is_none() {
                new.class = prev.class;
            }
            if prev == &new {
                return Ok(None);
            }
        }
        self.components.insert(new.id.clone(), new.clone());
        Ok(Some(ComponentChange { old, new }))
    }
}

/// In-memory implementation of [`HsmStore`].
///
/// Every method takes a single guard, so compound writes are atomic and
/// reservation updates serialize. All data is lost on process exit; the
/// relational driver plugs in behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HsmStore for InMemoryStore {
    // ── Components ──────────────────────────────────────────────────────────

    async fn get_component(&self, id: &Xname) -> Result<Option<Component>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.components.get(id).cloned())
    }

    async fn get_components(&self, filter: &ComponentFilter) -> Result<Vec<Component>, HsmError> {
        let compiled = filter.compile()?;
        let guard = self.inner.read().await;
        let mut out: Vec<Component> = guard
            .components
            .values()
            .filter(|c| compiled.matches(c))
            .filter(|c| {
                compiled.group.is_empty()
                    || compiled.group.iter().any(|g| {
                        guard.groups.get(g).map_or(false, |grp| grp.members.ids.contains(&c.id))
                    })
            })
            .filter(|c| {
                compiled.partition.is_empty()
                    || compiled.partition.iter().any(|p| {
                        guard
                            .partitions
                            .get(p)
                            .map_or(false, |part| part.members.ids.contains(&c.id))
                    })
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn upsert_components(
        &self,
        comps: Vec<Component>,
    ) -> Result<Vec<ComponentChange>, HsmError> {
        let mut guard = self.inner.write().await;
        let mut changes = Vec::new();
        for c in comps {
            if let Some(change) = guard.upsert_component(c)? {
                changes.push(change);
            }
        }
        Ok(changes)
    }

    async fn update_component_state(
        &self,
        ids: &[Xname],
        state: ComponentState,
        flag: Option<ComponentFlag>,
        force: bool,
    ) -> Result<Vec<ComponentChange>, HsmError> {
        let mut guard = self.inner.write().await;
        for id in ids {
            let c = guard
                .components
                .get(id)
                .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
            c.allow_transition(state, force)?;
        }
        let mut changes = Vec::new();
        for id in ids {
            let c = guard.components.get_mut(id).expect("validated above");
            let new_flag = flag.unwrap_or(ComponentFlag::OK);
            if c.state == state && c.flag == new_flag {
                continue;
            }
            let old = c.clone();
            c.state = state;
            // A state write resets the flag unless one was supplied.
            c.flag = new_flag;
            changes.push(ComponentChange { old: Some(old), new: c.clone() });
        }
        Ok(changes)
    }

    async fn update_component_flag(
        &self,
        ids: &[Xname],
        flag: ComponentFlag,
    ) -> Result<Vec<ComponentChange>, HsmError> {
        let mut guard = self.inner.write().await;
        for id in ids {
            if !guard.components.contains_key(id) {
                return Err(HsmError::NotFound(id.to_string()));
            }
        }
        let mut changes = Vec::new();
        for id in ids {
            let c = guard.components.get_mut(id).expect("validated above");
            if c.flag == flag {
                continue;
            }
            let old = c.clone();
            c.flag = flag;
            changes.push(ComponentChange { old: Some(old), new: c.clone() });
        }
        Ok(changes)
    }

    async fn update_component_enabled(
        &self,
        ids: &[Xname],
        enabled: bool,
    ) -> Result<Vec<ComponentChange>, HsmError> {
        let mut guard = self.inner.write().await;
        for id in ids {
            if !guard.components.contains_key(id) {
                return Err(HsmError::NotFound(id.to_string()));
            }
        }
        let mut changes = Vec::new();
        for id in ids {
            let c = guard.components.get_mut(id).expect("validated above");
            if c.enabled == Some(enabled) {
                continue;
            }
            let old = c.clone();
            c.enabled = Some(enabled);
            changes.push(ComponentChange { old: Some(old), new: c.clone() });
        }
        Ok(changes)
    }

    async fn update_component_software_status(
        &self,
        ids: &[Xname],
        software_status: &str,
    ) -> Result<Vec<ComponentChange>, HsmError> {
        let mut guard = self.inner.write().await;
        for id in ids {
            if !guard.components.contains_key(id) {
                return Err(HsmError::NotFound(id.to_string()));
            }
        }
        let mut changes = Vec::new();
        for id in ids {
            let c = guard.components.get_mut(id).expect("validated above");
            if c.software_status.as_deref() == Some(software_status) {
                continue;
            }
            let old = c.clone();
            c.software_status = Some(software_status.to_string());
            changes.push(ComponentChange { old: Some(old), new: c.clone() });
        }
        Ok(changes)
    }

    async fn update_component_role(
        &self,
        ids: &[Xname],
        role: &str,
        sub_role: Option<&str>,
    ) -> Result<Vec<ComponentChange>, HsmError> {
        let role = hsm_domain::verify_role(role)?;
        let sub_role = sub_role.map(hsm_domain::verify_subrole).transpose()?;
        let mut guard = self.inner.write().await;
        for id in ids {
            if !guard.components.contains_key(id) {
                return Err(HsmError::NotFound(id.to_string()));
            }
        }
        let mut changes = Vec::new();
        for id in ids {
            let c = guard.components.get_mut(id).expect("validated above");
            if c.role.as_deref() == Some(role.as_str()) && c.sub_role == sub_role {
                continue;
            }
            let old = c.clone();
            c.role = Some(role.clone());
            c.sub_role = sub_role.clone();
            changes.push(ComponentChange { old: Some(old), new: c.clone() });
        }
        Ok(changes)
    }

    async fn update_component_nid(&self, id: &Xname, nid: i64) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        if nid < 0 {
            return Err(HsmError::BadId(format!("NID {}", nid)));
        }
        let clash = guard
            .components
            .values()
            .any(|c| c.nid == Some(nid) && c.id != *id);
        if clash {
            return Err(HsmError::DuplicateKey(format!("NID {}", nid)));
        }
        let c = guard
            .components
            .get_mut(id)
            .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
        c.nid = Some(nid);
        Ok(())
    }

    async fn delete_component(&self, id: &Xname) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .components
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
        guard.reservations.remove(id);
        Ok(())
    }

    async fn delete_components_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.components.len();
        guard.components.clear();
        guard.reservations.clear();
        Ok(n)
    }

    // ── Redfish endpoints ───────────────────────────────────────────────────

    async fn get_rf_endpoint(&self, id: &Xname) -> Result<Option<RedfishEndpoint>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.rf_endpoints.get(id).cloned())
    }

    async fn get_rf_endpoints(
        &self,
        filter: &RfEndpointFilter,
    ) -> Result<Vec<RedfishEndpoint>, HsmError> {
        filter.validate()?;
        let guard = self.inner.read().await;
        let mut out: Vec<RedfishEndpoint> =
            guard.rf_endpoints.values().filter(|ep| filter.matches(ep)).cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn insert_rf_endpoint(&self, ep: RedfishEndpoint) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        if guard.rf_endpoints.contains_key(&ep.id) {
            return Err(HsmError::DuplicateKey(ep.id.to_string()));
        }
        guard.rf_endpoints.insert(ep.id.clone(), ep);
        Ok(())
    }

    async fn update_rf_endpoint(&self, ep: RedfishEndpoint) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        if !guard.rf_endpoints.contains_key(&ep.id) {
            return Err(HsmError::NotFound(ep.id.to_string()));
        }
        guard.rf_endpoints.insert(ep.id.clone(), ep);
        Ok(())
    }

    async fn delete_rf_endpoint(&self, id: &Xname) -> Result<RfEndpointDeletion, HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .rf_endpoints
            .remove(id)
            .ok_or_else(|| HsmError::NotFound(id.to_string()))?;

        let mut deletion = RfEndpointDeletion::default();

        let doomed: Vec<Xname> = guard
            .comp_endpoints
            .values()
            .filter(|ce| ce.rf_endpoint_id == *id)
            .map(|ce| ce.id.clone())
            .collect();
        let doomed_set: HashSet<&Xname> = doomed.iter().collect();
        guard
            .eth_interfaces
            .retain(|_, ei| ei.component_id.as_ref().map_or(true, |c| !doomed_set.contains(c)));
        for ce_id in &doomed {
            guard.comp_endpoints.remove(ce_id);
        }
        deletion.component_endpoints = doomed;

        let svc_keys: Vec<(Xname, RedfishService)> = guard
            .service_endpoints
            .keys()
            .filter(|(ep_id, _)| ep_id == id)
            .cloned()
            .collect();
        for key in &svc_keys {
            guard.service_endpoints.remove(key);
        }
        deletion.service_endpoints = svc_keys.into_iter().map(|(x, _)| x).collect();

        // Inventory under the endpoint goes; components stay but read Empty.
        guard.hw_locs.retain(|loc_id, _| !(loc_id == id || loc_id.is_child_of(id)));
        for c in guard.components.values_mut() {
            if c.id == *id || c.id.is_child_of(id) {
                c.state = ComponentState::Empty;
            }
        }
        Ok(deletion)
    }

    async fn delete_rf_endpoints_all(&self) -> Result<usize, HsmError> {
        let ids: Vec<Xname> = {
            let guard = self.inner.read().await;
            guard.rf_endpoints.keys().cloned().collect()
        };
        let n = ids.len();
        for id in ids {
            self.delete_rf_endpoint(&id).await?;
        }
        Ok(n)
    }

    async fn update_rf_endpoints_for_discover(
        &self,
        ids: &[Xname],
        force: bool,
    ) -> Result<Vec<RedfishEndpoint>, HsmError> {
        let mut guard = self.inner.write().await;
        let now = Utc::now();
        let mut acquired = Vec::new();
        for id in ids {
            if let Some(ep) = guard.rf_endpoints.get_mut(id) {
                if ep.discovery_info.last_status.is_in_flight() && !force {
                    continue;
                }
                ep.discovery_info.last_status = EndpointStatus::DiscoveryStarted;
                ep.discovery_info.last_attempt = Some(now);
                acquired.push(ep.clone());
            }
        }
        Ok(acquired)
    }

    async fn update_rf_endpoint_discovery_info(
        &self,
        id: &Xname,
        info: DiscoveryInfo,
    ) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let ep = guard
            .rf_endpoints
            .get_mut(id)
            .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
        ep.discovery_info = info;
        Ok(())
    }

    // ── Component / service endpoints ───────────────────────────────────────

    async fn get_comp_endpoint(&self, id: &Xname) -> Result<Option<ComponentEndpoint>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.comp_endpoints.get(id).cloned())
    }

    async fn get_comp_endpoints(
        &self,
        rf_endpoint_id: Option<&Xname>,
    ) -> Result<Vec<ComponentEndpoint>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<ComponentEndpoint> = guard
            .comp_endpoints
            .values()
            .filter(|ce| rf_endpoint_id.map_or(true, |id| ce.rf_endpoint_id == *id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn delete_comp_endpoint(&self, id: &Xname) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .comp_endpoints
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(id.to_string()))
    }

    async fn delete_comp_endpoints_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.comp_endpoints.len();
        guard.comp_endpoints.clear();
        Ok(n)
    }

    async fn get_service_endpoint(
        &self,
        service: RedfishService,
        rf_endpoint_id: &Xname,
    ) -> Result<Option<ServiceEndpoint>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.service_endpoints.get(&(rf_endpoint_id.clone(), service)).cloned())
    }

    async fn get_service_endpoints(
        &self,
        service: Option<RedfishService>,
    ) -> Result<Vec<ServiceEndpoint>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<ServiceEndpoint> = guard
            .service_endpoints
            .values()
            .filter(|se| service.map_or(true, |s| se.service == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.service.as_str(), &a.rf_endpoint_id).cmp(&(b.service.as_str(), &b.rf_endpoint_id))
        });
        Ok(out)
    }

    async fn delete_service_endpoint(
        &self,
        service: RedfishService,
        rf_endpoint_id: &Xname,
    ) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .service_endpoints
            .remove(&(rf_endpoint_id.clone(), service))
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(format!("{}/{}", service, rf_endpoint_id)))
    }

    async fn delete_service_endpoints_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.service_endpoints.len();
        guard.service_endpoints.clear();
        Ok(n)
    }

    // ── Hardware inventory ──────────────────────────────────────────────────

    async fn get_hw_loc(&self, id: &Xname) -> Result<Option<HwInvByLoc>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.hw_locs.get(id).cloned())
    }

    async fn get_hw_locs(&self) -> Result<Vec<HwInvByLoc>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<HwInvByLoc> = guard.hw_locs.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn get_hw_locs_under(&self, root: &Xname) -> Result<Vec<HwInvByLoc>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<HwInvByLoc> = guard
            .hw_locs
            .values()
            .filter(|loc| loc.id == *root || loc.id.is_child_of(root))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn upsert_hw_locs(&self, locs: Vec<HwInvByLoc>) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        for loc in locs {
            loc.verify()?;
            if let Some(fru) = &loc.populated_fru {
                guard.hw_frus.insert(fru.fru_id.clone(), fru.clone());
            }
            guard.hw_locs.insert(loc.id.clone(), loc);
        }
        Ok(())
    }

    async fn delete_hw_loc(&self, id: &Xname) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .hw_locs
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(id.to_string()))
    }

    async fn delete_hw_locs_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.hw_locs.len();
        guard.hw_locs.clear();
        Ok(n)
    }

    async fn get_hw_fru(&self, fru_id: &str) -> Result<Option<HwInvByFru>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.hw_frus.get(fru_id).cloned())
    }

    async fn get_hw_frus(&self) -> Result<Vec<HwInvByFru>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<HwInvByFru> = guard.hw_frus.values().cloned().collect();
        out.sort_by(|a, b| a.fru_id.cmp(&b.fru_id));
        Ok(out)
    }

    async fn delete_hw_fru(&self, fru_id: &str) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .hw_frus
            .remove(fru_id)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(fru_id.to_string()))
    }

    async fn delete_hw_frus_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.hw_frus.len();
        guard.hw_frus.clear();
        Ok(n)
    }

    // ── Hardware history ────────────────────────────────────────────────────

    async fn get_hw_hist(&self, filter: &HwInvHistFilter) -> Result<Vec<HwInvHist>, HsmError> {
        filter.validate()?;
        let guard = self.inner.read().await;
        let mut out: Vec<HwInvHist> =
            guard.hw_hist.iter().filter(|h| filter.matches(h)).cloned().collect();
        out.sort_by(|a, b| (a.id.clone(), a.timestamp).cmp(&(b.id.clone(), b.timestamp)));
        Ok(out)
    }

    async fn last_hw_hist_for(
        &self,
        ids: &[Xname],
    ) -> Result<Vec<(Xname, HwInvHist)>, HsmError> {
        let guard = self.inner.read().await;
        let mut out = Vec::new();
        for id in ids {
            let last = guard
                .hw_hist
                .iter()
                .filter(|h| h.id == *id)
                .max_by_key(|h| h.timestamp);
            if let Some(h) = last {
                out.push((id.clone(), h.clone()));
            }
        }
        Ok(out)
    }

    async fn append_hw_hist(&self, events: Vec<HwInvHist>) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard.hw_hist.extend(events);
        Ok(())
    }

    async fn delete_hw_hist_for(&self, id: &Xname) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let before = guard.hw_hist.len();
        guard.hw_hist.retain(|h| h.id != *id);
        let removed = before - guard.hw_hist.len();
        if removed == 0 {
            return Err(HsmError::NotFound(id.to_string()));
        }
        Ok(removed)
    }

    async fn delete_hw_hist_for_fru(&self, fru_id: &str) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let before = guard.hw_hist.len();
        guard.hw_hist.retain(|h| h.fru_id != fru_id);
        let removed = before - guard.hw_hist.len();
        if removed == 0 {
            return Err(HsmError::NotFound(fru_id.to_string()));
        }
        Ok(removed)
    }

    async fn delete_hw_hist_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.hw_hist.len();
        guard.hw_hist.clear();
        Ok(n)
    }

    // ── Component ethernet interfaces ───────────────────────────────────────

    async fn get_eth_interface(&self, id: &str) -> Result<Option<CompEthInterface>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.eth_interfaces.get(id).cloned())
    }

    async fn get_eth_interfaces(
        &self,
        filter: &EthInterfaceFilter,
    ) -> Result<Vec<CompEthInterface>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<CompEthInterface> =
            guard.eth_interfaces.values().filter(|ei| filter.matches(ei)).cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn insert_eth_interface(&self, mut ei: CompEthInterface) -> Result<(), HsmError> {
        ei.id = hsm_domain::mac_to_eth_interface_id(&ei.mac_addr)?;
        ei.last_update = Some(Utc::now());
        let mut guard = self.inner.write().await;
        if guard.eth_interfaces.contains_key(&ei.id) {
            return Err(HsmError::DuplicateKey(ei.id));
        }
        guard.eth_interfaces.insert(ei.id.clone(), ei);
        Ok(())
    }

    async fn upsert_eth_interfaces(&self, eis: Vec<CompEthInterface>) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let now = Utc::now();
        for mut ei in eis {
            ei.id = hsm_domain::mac_to_eth_interface_id(&ei.mac_addr)?;
            ei.last_update = Some(now);
            guard.eth_interfaces.insert(ei.id.clone(), ei);
        }
        Ok(())
    }

    async fn patch_eth_interface(
        &self,
        id: &str,
        description: Option<String>,
        component_id: Option<Xname>,
        ip_addresses: Option<Vec<IpAddressMapping>>,
    ) -> Result<CompEthInterface, HsmError> {
        let mut guard = self.inner.write().await;
        let ei = guard
            .eth_interfaces
            .get_mut(id)
            .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
        if let Some(d) = description {
            ei.description = d;
        }
        if let Some(c) = component_id {
            ei.hms_type = Some(c.hms_type());
            ei.component_id = Some(c);
        }
        if let Some(ips) = ip_addresses {
            ei.ip_addresses = ips;
        }
        ei.last_update = Some(Utc::now());
        Ok(ei.clone())
    }

    async fn add_eth_interface_ip(
        &self,
        id: &str,
        ip: IpAddressMapping,
    ) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let ei = guard
            .eth_interfaces
            .get_mut(id)
            .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
        if ei.ip_addresses.iter().any(|e| e.ip_address == ip.ip_address) {
            return Err(HsmError::DuplicateKey(ip.ip_address));
        }
        ei.ip_addresses.push(ip);
        ei.last_update = Some(Utc::now());
        Ok(())
    }

    async fn update_eth_interface_ip(
        &self,
        id: &str,
        ip_address: &str,
        network: &str,
    ) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let ei = guard
            .eth_interfaces
            .get_mut(id)
            .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
        let entry = ei
            .ip_addresses
            .iter_mut()
            .find(|e| e.ip_address == ip_address)
            .ok_or_else(|| HsmError::NotFound(ip_address.to_string()))?;
        entry.network = network.to_string();
        ei.last_update = Some(Utc::now());
        Ok(())
    }

    async fn delete_eth_interface_ip(&self, id: &str, ip_address: &str) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let ei = guard
            .eth_interfaces
            .get_mut(id)
            .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
        let before = ei.ip_addresses.len();
        ei.ip_addresses.retain(|e| e.ip_address != ip_address);
        if ei.ip_addresses.len() == before {
            return Err(HsmError::NotFound(ip_address.to_string()));
        }
        ei.last_update = Some(Utc::now());
        Ok(())
    }

    async fn delete_eth_interface(&self, id: &str) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .eth_interfaces
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(id.to_string()))
    }

    async fn delete_eth_interfaces_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.eth_interfaces.len();
        guard.eth_interfaces.clear();
        Ok(n)
    }

    // ── Groups / partitions / memberships ───────────────────────────────────

    async fn get_group(&self, label: &str) -> Result<Option<Group>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.groups.get(label).cloned())
    }

    async fn get_groups(&self, tag: Option<&str>) -> Result<Vec<Group>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<Group> = guard
            .groups
            .values()
            .filter(|g| tag.map_or(true, |t| g.tags.iter().any(|gt| gt == t)))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(out)
    }

    async fn insert_group(&self, group: Group) -> Result<(), HsmError> {
        group.verify()?;
        let mut guard = self.inner.write().await;
        if guard.groups.contains_key(&group.label) {
            return Err(HsmError::DuplicateKey(group.label));
        }
        if !group.exclusive_group.is_empty() {
            for member in &group.members.ids {
                let clash = guard.groups.values().find(|g| {
                    g.exclusive_group == group.exclusive_group && g.members.ids.contains(member)
                });
                if clash.is_some() {
                    return Err(HsmError::ExclusiveGroup {
                        id: member.to_string(),
                        group: group.exclusive_group.clone(),
                    });
                }
            }
        }
        guard.groups.insert(group.label.clone(), group);
        Ok(())
    }

    async fn patch_group(
        &self,
        label: &str,
        description: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let g = guard
            .groups
            .get_mut(label)
            .ok_or_else(|| HsmError::NotFound(label.to_string()))?;
        if let Some(d) = description {
            g.description = d;
        }
        if let Some(t) = tags {
            g.tags = t;
        }
        Ok(())
    }

    async fn delete_group(&self, label: &str) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .groups
            .remove(label)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(label.to_string()))
    }

    async fn add_group_member(&self, label: &str, id: &Xname) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let exclusive = guard
            .groups
            .get(label)
            .ok_or_else(|| HsmError::NotFound(label.to_string()))?
            .exclusive_group
            .clone();
        if !exclusive.is_empty() {
            let clash = guard.groups.values().any(|g| {
                g.label != label && g.exclusive_group == exclusive && g.members.ids.contains(id)
            });
            if clash {
                return Err(HsmError::ExclusiveGroup {
                    id: id.to_string(),
                    group: exclusive,
                });
            }
        }
        let g = guard.groups.get_mut(label).expect("checked above");
        if g.members.ids.contains(id) {
            return Err(HsmError::DuplicateKey(id.to_string()));
        }
        g.members.ids.push(id.clone());
        g.members.ids.sort();
        Ok(())
    }

    async fn remove_group_member(&self, label: &str, id: &Xname) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let g = guard
            .groups
            .get_mut(label)
            .ok_or_else(|| HsmError::NotFound(label.to_string()))?;
        let before = g.members.ids.len();
        g.members.ids.retain(|m| m != id);
        if g.members.ids.len() == before {
            return Err(HsmError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get_partition(&self, name: &str) -> Result<Option<Partition>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.partitions.get(name).cloned())
    }

    async fn get_partitions(&self) -> Result<Vec<Partition>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<Partition> = guard.partitions.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn insert_partition(&self, partition: Partition) -> Result<(), HsmError> {
        partition.verify()?;
        let mut guard = self.inner.write().await;
        if guard.partitions.contains_key(&partition.name) {
            return Err(HsmError::DuplicateKey(partition.name));
        }
        for member in &partition.members.ids {
            if guard.partitions.values().any(|p| p.members.ids.contains(member)) {
                return Err(HsmError::ExclusivePartition(member.to_string()));
            }
        }
        guard.partitions.insert(partition.name.clone(), partition);
        Ok(())
    }

    async fn patch_partition(
        &self,
        name: &str,
        description: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let p = guard
            .partitions
            .get_mut(name)
            .ok_or_else(|| HsmError::NotFound(name.to_string()))?;
        if let Some(d) = description {
            p.description = d;
        }
        if let Some(t) = tags {
            p.tags = t;
        }
        Ok(())
    }

    async fn delete_partition(&self, name: &str) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .partitions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(name.to_string()))
    }

    async fn add_partition_member(&self, name: &str, id: &Xname) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        if !guard.partitions.contains_key(name) {
            return Err(HsmError::NotFound(name.to_string()));
        }
        let elsewhere = guard
            .partitions
            .values()
            .any(|p| p.name != name && p.members.ids.contains(id));
        if elsewhere {
            return Err(HsmError::ExclusivePartition(id.to_string()));
        }
        let p = guard.partitions.get_mut(name).expect("checked above");
        if p.members.ids.contains(id) {
            return Err(HsmError::DuplicateKey(id.to_string()));
        }
        p.members.ids.push(id.clone());
        p.members.ids.sort();
        Ok(())
    }

    async fn remove_partition_member(&self, name: &str, id: &Xname) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        let p = guard
            .partitions
            .get_mut(name)
            .ok_or_else(|| HsmError::NotFound(name.to_string()))?;
        let before = p.members.ids.len();
        p.members.ids.retain(|m| m != id);
        if p.members.ids.len() == before {
            return Err(HsmError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get_membership(&self, id: &Xname) -> Result<Membership, HsmError> {
        let guard = self.inner.read().await;
        if !guard.components.contains_key(id) {
            return Err(HsmError::NotFound(id.to_string()));
        }
        Ok(guard.membership_of(id))
    }

    async fn get_memberships(&self) -> Result<Vec<Membership>, HsmError> {
        let guard = self.inner.read().await;
        let mut ids: Vec<&Xname> = guard.components.keys().collect();
        ids.sort();
        Ok(ids.into_iter().map(|id| guard.membership_of(id)).collect())
    }

    // ── Power maps / node maps ──────────────────────────────────────────────

    async fn get_power_map(&self, id: &Xname) -> Result<Option<PowerMap>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.power_maps.get(id).cloned())
    }

    async fn get_power_maps(&self) -> Result<Vec<PowerMap>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<PowerMap> = guard.power_maps.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn upsert_power_map(&self, map: PowerMap) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard.power_maps.insert(map.id.clone(), map);
        Ok(())
    }

    async fn delete_power_map(&self, id: &Xname) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .power_maps
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(id.to_string()))
    }

    async fn delete_power_maps_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.power_maps.len();
        guard.power_maps.clear();
        Ok(n)
    }

    async fn get_node_map(&self, id: &Xname) -> Result<Option<NodeMap>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.node_maps.get(id).cloned())
    }

    async fn get_node_maps(&self) -> Result<Vec<NodeMap>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<NodeMap> = guard.node_maps.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn upsert_node_map(&self, map: NodeMap) -> Result<(), HsmError> {
        map.verify()?;
        let mut guard = self.inner.write().await;
        let clash = guard
            .node_maps
            .values()
            .any(|m| m.nid == map.nid && m.id != map.id);
        if clash {
            return Err(HsmError::DuplicateKey(format!("NID {}", map.nid)));
        }
        guard.node_maps.insert(map.id.clone(), map);
        Ok(())
    }

    async fn delete_node_map(&self, id: &Xname) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .node_maps
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(id.to_string()))
    }

    async fn delete_node_maps_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.node_maps.len();
        guard.node_maps.clear();
        Ok(n)
    }

    // ── Discovery status ────────────────────────────────────────────────────

    async fn get_discovery_status(&self, id: u32) -> Result<Option<DiscoveryStatus>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.discovery_status.get(&id).cloned())
    }

    async fn get_discovery_statuses(&self) -> Result<Vec<DiscoveryStatus>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<DiscoveryStatus> = guard.discovery_status.values().cloned().collect();
        out.sort_by_key(|s| s.id);
        Ok(out)
    }

    async fn upsert_discovery_status(&self, status: DiscoveryStatus) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard.discovery_status.insert(status.id, status);
        Ok(())
    }

    // ── SCN subscriptions ───────────────────────────────────────────────────

    async fn get_scn_subscription(&self, id: i64) -> Result<Option<ScnSubscription>, HsmError> {
        let guard = self.inner.read().await;
        Ok(guard.subscriptions.get(&id).cloned())
    }

    async fn get_scn_subscriptions(&self) -> Result<Vec<ScnSubscription>, HsmError> {
        let guard = self.inner.read().await;
        let mut out: Vec<ScnSubscription> = guard.subscriptions.values().cloned().collect();
        out.sort_by_key(|s| s.id);
        Ok(out)
    }

    async fn insert_scn_subscription(&self, mut sub: ScnSubscription) -> Result<i64, HsmError> {
        let mut guard = self.inner.write().await;
        guard.next_subscription_id += 1;
        let id = guard.next_subscription_id;
        sub.id = Some(id);
        guard.subscriptions.insert(id, sub);
        Ok(id)
    }

    async fn update_scn_subscription(
        &self,
        id: i64,
        mut sub: ScnSubscription,
    ) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        if !guard.subscriptions.contains_key(&id) {
            return Err(HsmError::NotFound(id.to_string()));
        }
        sub.id = Some(id);
        guard.subscriptions.insert(id, sub);
        Ok(())
    }

    async fn delete_scn_subscription(&self, id: i64) -> Result<(), HsmError> {
        let mut guard = self.inner.write().await;
        guard
            .subscriptions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(id.to_string()))
    }

    async fn delete_scn_subscriptions_all(&self) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let n = guard.subscriptions.len();
        guard.subscriptions.clear();
        Ok(n)
    }

    // ── Locks and reservations ──────────────────────────────────────────────

    async fn get_lock_states(
        &self,
        ids: &[Xname],
    ) -> Result<Vec<ComponentLockState>, HsmError> {
        let guard = self.inner.read().await;
        let now = Utc::now();
        let mut out = Vec::new();
        if ids.is_empty() {
            let mut comps: Vec<&Component> = guard.components.values().collect();
            comps.sort_by(|a, b| a.id.cmp(&b.id));
            for c in comps {
                out.push(guard.lock_state_of(c, now));
            }
        } else {
            for id in ids {
                let c = guard
                    .components
                    .get(id)
                    .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
                out.push(guard.lock_state_of(c, now));
            }
        }
        Ok(out)
    }

    async fn update_comp_locked(
        &self,
        ids: &[Xname],
        locked: bool,
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError> {
        let mut guard = self.inner.write().await;
        let now = Utc::now();
        let mut result = BatchResult::default();
        for id in ids {
            match guard.components.get(id) {
                None => result.failure.push((id.to_string(), FailReason::NotFound)),
                Some(c) if c.locked == locked => {
                    let reason =
                        if locked { FailReason::Locked } else { FailReason::Unlocked };
                    result.failure.push((id.to_string(), reason));
                }
                Some(c) if locked && guard.active_reservation(&c.id, now).is_some() => {
                    result.failure.push((id.to_string(), FailReason::Reserved));
                }
                Some(_) => result.success.push(id.clone()),
            }
        }
        if model == ProcessingModel::Rigid && !result.ok() {
            result.success.clear();
            return Ok(result);
        }
        for id in &result.success {
            let c = guard.components.get_mut(id).expect("validated above");
            c.locked = locked;
            c.flag = if locked { ComponentFlag::Locked } else { ComponentFlag::OK };
        }
        Ok(result)
    }

    async fn update_comp_reservation_disabled(
        &self,
        ids: &[Xname],
        disabled: bool,
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError> {
        let mut guard = self.inner.write().await;
        let mut result = BatchResult::default();
        for id in ids {
            match guard.components.get(id) {
                None => result.failure.push((id.to_string(), FailReason::NotFound)),
                Some(c) if c.reservation_disabled == disabled => {
                    let reason =
                        if disabled { FailReason::Disabled } else { FailReason::Enabled };
                    result.failure.push((id.to_string(), reason));
                }
                Some(_) => result.success.push(id.clone()),
            }
        }
        if model == ProcessingModel::Rigid && !result.ok() {
            result.success.clear();
            return Ok(result);
        }
        for id in &result.success {
            let c = guard.components.get_mut(id).expect("validated above");
            c.reservation_disabled = disabled;
            if disabled {
                // Disabling reservations evicts the current holder.
                guard.reservations.remove(id);
            }
        }
        Ok(result)
    }

    async fn create_reservations(
        &self,
        reservations: Vec<Reservation>,
        model: ProcessingModel,
    ) -> Result<(BatchResult, Vec<Reservation>), HsmError> {
        let mut guard = self.inner.write().await;
        let now = Utc::now();
        let mut result = BatchResult::default();
        let mut admitted = Vec::new();
        for res in reservations {
            let id = res.component_id.clone();
            match guard.components.get(&id) {
                None => result.failure.push((id.to_string(), FailReason::NotFound)),
                Some(c) if c.locked => {
                    result.failure.push((id.to_string(), FailReason::Locked))
                }
                Some(c) if c.reservation_disabled => {
                    result.failure.push((id.to_string(), FailReason::Disabled))
                }
                Some(_) if guard.active_reservation(&id, now).is_some() => {
                    result.failure.push((id.to_string(), FailReason::Reserved))
                }
                Some(_) => {
                    result.success.push(id);
                    admitted.push(res);
                }
            }
        }
        if model == ProcessingModel::Rigid && !result.ok() {
            result.success.clear();
            return Ok((result, Vec::new()));
        }
        for res in &admitted {
            guard.reservations.insert(res.component_id.clone(), res.clone());
        }
        Ok((result, admitted))
    }

    async fn renew_reservations(
        &self,
        reservation_keys: &[String],
        extend_by: Duration,
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError> {
        let mut guard = self.inner.write().await;
        let now = Utc::now();
        let mut result = BatchResult::default();
        let mut renewals: Vec<Xname> = Vec::new();
        for key in reservation_keys {
            let found = guard
                .reservations
                .values()
                .find(|r| r.reservation_key == *key)
                .cloned();
            match found {
                None => result.failure.push((key.clone(), FailReason::NotReserved)),
                Some(r) if r.is_expired(now) => {
                    result.failure.push((r.component_id.to_string(), FailReason::NotReserved))
                }
                // Indefinite reservations have nothing to renew.
                Some(r) if r.expiration_timestamp.is_none() => result
                    .failure
                    .push((r.component_id.to_string(), FailReason::ExpirationTimeRequired)),
                Some(r) => {
                    result.success.push(r.component_id.clone());
                    renewals.push(r.component_id);
                }
            }
        }
        if model == ProcessingModel::Rigid && !result.ok() {
            result.success.clear();
            return Ok(result);
        }
        for id in renewals {
            if let Some(r) = guard.reservations.get_mut(&id) {
                r.expiration_timestamp = Some(now + extend_by);
            }
        }
        Ok(result)
    }

    async fn check_reservations(
        &self,
        deputy_keys: &[String],
    ) -> Result<(Vec<ReservationCheck>, Vec<(String, FailReason)>), HsmError> {
        let guard = self.inner.read().await;
        let now = Utc::now();
        let mut success = Vec::new();
        let mut failure = Vec::new();
        for key in deputy_keys {
            let found = guard.reservations.values().find(|r| r.deputy_key == *key);
            match found {
                Some(r) if !r.is_expired(now) => success.push(ReservationCheck::from(r)),
                Some(r) => failure.push((r.component_id.to_string(), FailReason::NotReserved)),
                None => failure.push((key.clone(), FailReason::NotReserved)),
            }
        }
        Ok((success, failure))
    }

    async fn release_reservations(
        &self,
        reservation_keys: &[String],
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError> {
        let mut guard = self.inner.write().await;
        let now = Utc::now();
        let mut result = BatchResult::default();
        let mut to_remove = Vec::new();
        for key in reservation_keys {
            let found = guard
                .reservations
                .values()
                .find(|r| r.reservation_key == *key)
                .cloned();
            match found {
                None => result.failure.push((key.clone(), FailReason::NotReserved)),
                Some(r) if r.is_expired(now) => {
                    result.failure.push((r.component_id.to_string(), FailReason::NotReserved))
                }
                Some(r) => {
                    result.success.push(r.component_id.clone());
                    to_remove.push(r.component_id);
                }
            }
        }
        if model == ProcessingModel::Rigid && !result.ok() {
            result.success.clear();
            return Ok(result);
        }
        for id in to_remove {
            guard.reservations.remove(&id);
        }
        Ok(result)
    }

    async fn release_reservations_force(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
    ) -> Result<BatchResult, HsmError> {
        let mut guard = self.inner.write().await;
        let now = Utc::now();
        let mut result = BatchResult::default();
        for id in ids {
            if guard.active_reservation(id, now).is_some() {
                result.success.push(id.clone());
            } else {
                result.failure.push((id.to_string(), FailReason::NotReserved));
            }
        }
        if model == ProcessingModel::Rigid && !result.ok() {
            result.success.clear();
            return Ok(result);
        }
        for id in &result.success {
            guard.reservations.remove(id);
        }
        Ok(result)
    }

    async fn expire_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Xname>, HsmError> {
        let mut guard = self.inner.write().await;
        let expired: Vec<Xname> = guard
            .reservations
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.component_id.clone())
            .collect();
        for id in &expired {
            guard.reservations.remove(id);
        }
        Ok(expired)
    }

    // ── Compound ────────────────────────────────────────────────────────────

    async fn update_all_for_rf_endpoint(
        &self,
        ep: RedfishEndpoint,
        comp_endpoints: Vec<ComponentEndpoint>,
        hw_locs: Vec<HwInvByLoc>,
        components: Vec<Component>,
        service_endpoints: Vec<ServiceEndpoint>,
        eth_interfaces: Vec<CompEthInterface>,
    ) -> Result<Vec<ComponentChange>, HsmError> {
        let mut guard = self.inner.write().await;

        // Validate everything before touching any table so the commit is
        // all-or-nothing even in-memory.
        for loc in &hw_locs {
            loc.verify()?;
        }
        let mut eis = Vec::with_capacity(eth_interfaces.len());
        let now = Utc::now();
        for mut ei in eth_interfaces {
            ei.id = hsm_domain::mac_to_eth_interface_id(&ei.mac_addr)?;
            ei.last_update = Some(now);
            eis.push(ei);
        }

        let mut changes = Vec::new();
        let mut staged: Vec<Component> = Vec::with_capacity(components.len());
        for c in components {
            c.verify()?;
            staged.push(c);
        }

        guard.rf_endpoints.insert(ep.id.clone(), ep);
        for c in staged {
            if let Some(change) = guard.upsert_component(c)? {
                changes.push(change);
            }
        }
        for ce in comp_endpoints {
            guard.comp_endpoints.insert(ce.id.clone(), ce);
        }
        for loc in hw_locs {
            if let Some(fru) = &loc.populated_fru {
                guard.hw_frus.insert(fru.fru_id.clone(), fru.clone());
            }
            guard.hw_locs.insert(loc.id.clone(), loc);
        }
        for se in service_endpoints {
            guard
                .service_endpoints
                .insert((se.rf_endpoint_id.clone(), se.service), se);
        }
        for ei in eis {
            guard.eth_interfaces.insert(ei.id.clone(), ei);
        }
        Ok(changes)
    }

    async fn reset_stale_discoveries(&self, stale_after: Duration) -> Result<usize, HsmError> {
        let mut guard = self.inner.write().await;
        let cutoff = Utc::now() - stale_after;
        let mut reset = 0;
        for ep in guard.rf_endpoints.values_mut() {
            if ep.discovery_info.last_status.is_in_flight()
                && ep.discovery_info.last_attempt.map_or(true, |t| t < cutoff)
            {
                ep.discovery_info.last_status = EndpointStatus::NotYetQueried;
                reset += 1;
            }
        }
        for st in guard.discovery_status.values_mut() {
            if st.status == hsm_domain::DiscoveryState::InProgress && st.last_update < cutoff {
                st.status = hsm_domain::DiscoveryState::NotStarted;
                st.last_update = Utc::now();
            }
        }
        Ok(reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_domain::{verify_reservation_duration, HwFruInfo, HwLocInfo, StdLocationInfo};

    fn node(id: &str, state: ComponentState) -> Component {
        Component::new(Xname::parse(id).unwrap(), state)
    }

    fn bmc_endpoint(id: &str) -> RedfishEndpoint {
        let mut ep: RedfishEndpoint = serde_json::from_value(serde_json::json!({
            "ID": id,
            "Type": "NodeBMC",
            "FQDN": format!("{}.local", id),
        }))
        .unwrap();
        ep.normalize().unwrap();
        ep
    }

    fn reservation(id: &str, minutes: Option<u32>) -> Reservation {
        let now = Utc::now();
        Reservation {
            component_id: Xname::parse(id).unwrap(),
            deputy_key: format!("{}:dk:{}", id, uuid::Uuid::new_v4()),
            reservation_key: format!("{}:rk:{}", id, uuid::Uuid::new_v4()),
            create_timestamp: now,
            expiration_timestamp: minutes
                .map(|m| now + verify_reservation_duration(m).unwrap()),
        }
    }

    #[tokio::test]
    async fn upsert_and_filter_components() {
        let store = InMemoryStore::new();
        store
            .upsert_components(vec![
                node("x0c0s0b0n0", ComponentState::On),
                node("x0c0s1b0n0", ComponentState::Off),
            ])
            .await
            .unwrap();

        let f = ComponentFilter { state: vec!["on".to_string()], ..Default::default() };
        let on = store.get_components(&f).await.unwrap();
        assert_eq!(on.len(), 1);
        assert_eq!(on[0].id.as_str(), "x0c0s0b0n0");
    }

    #[tokio::test]
    async fn nid_uniqueness_enforced() {
        let store = InMemoryStore::new();
        let mut a = node("x0c0s0b0n0", ComponentState::On);
        a.nid = Some(1);
        store.upsert_components(vec![a]).await.unwrap();

        let mut b = node("x0c0s0b1n0", ComponentState::On);
        b.nid = Some(1);
        let err = store.upsert_components(vec![b]).await.unwrap_err();
        assert!(matches!(err, HsmError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn state_update_resets_flag_and_reports_change() {
        let store = InMemoryStore::new();
        let mut c = node("x0c0s27b0n0", ComponentState::On);
        c.flag = ComponentFlag::Warning;
        store.upsert_components(vec![c]).await.unwrap();

        let ids = [Xname::parse("x0c0s27b0n0").unwrap()];
        let changes = store
            .update_component_state(&ids, ComponentState::Off, None, false)
            .await
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new.state, ComponentState::Off);
        assert_eq!(changes[0].new.flag, ComponentFlag::OK);

        // Idempotent repeat: no change reported.
        let changes = store
            .update_component_state(&ids, ComponentState::Off, None, false)
            .await
            .unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn discovery_mutex_admits_one_winner() {
        let store = InMemoryStore::new();
        store.insert_rf_endpoint(bmc_endpoint("x0c0s14b0")).await.unwrap();
        let ids = [Xname::parse("x0c0s14b0").unwrap()];

        let first = store.update_rf_endpoints_for_discover(&ids, false).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = store.update_rf_endpoints_for_discover(&ids, false).await.unwrap();
        assert!(second.is_empty(), "second concurrent discover must be shut out");
        let forced = store.update_rf_endpoints_for_discover(&ids, true).await.unwrap();
        assert_eq!(forced.len(), 1);
    }

    #[tokio::test]
    async fn rf_endpoint_delete_cascades_but_keeps_components() {
        let store = InMemoryStore::new();
        let ep = bmc_endpoint("x0c0s14b0");
        let n = node("x0c0s14b0n0", ComponentState::Ready);
        let ce = ComponentEndpoint {
            id: Xname::parse("x0c0s14b0n0").unwrap(),
            hms_type: hsm_domain::HmsType::Node,
            redfish_type: "ComputerSystem".to_string(),
            redfish_subtype: "Physical".to_string(),
            mac_addr: "a4:bf:01:2e:7f:aa".to_string(),
            uuid: String::new(),
            odata_id: "/redfish/v1/Systems/1".to_string(),
            rf_endpoint_id: Xname::parse("x0c0s14b0").unwrap(),
            rf_endpoint_fqdn: String::new(),
            redfish_url: String::new(),
            info: hsm_domain::ComponentEndpointInfo::System {
                info: Default::default(),
            },
        };
        let mut ei = CompEthInterface::from_mac("a4:bf:01:2e:7f:aa").unwrap();
        ei.component_id = Some(Xname::parse("x0c0s14b0n0").unwrap());
        let loc = HwInvByLoc {
            id: Xname::parse("x0c0s14b0n0").unwrap(),
            hms_type: hsm_domain::HmsType::Node,
            ordinal: 0,
            status: HwInvByLoc::STATUS_EMPTY.to_string(),
            info: HwLocInfo::for_type(hsm_domain::HmsType::Node, StdLocationInfo::default())
                .unwrap(),
            populated_fru: None,
        };
        store
            .update_all_for_rf_endpoint(ep, vec![ce], vec![loc], vec![n], vec![], vec![ei])
            .await
            .unwrap();

        let id = Xname::parse("x0c0s14b0").unwrap();
        let deletion = store.delete_rf_endpoint(&id).await.unwrap();
        assert_eq!(deletion.component_endpoints.len(), 1);

        // Component survives, marked Empty; everything else under it is gone.
        let c = store
            .get_component(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(c.state, ComponentState::Empty);
        assert!(store
            .get_comp_endpoint(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .is_none());
        assert!(store.get_eth_interface("a4bf012e7faa").await.unwrap().is_none());
        assert!(store
            .get_hw_loc(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn exclusive_group_membership_rejected() {
        let store = InMemoryStore::new();
        store.upsert_components(vec![node("x0c0s0b0n0", ComponentState::On)]).await.unwrap();
        let member = Xname::parse("x0c0s0b0n0").unwrap();

        let mk = |label: &str| Group {
            label: label.to_string(),
            description: String::new(),
            tags: vec![],
            exclusive_group: "colors".to_string(),
            members: Default::default(),
        };
        store.insert_group(mk("blue")).await.unwrap();
        store.insert_group(mk("red")).await.unwrap();

        store.add_group_member("blue", &member).await.unwrap();
        let err = store.add_group_member("red", &member).await.unwrap_err();
        assert!(matches!(err, HsmError::ExclusiveGroup { .. }));
    }

    #[tokio::test]
    async fn partition_membership_is_exclusive() {
        let store = InMemoryStore::new();
        let member = Xname::parse("x0c0s0b0n0").unwrap();
        let mk = |name: &str| Partition {
            name: name.to_string(),
            description: String::new(),
            tags: vec![],
            members: Default::default(),
        };
        store.insert_partition(mk("p1")).await.unwrap();
        store.insert_partition(mk("p2")).await.unwrap();
        store.add_partition_member("p1", &member).await.unwrap();
        let err = store.add_partition_member("p2", &member).await.unwrap_err();
        assert!(matches!(err, HsmError::ExclusivePartition(_)));
    }

    #[tokio::test]
    async fn reservation_lifecycle() {
        let store = InMemoryStore::new();
        store.upsert_components(vec![node("x3000c0s9b0n0", ComponentState::On)]).await.unwrap();

        let res = reservation("x3000c0s9b0n0", Some(5));
        let rk = res.reservation_key.clone();
        let dk = res.deputy_key.clone();
        let (result, created) = store
            .create_reservations(vec![res], ProcessingModel::Flexible)
            .await
            .unwrap();
        assert_eq!(result.success.len(), 1);
        assert_eq!(created.len(), 1);

        // Second reservation on the same component fails Reserved.
        let (result, _) = store
            .create_reservations(
                vec![reservation("x3000c0s9b0n0", Some(5))],
                ProcessingModel::Flexible,
            )
            .await
            .unwrap();
        assert_eq!(result.failure.len(), 1);
        assert_eq!(result.failure[0].1, FailReason::Reserved);

        // Deputy check returns data without the reservation key.
        let (checks, fails) = store.check_reservations(&[dk]).await.unwrap();
        assert_eq!(checks.len(), 1);
        assert!(fails.is_empty());

        // Renewal extends, release frees.
        let renewed = store
            .renew_reservations(&[rk.clone()], Duration::minutes(10), ProcessingModel::Rigid)
            .await
            .unwrap();
        assert!(renewed.ok());
        let released = store
            .release_reservations(&[rk], ProcessingModel::Rigid)
            .await
            .unwrap();
        assert!(released.ok());
        let states = store
            .get_lock_states(&[Xname::parse("x3000c0s9b0n0").unwrap()])
            .await
            .unwrap();
        assert!(!states[0].reserved);
    }

    #[tokio::test]
    async fn rigid_lock_batch_is_all_or_nothing() {
        let store = InMemoryStore::new();
        store.upsert_components(vec![node("x0c0s0b0n0", ComponentState::On)]).await.unwrap();
        let ids = [
            Xname::parse("x0c0s0b0n0").unwrap(),
            Xname::parse("x0c0s1b0n0").unwrap(), // does not exist
        ];
        let result = store
            .update_comp_locked(&ids, true, ProcessingModel::Rigid)
            .await
            .unwrap();
        assert!(result.success.is_empty());
        assert_eq!(result.failure.len(), 1);

        // Nothing was applied.
        let c = store.get_component(&ids[0]).await.unwrap().unwrap();
        assert!(!c.locked);
    }

    #[tokio::test]
    async fn locked_flag_invariant() {
        let store = InMemoryStore::new();
        store.upsert_components(vec![node("x0c0s0b0n0", ComponentState::On)]).await.unwrap();
        let ids = [Xname::parse("x0c0s0b0n0").unwrap()];
        store.update_comp_locked(&ids, true, ProcessingModel::Rigid).await.unwrap();
        let c = store.get_component(&ids[0]).await.unwrap().unwrap();
        assert!(c.locked);
        assert_eq!(c.flag, ComponentFlag::Locked);

        store.update_comp_locked(&ids, false, ProcessingModel::Rigid).await.unwrap();
        let c = store.get_component(&ids[0]).await.unwrap().unwrap();
        assert!(!c.locked);
        assert_eq!(c.flag, ComponentFlag::OK);
    }

    #[tokio::test]
    async fn expire_reservations_frees_components() {
        let store = InMemoryStore::new();
        store.upsert_components(vec![node("x0c0s0b0n0", ComponentState::On)]).await.unwrap();
        let mut res = reservation("x0c0s0b0n0", Some(1));
        res.expiration_timestamp = Some(Utc::now() - Duration::minutes(1));
        store
            .create_reservations(vec![res], ProcessingModel::Rigid)
            .await
            .unwrap();

        let expired = store.expire_reservations(Utc::now()).await.unwrap();
        assert_eq!(expired.len(), 1);
        let states = store
            .get_lock_states(&[Xname::parse("x0c0s0b0n0").unwrap()])
            .await
            .unwrap();
        assert!(!states[0].reserved);
    }

    #[tokio::test]
    async fn nodemap_nid_conflict() {
        let store = InMemoryStore::new();
        let a = NodeMap {
            id: Xname::parse("x0c0s0b0n0").unwrap(),
            nid: 1,
            role: Some("Compute".to_string()),
            sub_role: None,
        };
        store.upsert_node_map(a).await.unwrap();

        let b = NodeMap {
            id: Xname::parse("x0c0s0b1n0").unwrap(),
            nid: 1,
            role: None,
            sub_role: None,
        };
        let err = store.upsert_node_map(b).await.unwrap_err();
        assert!(matches!(err, HsmError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn discovery_owned_state_upsert_preserves_lock_fields() {
        let store = InMemoryStore::new();
        store.upsert_components(vec![node("x0c0s0b0n0", ComponentState::On)]).await.unwrap();
        let ids = [Xname::parse("x0c0s0b0n0").unwrap()];
        store.update_comp_locked(&ids, true, ProcessingModel::Rigid).await.unwrap();

        // A rediscovery upsert must not clobber the lock.
        store.upsert_components(vec![node("x0c0s0b0n0", ComponentState::Ready)]).await.unwrap();
        let c = store.get_component(&ids[0]).await.unwrap().unwrap();
        assert!(c.locked);
        assert_eq!(c.state, ComponentState::Ready);
    }

    #[tokio::test]
    async fn last_hw_hist_picks_most_recent() {
        let store = InMemoryStore::new();
        let id = Xname::parse("x0c0s0b0n0").unwrap();
        let now = Utc::now();
        store
            .append_hw_hist(vec![
                HwInvHist {
                    id: id.clone(),
                    fru_id: "OLD".to_string(),
                    timestamp: now - Duration::hours(1),
                    event_type: hsm_domain::HwInvHistEventType::Detected,
                },
                HwInvHist {
                    id: id.clone(),
                    fru_id: "NEW".to_string(),
                    timestamp: now,
                    event_type: hsm_domain::HwInvHistEventType::Detected,
                },
            ])
            .await
            .unwrap();
        let last = store.last_hw_hist_for(&[id]).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].1.fru_id, "NEW");
    }

    #[tokio::test]
    async fn fru_records_created_from_populated_locations() {
        let store = InMemoryStore::new();
        let fru = HwInvByFru {
            fru_id: "CRAY-100-SN1".to_string(),
            hms_type: hsm_domain::HmsType::Node,
            subtype: String::new(),
            info: HwFruInfo::for_type(hsm_domain::HmsType::Node, Default::default()).unwrap(),
        };
        let loc = HwInvByLoc {
            id: Xname::parse("x0c0s0b0n0").unwrap(),
            hms_type: hsm_domain::HmsType::Node,
            ordinal: 0,
            status: HwInvByLoc::STATUS_POPULATED.to_string(),
            info: HwLocInfo::for_type(hsm_domain::HmsType::Node, StdLocationInfo::default())
                .unwrap(),
            populated_fru: Some(fru),
        };
        store.upsert_hw_locs(vec![loc]).await.unwrap();
        assert!(store.get_hw_fru("CRAY-100-SN1").await.unwrap().is_some());
    }
}
