use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hsm_domain::{
    ComponentState, DiscoveryState, DiscoveryStatus, EndpointStatus, HmsType, HsmError,
    NodeMap, RedfishEndpoint, Xname,
};
use hsm_redfish::{discover_endpoint, RedfishClient, RedfishEndpointTree, RedfishEpDescription};
use hsm_scn::ScnEngine;
use hsm_store::{HsmStore, RfEndpointFilter};
use hsm_vault::{CompCredentials, CredentialVault};
use tracing::{debug, info, warn};

use crate::heartbeat::HeartbeatClient;
use crate::history::generate_history;
use crate::translate::build_entities;

#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// Per-request deadline against a BMC.
    pub http_timeout: Duration,
    /// Read endpoint credentials from the vault before dialing.
    pub read_vault: bool,
    /// Write per-component credentials back after a successful pass.
    pub write_vault: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        DiscoverySettings {
            http_timeout: Duration::from_secs(40),
            read_vault: true,
            write_vault: true,
        }
    }
}

/// The discovery orchestrator: drives the Redfish adapter concurrently over
/// a set of endpoints and lands the results in the store.
#[derive(Clone)]
pub struct DiscoverySvc {
    store: Arc<dyn HsmStore>,
    vault: Arc<dyn CredentialVault>,
    heartbeat: Arc<dyn HeartbeatClient>,
    scn: Arc<ScnEngine>,
    settings: DiscoverySettings,
}

impl DiscoverySvc {
    pub fn new(
        store: Arc<dyn HsmStore>,
        vault: Arc<dyn CredentialVault>,
        heartbeat: Arc<dyn HeartbeatClient>,
        scn: Arc<ScnEngine>,
        settings: DiscoverySettings,
    ) -> Self {
        DiscoverySvc { store, vault, heartbeat, scn, settings }
    }

    /// Discover a set of endpoints (all when `ids` is empty).
    ///
    /// Acquires the per-endpoint discovery slot first; endpoints already
    /// under discovery are skipped unless `force`. One task is spawned per
    /// acquired endpoint, failures isolated per endpoint. Returns how many
    /// endpoints were actually discovered.
    pub async fn discover_from_endpoints(
        &self,
        ids: &[Xname],
        status_id: u32,
        update: bool,
        force: bool,
    ) -> Result<usize, HsmError> {
        let candidates: Vec<RedfishEndpoint> = if ids.is_empty() {
            self.store.get_rf_endpoints(&RfEndpointFilter::default()).await?
        } else {
            let mut eps = Vec::new();
            for id in ids {
                match self.store.get_rf_endpoint(id).await? {
                    Some(ep) => eps.push(ep),
                    None => return Err(HsmError::NotFound(id.to_string())),
                }
            }
            eps
        };

        let eligible: Vec<Xname> = candidates
            .iter()
            .filter(|ep| ep.enabled && (!update || ep.rediscover_on_update))
            .map(|ep| ep.id.clone())
            .collect();
        if eligible.len() < candidates.len() {
            debug!(
                skipped = candidates.len() - eligible.len(),
                "endpoints filtered out (disabled or RediscoverOnUpdate unset)"
            );
        }

        let acquired = self
            .store
            .update_rf_endpoints_for_discover(&eligible, force)
            .await?;
        if acquired.len() < eligible.len() {
            info!(
                skipped = eligible.len() - acquired.len(),
                "endpoints already under discovery, skipped"
            );
        }
        if acquired.is_empty() {
            return Ok(0);
        }

        self.store
            .upsert_discovery_status(DiscoveryStatus::new(status_id, DiscoveryState::InProgress))
            .await?;
        info!(count = acquired.len(), status_id, "discovery started");

        let mut handles = Vec::with_capacity(acquired.len());
        for ep in acquired {
            let svc = self.clone();
            handles.push(tokio::spawn(async move {
                let id = ep.id.clone();
                if let Err(e) = svc.discover_one(ep).await {
                    warn!(endpoint = %id, error = %e, "endpoint discovery failed");
                }
            }));
        }
        let count = handles.len();
        for handle in handles {
            // A panicked task only loses its own endpoint.
            if let Err(e) = handle.await {
                warn!(error = %e, "discovery task aborted");
            }
        }

        self.store
            .upsert_discovery_status(DiscoveryStatus::new(status_id, DiscoveryState::Complete))
            .await?;
        info!(status_id, "discovery complete");
        Ok(count)
    }

    /// Single-endpoint variant.
    pub async fn discover_endpoint_by_id(
        &self,
        id: &Xname,
        status_id: u32,
        force: bool,
    ) -> Result<usize, HsmError> {
        self.discover_from_endpoints(std::slice::from_ref(id), status_id, false, force)
            .await
    }

    async fn discover_one(&self, ep: RedfishEndpoint) -> Result<(), HsmError> {
        let creds = if self.settings.read_vault {
            match self.vault.get_comp_cred(&ep.id).await {
                Ok(c) => Some(c),
                Err(e) => {
                    debug!(endpoint = %ep.id, error = %e, "no vault credentials, using record user");
                    None
                }
            }
        } else {
            None
        };
        let username = creds.as_ref().map(|c| c.username.clone()).unwrap_or_else(|| ep.user.clone());
        let password = creds.as_ref().map(|c| c.password.clone()).unwrap_or_default();

        let desc = RedfishEpDescription {
            id: ep.id.clone(),
            hms_type: ep.hms_type,
            fqdn: ep.fqdn.clone(),
            enabled: ep.enabled,
        };
        let tree = match RedfishClient::new(&ep.fqdn, &username, &password, self.settings.http_timeout)
        {
            Ok(client) => discover_endpoint(desc, &client).await,
            Err(e) => {
                warn!(endpoint = %ep.id, error = %e, "redfish client build failed");
                let mut info = ep.discovery_info.clone();
                info.last_status = EndpointStatus::UnexpectedErrorPreStore;
                return self.store.update_rf_endpoint_discovery_info(&ep.id, info).await;
            }
        };
        self.update_from_redfish_endpoint(tree, creds).await
    }

    /// Land one endpoint's discovery result in the store, then run the
    /// post-commit chain: SCN fan-out, vault writeback, inventory history.
    pub async fn update_from_redfish_endpoint(
        &self,
        tree: RedfishEndpointTree,
        creds: Option<CompCredentials>,
    ) -> Result<(), HsmError> {
        let id = tree.endpoint.id.clone();
        let mut ep = self
            .store
            .get_rf_endpoint(&id)
            .await?
            .ok_or_else(|| HsmError::NotFound(id.to_string()))?;
        ep.discovery_info.last_attempt = Some(Utc::now());

        // Unsupported / disabled / failed endpoints write bookkeeping only.
        if tree.last_status != EndpointStatus::DiscoverOK {
            ep.discovery_info.last_status = tree.last_status;
            return self
                .store
                .update_rf_endpoint_discovery_info(&id, ep.discovery_info)
                .await;
        }

        if !tree.uuid.is_empty() {
            ep.uuid = tree.uuid.clone();
        }

        let node_maps: HashMap<Xname, NodeMap> = self
            .store
            .get_node_maps()
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();

        let mut slices = build_entities(&tree, &ep, &node_maps);

        // The parent keeps DiscoverOK only when something real was stored;
        // a root that answered but yielded nothing usable is an error.
        if slices.hw_locs.is_empty() || slices.components.is_empty() {
            warn!(endpoint = %id, "discovery produced no usable components");
            ep.discovery_info.last_status = EndpointStatus::UnexpectedErrorPreStore;
            return self
                .store
                .update_rf_endpoint_discovery_info(&id, ep.discovery_info)
                .await;
        }

        self.promote_heartbeating_nodes(&mut slices.components).await;

        ep.discovery_info.last_status = EndpointStatus::DiscoverOK;
        ep.discovery_info.last_discovery = Some(Utc::now());

        let comp_endpoint_ids: Vec<Xname> =
            slices.comp_endpoints.iter().map(|ce| ce.id.clone()).collect();
        let hw_locs = slices.hw_locs.clone();

        let changes = match self
            .store
            .update_all_for_rf_endpoint(
                ep.scrubbed(),
                slices.comp_endpoints,
                slices.hw_locs,
                slices.components,
                slices.service_endpoints,
                slices.eth_interfaces,
            )
            .await
        {
            Ok(changes) => changes,
            Err(e) => {
                warn!(endpoint = %id, error = %e, "store commit failed");
                let mut info = ep.discovery_info.clone();
                info.last_status = EndpointStatus::StoreFailed;
                self.store.update_rf_endpoint_discovery_info(&id, info).await?;
                return Err(e);
            }
        };

        // SCNs go out strictly after the commit.
        self.scn.enqueue_changes(&changes).await;

        if self.settings.write_vault {
            if let Some(creds) = &creds {
                for ce_id in &comp_endpoint_ids {
                    let cred = CompCredentials {
                        xname: ce_id.to_string(),
                        username: creds.username.clone(),
                        password: creds.password.clone(),
                        url: format!("{}/redfish/v1", ep.fqdn),
                    };
                    if let Err(e) = self.vault.store_comp_cred(cred).await {
                        warn!(xname = %ce_id, error = %e, "vault writeback failed");
                    }
                }
            }
        }

        generate_history(self.store.as_ref(), &hw_locs).await?;
        info!(endpoint = %id, changed = changes.len(), "endpoint discovery stored");
        Ok(())
    }

    /// Nodes discovered `On` that are actively heartbeating are promoted to
    /// `Ready` before commit.
    async fn promote_heartbeating_nodes(&self, components: &mut [hsm_domain::Component]) {
        let on_nodes: Vec<Xname> = components
            .iter()
            .filter(|c| c.hms_type == HmsType::Node && c.state == ComponentState::On)
            .map(|c| c.id.clone())
            .collect();
        if on_nodes.is_empty() {
            return;
        }
        let statuses = match self.heartbeat.get_heartbeat_status(&on_nodes).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, "heartbeat query failed, skipping promotion");
                return;
            }
        };
        for status in statuses.iter().filter(|s| s.heartbeating) {
            if let Some(c) = components.iter_mut().find(|c| c.id.as_str() == status.xname) {
                c.state = ComponentState::Ready;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hsm_domain::{EndpointStatus, EthernetNicInfo, FruIdentity, StdLocationInfo};
    use hsm_redfish::{ComponentDetail, DiscoveredComponent, RfResourceKind};
    use hsm_store::{HwInvHistFilter, InMemoryStore};
    use hsm_vault::MemoryVault;

    use crate::heartbeat::{HeartbeatError, HeartbeatStatus, NoopHeartbeatClient};

    struct AlwaysBeating;

    #[async_trait]
    impl HeartbeatClient for AlwaysBeating {
        async fn get_heartbeat_status(
            &self,
            xnames: &[Xname],
        ) -> Result<Vec<HeartbeatStatus>, HeartbeatError> {
            Ok(xnames
                .iter()
                .map(|x| HeartbeatStatus { xname: x.to_string(), heartbeating: true })
                .collect())
        }
    }

    fn endpoint(id: &str) -> RedfishEndpoint {
        let mut ep: RedfishEndpoint = serde_json::from_value(serde_json::json!({
            "ID": id,
            "Type": "NodeBMC",
            "FQDN": "127.0.0.1:9",
            "RediscoverOnUpdate": true,
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
            location_info: StdLocationInfo::default(),
            fru_identity: FruIdentity::default(),
            fru_id: fru.map(|s| s.to_string()),
            ethernet_nics: vec![EthernetNicInfo {
                redfish_id: "1".to_string(),
                odata_id: String::new(),
                description: String::new(),
                mac_address: "a4:bf:01:2e:7f:aa".to_string(),
                permanent_mac_address: String::new(),
            }],
            actions: None,
            detail: ComponentDetail::default(),
        }
    }

    fn tree_for(ep: &RedfishEndpoint, components: Vec<DiscoveredComponent>) -> RedfishEndpointTree {
        RedfishEndpointTree {
            endpoint: RedfishEpDescription {
                id: ep.id.clone(),
                hms_type: ep.hms_type,
                fqdn: ep.fqdn.clone(),
                enabled: ep.enabled,
            },
            last_status: EndpointStatus::DiscoverOK,
            redfish_version: "1.7.0".to_string(),
            uuid: String::new(),
            services: Vec::new(),
            components,
        }
    }

    fn svc(
        store: Arc<InMemoryStore>,
        heartbeat: Arc<dyn HeartbeatClient>,
    ) -> (DiscoverySvc, tokio::sync::mpsc::Receiver<hsm_scn::ScnJob>) {
        let (scn, rx) = ScnEngine::new(64);
        (
            DiscoverySvc::new(
                store,
                Arc::new(MemoryVault::new()),
                heartbeat,
                scn,
                DiscoverySettings {
                    http_timeout: Duration::from_secs(1),
                    ..Default::default()
                },
            ),
            rx,
        )
    }

    #[tokio::test]
    async fn successful_tree_lands_all_slices() {
        let store = Arc::new(InMemoryStore::new());
        let ep = endpoint("x0c0s14b0");
        store.insert_rf_endpoint(ep.clone()).await.unwrap();
        let (svc, mut rx) = svc(store.clone(), Arc::new(NoopHeartbeatClient));

        let tree = tree_for(&ep, vec![node_component("x0c0s14b0n0", "On", Some("CRAY-1-SN1"))]);
        svc.update_from_redfish_endpoint(tree, None).await.unwrap();

        let node = store
            .get_component(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .expect("node stored");
        assert_eq!(node.state, ComponentState::On);

        let stored_ep = store.get_rf_endpoint(&ep.id).await.unwrap().unwrap();
        assert_eq!(stored_ep.discovery_info.last_status, EndpointStatus::DiscoverOK);
        assert!(stored_ep.discovery_info.last_discovery.is_some());

        // SCN enqueued for the new state after commit.
        let job = rx.try_recv().expect("scn job");
        assert_eq!(job.payload.state.as_deref(), Some("On"));

        // History written for the FRU-bearing location.
        let hist = store.get_hw_hist(&HwInvHistFilter::default()).await.unwrap();
        assert_eq!(hist.len(), 1);
    }

    #[tokio::test]
    async fn rediscovery_writes_no_new_history() {
        let store = Arc::new(InMemoryStore::new());
        let ep = endpoint("x0c0s14b0");
        store.insert_rf_endpoint(ep.clone()).await.unwrap();
        let (svc, _rx) = svc(store.clone(), Arc::new(NoopHeartbeatClient));

        let mk = || tree_for(&ep, vec![node_component("x0c0s14b0n0", "On", Some("CRAY-1-SN1"))]);
        svc.update_from_redfish_endpoint(mk(), None).await.unwrap();
        svc.update_from_redfish_endpoint(mk(), None).await.unwrap();

        let hist = store.get_hw_hist(&HwInvHistFilter::default()).await.unwrap();
        assert_eq!(hist.len(), 1, "idempotent rediscovery must not append");
    }

    #[tokio::test]
    async fn heartbeating_nodes_promoted_to_ready() {
        let store = Arc::new(InMemoryStore::new());
        let ep = endpoint("x0c0s14b0");
        store.insert_rf_endpoint(ep.clone()).await.unwrap();
        let (svc, _rx) = svc(store.clone(), Arc::new(AlwaysBeating));

        let tree = tree_for(&ep, vec![node_component("x0c0s14b0n0", "On", None)]);
        svc.update_from_redfish_endpoint(tree, None).await.unwrap();

        let node = store
            .get_component(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.state, ComponentState::Ready);
    }

    #[tokio::test]
    async fn failed_endpoint_writes_bookkeeping_only() {
        let store = Arc::new(InMemoryStore::new());
        let ep = endpoint("x0c0s14b0");
        store.insert_rf_endpoint(ep.clone()).await.unwrap();
        let (svc, _rx) = svc(store.clone(), Arc::new(NoopHeartbeatClient));

        let mut tree = tree_for(&ep, vec![]);
        tree.last_status = EndpointStatus::HttpsGetFailed;
        svc.update_from_redfish_endpoint(tree, None).await.unwrap();

        let stored = store.get_rf_endpoint(&ep.id).await.unwrap().unwrap();
        assert_eq!(stored.discovery_info.last_status, EndpointStatus::HttpsGetFailed);
        assert!(store
            .get_component(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn empty_tree_is_unexpected_error() {
        let store = Arc::new(InMemoryStore::new());
        let ep = endpoint("x0c0s14b0");
        store.insert_rf_endpoint(ep.clone()).await.unwrap();
        let (svc, _rx) = svc(store.clone(), Arc::new(NoopHeartbeatClient));

        // Root answered but nothing usable underneath.
        let tree = tree_for(&ep, vec![]);
        svc.update_from_redfish_endpoint(tree, None).await.unwrap();

        let stored = store.get_rf_endpoint(&ep.id).await.unwrap().unwrap();
        assert_eq!(
            stored.discovery_info.last_status,
            EndpointStatus::UnexpectedErrorPreStore
        );
    }

    #[tokio::test]
    async fn vault_writeback_covers_component_endpoints() {
        let store = Arc::new(InMemoryStore::new());
        let ep = endpoint("x0c0s14b0");
        store.insert_rf_endpoint(ep.clone()).await.unwrap();
        let vault = Arc::new(MemoryVault::new());
        let (scn, _rx) = ScnEngine::new(64);
        let svc = DiscoverySvc::new(
            store.clone(),
            vault.clone(),
            Arc::new(NoopHeartbeatClient),
            scn,
            DiscoverySettings::default(),
        );

        let tree = tree_for(&ep, vec![node_component("x0c0s14b0n0", "On", None)]);
        let creds = CompCredentials {
            xname: ep.id.to_string(),
            username: "root".to_string(),
            password: "s3cret".to_string(),
            url: String::new(),
        };
        svc.update_from_redfish_endpoint(tree, Some(creds)).await.unwrap();

        let node_cred = vault
            .get_comp_cred(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .expect("per-component credential seeded");
        assert_eq!(node_cred.username, "root");

        // The stored endpoint record itself carries no password.
        let stored = store.get_rf_endpoint(&ep.id).await.unwrap().unwrap();
        assert_eq!(stored.password, "");
    }

    #[tokio::test]
    async fn unreachable_endpoint_full_run_marks_https_failed() {
        let store = Arc::new(InMemoryStore::new());
        let ep = endpoint("x0c0s14b0");
        store.insert_rf_endpoint(ep.clone()).await.unwrap();
        let (svc, _rx) = svc(store.clone(), Arc::new(NoopHeartbeatClient));

        let n = svc
            .discover_from_endpoints(&[ep.id.clone()], 0, false, false)
            .await
            .unwrap();
        assert_eq!(n, 1);

        let stored = store.get_rf_endpoint(&ep.id).await.unwrap().unwrap();
        assert_eq!(stored.discovery_info.last_status, EndpointStatus::HttpsGetFailed);

        let status = store.get_discovery_status(0).await.unwrap().unwrap();
        assert_eq!(status.status, DiscoveryState::Complete);
    }

    #[tokio::test]
    async fn disabled_endpoints_are_filtered() {
        let store = Arc::new(InMemoryStore::new());
        let mut ep = endpoint("x0c0s14b0");
        ep.enabled = false;
        store.insert_rf_endpoint(ep.clone()).await.unwrap();
        let (svc, _rx) = svc(store.clone(), Arc::new(NoopHeartbeatClient));

        let n = svc
            .discover_from_endpoints(&[ep.id.clone()], 0, false, false)
            .await
            .unwrap();
        assert_eq!(n, 0, "disabled endpoint must not be discovered");
    }
}
