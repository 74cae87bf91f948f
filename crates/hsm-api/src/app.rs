use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    components, discover, ethinterfaces, groups, inventory, locks, maps, rfendpoints, service,
    subscriptions,
};
use crate::state::AppState;

/// Build the `/hsm/v2` surface.
pub fn build_app(state: AppState) -> Router {
    let v2 = Router::new()
        // Health
        .route("/service/ready", get(service::ready))
        .route("/service/liveness", get(service::liveness))
        // Components
        .route(
            "/State/Components",
            get(components::list).post(components::post).delete(components::delete_all),
        )
        .route("/State/Components/Query", post(components::query_post))
        .route("/State/Components/Query/:xname", get(components::query_one))
        .route("/State/Components/ByNID/Query", post(components::query_by_nid))
        .route("/State/Components/ByNID/:nid", get(components::get_by_nid))
        .route("/State/Components/BulkStateData", patch(components::bulk_state_data))
        .route("/State/Components/BulkFlagOnly", patch(components::bulk_flag_only))
        .route("/State/Components/BulkEnabled", patch(components::bulk_enabled))
        .route(
            "/State/Components/BulkSoftwareStatus",
            patch(components::bulk_software_status),
        )
        .route("/State/Components/BulkRole", patch(components::bulk_role))
        .route("/State/Components/BulkNID", patch(components::bulk_nid))
        .route(
            "/State/Components/:xname",
            get(components::get_one).delete(components::delete_one),
        )
        .route("/State/Components/:xname/StateData", patch(components::patch_state_data))
        .route("/State/Components/:xname/FlagOnly", patch(components::patch_flag_only))
        .route("/State/Components/:xname/Role", patch(components::patch_role))
        .route("/State/Components/:xname/NID", patch(components::patch_nid))
        // Redfish endpoints
        .route(
            "/Inventory/RedfishEndpoints",
            get(rfendpoints::list).post(rfendpoints::post).delete(rfendpoints::delete_all),
        )
        .route("/Inventory/RedfishEndpoints/Query/:xname", get(rfendpoints::query))
        .route(
            "/Inventory/RedfishEndpoints/:xname",
            get(rfendpoints::get_one).put(rfendpoints::put_one).delete(rfendpoints::delete_one),
        )
        // Component endpoints
        .route(
            "/Inventory/ComponentEndpoints",
            get(inventory::list_comp_endpoints).delete(inventory::delete_comp_endpoints),
        )
        .route(
            "/Inventory/ComponentEndpoints/:xname",
            get(inventory::get_comp_endpoint).delete(inventory::delete_comp_endpoint),
        )
        // Service endpoints
        .route(
            "/Inventory/ServiceEndpoints",
            get(inventory::list_service_endpoints).delete(inventory::delete_service_endpoints),
        )
        .route(
            "/Inventory/ServiceEndpoints/:service",
            get(inventory::list_service_endpoints_for),
        )
        .route(
            "/Inventory/ServiceEndpoints/:service/RedfishEndpoints/:xname",
            get(inventory::get_service_endpoint).delete(inventory::delete_service_endpoint),
        )
        // Hardware inventory
        .route(
            "/Inventory/Hardware",
            get(inventory::list_hardware)
                .post(inventory::post_hardware)
                .delete(inventory::delete_hardware_all),
        )
        .route("/Inventory/Hardware/Query/:xname", get(inventory::query_hardware))
        .route(
            "/Inventory/Hardware/History",
            get(inventory::list_history).delete(inventory::delete_history_all),
        )
        .route(
            "/Inventory/Hardware/History/:xname",
            get(inventory::get_history).delete(inventory::delete_history),
        )
        .route(
            "/Inventory/Hardware/:xname",
            get(inventory::get_hardware).delete(inventory::delete_hardware),
        )
        .route(
            "/Inventory/HardwareByFRU",
            get(inventory::list_frus).delete(inventory::delete_frus),
        )
        .route("/Inventory/HardwareByFRU/History", get(inventory::list_fru_history))
        .route(
            "/Inventory/HardwareByFRU/History/:fruid",
            get(inventory::get_fru_history).delete(inventory::delete_fru_history),
        )
        .route(
            "/Inventory/HardwareByFRU/:fruid",
            get(inventory::get_fru).delete(inventory::delete_fru),
        )
        // Ethernet interfaces
        .route(
            "/Inventory/EthernetInterfaces",
            get(ethinterfaces::list)
                .post(ethinterfaces::post)
                .delete(ethinterfaces::delete_all),
        )
        .route(
            "/Inventory/EthernetInterfaces/:id",
            get(ethinterfaces::get_one)
                .patch(ethinterfaces::patch_one)
                .delete(ethinterfaces::delete_one),
        )
        .route(
            "/Inventory/EthernetInterfaces/:id/IPAddresses",
            get(ethinterfaces::list_ips).post(ethinterfaces::post_ip),
        )
        .route(
            "/Inventory/EthernetInterfaces/:id/IPAddresses/:ip",
            patch(ethinterfaces::patch_ip).delete(ethinterfaces::delete_ip),
        )
        // Discovery
        .route("/Inventory/Discover", post(discover::post_discover))
        .route("/Inventory/DiscoveryStatus", get(discover::list_status))
        .route("/Inventory/DiscoveryStatus/:id", get(discover::get_status))
        // Node map defaults
        .route(
            "/Defaults/NodeMaps",
            get(maps::list_node_maps).post(maps::post_node_maps).delete(maps::delete_node_maps),
        )
        .route(
            "/Defaults/NodeMaps/:xname",
            get(maps::get_node_map).put(maps::put_node_map).delete(maps::delete_node_map),
        )
        // SCN subscriptions
        .route(
            "/Subscriptions/SCN",
            get(subscriptions::list).post(subscriptions::post).delete(subscriptions::delete_all),
        )
        .route(
            "/Subscriptions/SCN/:id",
            get(subscriptions::get_one)
                .put(subscriptions::put_one)
                .patch(subscriptions::patch_one)
                .delete(subscriptions::delete_one),
        )
        // Groups / partitions / memberships
        .route("/groups", get(groups::list_groups).post(groups::post_group))
        .route("/groups/labels", get(groups::list_group_labels))
        .route(
            "/groups/:label",
            get(groups::get_group).patch(groups::patch_group).delete(groups::delete_group),
        )
        .route(
            "/groups/:label/members",
            get(groups::list_group_members).post(groups::post_group_member),
        )
        .route("/groups/:label/members/:xname", delete(groups::delete_group_member))
        .route("/partitions", get(groups::list_partitions).post(groups::post_partition))
        .route("/partitions/names", get(groups::list_partition_names))
        .route(
            "/partitions/:name",
            get(groups::get_partition)
                .patch(groups::patch_partition)
                .delete(groups::delete_partition),
        )
        .route(
            "/partitions/:name/members",
            get(groups::list_partition_members).post(groups::post_partition_member),
        )
        .route(
            "/partitions/:name/members/:xname",
            delete(groups::delete_partition_member),
        )
        .route("/memberships", get(groups::list_memberships))
        .route("/memberships/:xname", get(groups::get_membership))
        // Locks
        .route("/locks/lock", post(locks::lock))
        .route("/locks/unlock", post(locks::unlock))
        .route("/locks/disable", post(locks::disable))
        .route("/locks/repair", post(locks::repair))
        .route("/locks/status", post(locks::status))
        .route("/locks/reservations", post(locks::reservations_create))
        .route("/locks/reservations/release", post(locks::reservations_release))
        .route("/locks/reservations/remove", post(locks::reservations_remove))
        .route("/locks/service/reservations", post(locks::service_reservations_create))
        .route(
            "/locks/service/reservations/renew",
            post(locks::service_reservations_renew),
        )
        .route(
            "/locks/service/reservations/release",
            post(locks::service_reservations_release),
        )
        .route(
            "/locks/service/reservations/check",
            post(locks::service_reservations_check),
        )
        // Power maps
        .route(
            "/sysinfo/powermaps",
            get(maps::list_power_maps)
                .post(maps::post_power_maps)
                .delete(maps::delete_power_maps),
        )
        .route(
            "/sysinfo/powermaps/:xname",
            get(maps::get_power_map).put(maps::put_power_map).delete(maps::delete_power_map),
        );

    Router::new()
        .nest("/hsm/v2", v2)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use hsm_discovery::{DiscoverySettings, DiscoverySvc, NoopHeartbeatClient};
    use hsm_domain::{Component, ComponentState, Xname};
    use hsm_locks::LockEngine;
    use hsm_scn::{ScnEngine, ScnJob};
    use hsm_store::{HsmStore, InMemoryStore};
    use hsm_vault::MemoryVault;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tower::util::ServiceExt;

    struct Harness {
        app: Router,
        store: Arc<InMemoryStore>,
        scn_rx: mpsc::Receiver<ScnJob>,
    }

    fn harness() -> Harness {
        let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
        let vault = Arc::new(MemoryVault::new());
        let (scn, scn_rx) = ScnEngine::new(64);
        let discovery = Arc::new(DiscoverySvc::new(
            store.clone(),
            vault.clone(),
            Arc::new(NoopHeartbeatClient),
            scn.clone(),
            DiscoverySettings {
                http_timeout: std::time::Duration::from_millis(200),
                ..Default::default()
            },
        ));
        let state = AppState {
            store: store.clone(),
            scn,
            locks: LockEngine::new(store.clone()),
            discovery,
            vault,
        };
        Harness { app: build_app(state), store, scn_rx }
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let req = match body {
            Some(v) => builder.body(Body::from(v.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn seed_node(store: &InMemoryStore, id: &str, state: ComponentState) {
        store
            .upsert_components(vec![Component::new(Xname::parse(id).unwrap(), state)])
            .await
            .unwrap();
    }

    // ── Health ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn health_endpoints() {
        let h = harness();
        let (status, _) = send(&h.app, Method::GET, "/hsm/v2/service/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&h.app, Method::GET, "/hsm/v2/service/liveness", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    // ── Scenario 1: RedfishEndpoint POST ────────────────────────────────────

    #[tokio::test]
    async fn post_redfish_endpoint_returns_uri_and_scrubs_password() {
        let h = harness();
        let body = json!({
            "ID": "x0c0s14b0",
            "Type": "NodeBMC",
            "FQDN": "10.10.255.11",
            "User": "root",
            "Password": "s3cret",
            "Enabled": true,
            "RediscoverOnUpdate": true,
        });
        let (status, v) =
            send(&h.app, Method::POST, "/hsm/v2/Inventory/RedfishEndpoints", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v[0]["URI"], "/hsm/v2/Inventory/RedfishEndpoints/x0c0s14b0");

        let (status, v) =
            send(&h.app, Method::GET, "/hsm/v2/Inventory/RedfishEndpoints/x0c0s14b0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["Password"], "");
        assert_eq!(v["FQDN"], "10.10.255.11");
        assert_eq!(v["User"], "root");

        // Duplicate POST conflicts.
        let body = json!({ "ID": "x0c0s14b0", "Type": "NodeBMC", "FQDN": "10.10.255.11" });
        let (status, _) =
            send(&h.app, Method::POST, "/hsm/v2/Inventory/RedfishEndpoints", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    // ── Scenario 2: StateData PATCH ─────────────────────────────────────────

    #[tokio::test]
    async fn patch_state_data_lowercase_body() {
        let h = harness();
        seed_node(&h.store, "x0c0s27b0n0", ComponentState::On).await;

        let (status, _) = send(
            &h.app,
            Method::PATCH,
            "/hsm/v2/State/Components/x0c0s27b0n0/StateData",
            Some(json!({ "state": "off" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, v) =
            send(&h.app, Method::GET, "/hsm/v2/State/Components/x0c0s27b0n0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["State"], "Off");
        assert_eq!(v["Flag"], "OK");
    }

    #[tokio::test]
    async fn patch_state_data_requires_state() {
        let h = harness();
        seed_node(&h.store, "x0c0s27b0n0", ComponentState::On).await;
        let (status, v) = send(
            &h.app,
            Method::PATCH,
            "/hsm/v2/State/Components/x0c0s27b0n0/StateData",
            Some(json!({ "Flag": "OK" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["status"], 400, "problem+json body");
    }

    // ── Scenario 3: reservations ────────────────────────────────────────────

    #[tokio::test]
    async fn reservation_create_then_conflict() {
        let h = harness();
        seed_node(&h.store, "x3000c0s9b0n0", ComponentState::On).await;

        let body = json!({ "ComponentIDs": ["x3000c0s9b0n0"] });
        let (status, v) =
            send(&h.app, Method::POST, "/hsm/v2/locks/reservations", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["Counts"]["Success"], 1);
        let grant = &v["Success"][0];
        assert!(grant["DeputyKey"].as_str().unwrap().starts_with("x3000c0s9b0n0:dk:"));
        assert!(grant["ReservationKey"].as_str().unwrap().starts_with("x3000c0s9b0n0:rk:"));

        // Rigid (default) second call → 400.
        let (status, _) =
            send(&h.app, Method::POST, "/hsm/v2/locks/reservations", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Flexible second call → reported failure, Reason=Reserved.
        let body = json!({
            "ComponentIDs": ["x3000c0s9b0n0"],
            "ProcessingModel": "flexible",
        });
        let (status, v) =
            send(&h.app, Method::POST, "/hsm/v2/locks/reservations", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["Counts"]["Failure"], 1);
        assert_eq!(v["Failure"][0]["Reason"], "Reserved");
    }

    #[tokio::test]
    async fn service_reservation_duration_bounds() {
        let h = harness();
        seed_node(&h.store, "x0c0s0b0n0", ComponentState::On).await;
        for bad in [0, 16] {
            let body = json!({
                "ComponentIDs": ["x0c0s0b0n0"],
                "ReservationDuration": bad,
            });
            let (status, _) =
                send(&h.app, Method::POST, "/hsm/v2/locks/service/reservations", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "duration {} must reject", bad);
        }

        let body = json!({
            "ComponentIDs": ["x0c0s0b0n0"],
            "ReservationDuration": 5,
        });
        let (status, v) =
            send(&h.app, Method::POST, "/hsm/v2/locks/service/reservations", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(v["Success"][0]["ExpirationTime"].is_string());
    }

    #[tokio::test]
    async fn check_response_omits_reservation_key() {
        let h = harness();
        seed_node(&h.store, "x0c0s0b0n0", ComponentState::On).await;
        let (_, v) = send(
            &h.app,
            Method::POST,
            "/hsm/v2/locks/service/reservations",
            Some(json!({ "ComponentIDs": ["x0c0s0b0n0"], "ReservationDuration": 5 })),
        )
        .await;
        let deputy = v["Success"][0]["DeputyKey"].as_str().unwrap().to_string();

        let body = json!({ "DeputyKeys": [{ "ID": "x0c0s0b0n0", "Key": deputy }] });
        let (status, v) =
            send(&h.app, Method::POST, "/hsm/v2/locks/service/reservations/check", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["Counts"]["Success"], 1);
        assert!(v["Success"][0].get("ReservationKey").is_none());
    }

    #[tokio::test]
    async fn lock_status_and_unlock_flow() {
        let h = harness();
        seed_node(&h.store, "x0c0s0b0n0", ComponentState::On).await;
        let body = json!({ "ComponentIDs": ["x0c0s0b0n0"] });
        let (status, _) = send(&h.app, Method::POST, "/hsm/v2/locks/lock", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (_, v) = send(&h.app, Method::POST, "/hsm/v2/locks/status", Some(body.clone())).await;
        assert_eq!(v["Components"][0]["Locked"], true);

        let (status, _) = send(&h.app, Method::POST, "/hsm/v2/locks/unlock", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    // ── Scenario 4: SCN subscription + transition ───────────────────────────

    #[tokio::test]
    async fn subscription_receives_state_transition() {
        let mut h = harness();
        seed_node(&h.store, "x0c0s27b0n0", ComponentState::Off).await;

        let body = json!({
            "Subscriber": "hmfd@sms01",
            "States": ["On", "Off"],
            "Url": "https://foo/bar",
        });
        let (status, v) =
            send(&h.app, Method::POST, "/hsm/v2/Subscriptions/SCN", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(v["ID"].is_i64());

        let (status, _) = send(
            &h.app,
            Method::PATCH,
            "/hsm/v2/State/Components/x0c0s27b0n0/StateData",
            Some(json!({ "State": "On" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let job = h.scn_rx.try_recv().expect("notification enqueued");
        assert_eq!(job.url, "https://foo/bar");
        assert_eq!(job.payload.state.as_deref(), Some("On"));
        assert_eq!(job.payload.components, ["x0c0s27b0n0"]);
    }

    #[tokio::test]
    async fn empty_subscription_rejected() {
        let h = harness();
        let body = json!({ "Subscriber": "a@b", "Url": "https://foo/bar" });
        let (status, _) = send(&h.app, Method::POST, "/hsm/v2/Subscriptions/SCN", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn subscription_patch_remove_stops_dispatch() {
        let mut h = harness();
        seed_node(&h.store, "x0c0s27b0n0", ComponentState::Off).await;
        let (_, v) = send(
            &h.app,
            Method::POST,
            "/hsm/v2/Subscriptions/SCN",
            Some(json!({ "Subscriber": "a@b", "States": ["On", "Off"], "Url": "https://foo/bar" })),
        )
        .await;
        let id = v["ID"].as_i64().unwrap();

        let (status, v) = send(
            &h.app,
            Method::PATCH,
            &format!("/hsm/v2/Subscriptions/SCN/{}", id),
            Some(json!({ "Op": "remove", "States": ["On"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["States"], json!(["Off"]));

        send(
            &h.app,
            Method::PATCH,
            "/hsm/v2/State/Components/x0c0s27b0n0/StateData",
            Some(json!({ "State": "On" })),
        )
        .await;
        assert!(h.scn_rx.try_recv().is_err(), "removed trigger no longer fires");
    }

    // ── Scenario 5: NodeMaps NID conflict ───────────────────────────────────

    #[tokio::test]
    async fn nodemap_nid_conflict_is_409() {
        let h = harness();
        let body = json!([{ "ID": "x0c0s0b0n0", "NID": 1, "Role": "Compute" }]);
        let (status, _) = send(&h.app, Method::POST, "/hsm/v2/Defaults/NodeMaps", Some(body)).await;
        assert_eq!(status, StatusCode::OK);

        let body = json!([{ "ID": "x0c0s0b1n0", "NID": 1 }]);
        let (status, _) = send(&h.app, Method::POST, "/hsm/v2/Defaults/NodeMaps", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    // ── Scenario 6: RedfishEndpoint delete semantics ────────────────────────

    #[tokio::test]
    async fn delete_endpoint_keeps_components_as_empty() {
        let h = harness();
        let body = json!({ "ID": "x0c0s14b0", "Type": "NodeBMC", "FQDN": "bmc14.local" });
        send(&h.app, Method::POST, "/hsm/v2/Inventory/RedfishEndpoints", Some(body)).await;
        seed_node(&h.store, "x0c0s14b0n0", ComponentState::Ready).await;

        let (status, v) =
            send(&h.app, Method::DELETE, "/hsm/v2/Inventory/RedfishEndpoints/x0c0s14b0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "deleted 1 entry");

        let (status, v) =
            send(&h.app, Method::GET, "/hsm/v2/State/Components/x0c0s14b0n0", None).await;
        assert_eq!(status, StatusCode::OK, "component survives endpoint deletion");
        assert_eq!(v["State"], "Empty");

        let (status, _) =
            send(&h.app, Method::GET, "/hsm/v2/Inventory/RedfishEndpoints/x0c0s14b0", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ── Boundary cases ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn bad_type_filter_is_400() {
        let h = harness();
        let (status, v) =
            send(&h.app, Method::GET, "/hsm/v2/State/Components?type=foo", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(v["detail"].as_str().unwrap().contains("foo"));
    }

    #[tokio::test]
    async fn malformed_xname_is_400_absent_is_404() {
        let h = harness();
        let (status, _) =
            send(&h.app, Method::GET, "/hsm/v2/State/Components/notanxname", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&h.app, Method::GET, "/hsm/v2/State/Components/x0c0s0b0n0", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_empty_hardware_is_404() {
        let h = harness();
        let (status, _) = send(&h.app, Method::DELETE, "/hsm/v2/Inventory/Hardware", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ── Filters, projections, groups ────────────────────────────────────────

    #[tokio::test]
    async fn or_list_filters_and_projection() {
        let h = harness();
        seed_node(&h.store, "x0c0s0b0n0", ComponentState::On).await;
        seed_node(&h.store, "x0c0s1b0n0", ComponentState::Off).await;
        seed_node(&h.store, "x0c0s2b0n0", ComponentState::Ready).await;

        let (_, v) = send(
            &h.app,
            Method::GET,
            "/hsm/v2/State/Components?state=On&state=Off",
            None,
        )
        .await;
        assert_eq!(v["Components"].as_array().unwrap().len(), 2);

        let (_, v) = send(
            &h.app,
            Method::GET,
            "/hsm/v2/State/Components?stateonly=true",
            None,
        )
        .await;
        let first = &v["Components"][0];
        assert!(first.get("State").is_some());
        assert!(first.get("Enabled").is_none(), "projection strips fields");
    }

    #[tokio::test]
    async fn group_membership_flow() {
        let h = harness();
        seed_node(&h.store, "x0c0s0b0n0", ComponentState::On).await;

        let body = json!({ "Label": "blue", "Description": "team blue" });
        let (status, _) = send(&h.app, Method::POST, "/hsm/v2/groups", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let body = json!({ "ID": "x0c0s0b0n0" });
        let (status, _) =
            send(&h.app, Method::POST, "/hsm/v2/groups/blue/members", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, v) = send(&h.app, Method::GET, "/hsm/v2/memberships/x0c0s0b0n0", None).await;
        assert_eq!(v["groupLabels"], json!(["blue"]));

        let (_, v) = send(&h.app, Method::GET, "/hsm/v2/State/Components?group=blue", None).await;
        assert_eq!(v["Components"].as_array().unwrap().len(), 1);

        let (_, v) = send(&h.app, Method::GET, "/hsm/v2/groups/labels", None).await;
        assert_eq!(v, json!(["blue"]));
    }

    #[tokio::test]
    async fn bulk_state_requires_ids_and_state() {
        let h = harness();
        let (status, _) = send(
            &h.app,
            Method::PATCH,
            "/hsm/v2/State/Components/BulkStateData",
            Some(json!({ "State": "Off" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &h.app,
            Method::PATCH,
            "/hsm/v2/State/Components/BulkStateData",
            Some(json!({ "ComponentIDs": ["x0c0s0b0n0"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn eth_interface_crud_and_ip_subresource() {
        let h = harness();
        let body = json!({
            "MACAddress": "A4:BF:01:2E:7F:AA",
            "Description": "node nic",
            "ComponentID": "x0c0s0b0n0",
        });
        let (status, v) =
            send(&h.app, Method::POST, "/hsm/v2/Inventory/EthernetInterfaces", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["URI"], "/hsm/v2/Inventory/EthernetInterfaces/a4bf012e7faa");

        let (status, v) = send(
            &h.app,
            Method::GET,
            "/hsm/v2/Inventory/EthernetInterfaces/a4bf012e7faa",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["ID"], "a4bf012e7faa");

        let body = json!({ "IPAddress": "10.252.0.5", "Network": "NMN" });
        let (status, _) = send(
            &h.app,
            Method::POST,
            "/hsm/v2/Inventory/EthernetInterfaces/a4bf012e7faa/IPAddresses",
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, v) = send(
            &h.app,
            Method::GET,
            "/hsm/v2/Inventory/EthernetInterfaces?ipaddress=10.252.0.5",
            None,
        )
        .await;
        assert_eq!(v.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hardware_query_groups_by_type() {
        let h = harness();
        let loc = json!({
            "ID": "x0c0s0b0n0",
            "Type": "Node",
            "Ordinal": 0,
            "Status": "Populated",
            "HWInventoryByLocationType": "HWInvByLocNode",
            "NodeLocationInfo": {},
        });
        let (status, _) =
            send(&h.app, Method::POST, "/hsm/v2/Inventory/Hardware", Some(json!([loc]))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, v) =
            send(&h.app, Method::GET, "/hsm/v2/Inventory/Hardware/Query/x0c0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["Format"], "FullyFlat");
        assert_eq!(v["Nodes"].as_array().unwrap().len(), 1);

        let (status, v) = send(
            &h.app,
            Method::GET,
            "/hsm/v2/Inventory/Hardware/Query/all?format=hierarchical",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["Format"], "Hierarchical");
    }

    #[tokio::test]
    async fn discovery_status_endpoints() {
        let h = harness();
        let (status, _) =
            send(&h.app, Method::GET, "/hsm/v2/Inventory/DiscoveryStatus", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            send(&h.app, Method::GET, "/hsm/v2/Inventory/DiscoveryStatus/0", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn discover_unknown_endpoint_is_404() {
        let h = harness();
        let body = json!({ "xnames": ["x9c0s0b0"] });
        let (status, _) = send(&h.app, Method::POST, "/hsm/v2/Inventory/Discover", Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn powermap_put_round_trip() {
        let h = harness();
        let body = json!({ "ID": "x0c0s0b0n0", "PoweredBy": ["x0m0p0j1"] });
        let (status, _) = send(
            &h.app,
            Method::PUT,
            "/hsm/v2/sysinfo/powermaps/x0c0s0b0n0",
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, v) =
            send(&h.app, Method::GET, "/hsm/v2/sysinfo/powermaps/x0c0s0b0n0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["PoweredBy"], json!(["x0m0p0j1"]));
    }

    #[tokio::test]
    async fn error_bodies_are_problem_json() {
        let h = harness();
        let req = Request::builder()
            .method(Method::GET)
            .uri("/hsm/v2/State/Components/notanxname")
            .body(Body::empty())
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert_eq!(content_type, "application/problem+json");
    }
}
