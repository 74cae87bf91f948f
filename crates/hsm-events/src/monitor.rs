use std::sync::Arc;

use hsm_domain::{ComponentState, HsmError, Xname};
use hsm_scn::ScnEngine;
use hsm_store::{HsmStore, RfEndpointFilter};
use tracing::{debug, info, warn};

use crate::stream::{BusMessage, EventStream, RedfishAlert};

/// Monitor lifecycle.
///
/// Transitions: Stopped → Connecting → Subscribed. Processing happens in
/// Subscribed; a closed stream drops back to Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Stopped,
    Connecting,
    Subscribed,
}

/// Consumes Redfish alerts from the bus and routes the resulting state
/// mutations through the same store + SCN path discovery uses.
pub struct EventMonitor {
    store: Arc<dyn HsmStore>,
    scn: Arc<ScnEngine>,
    state: MonitorState,
}

impl EventMonitor {
    pub fn new(store: Arc<dyn HsmStore>, scn: Arc<ScnEngine>) -> Self {
        EventMonitor { store, scn, state: MonitorState::Stopped }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Run until the stream closes.
    pub async fn run<S: EventStream>(&mut self, mut stream: S) {
        self.state = MonitorState::Connecting;
        info!("redfish event monitor connecting");
        self.state = MonitorState::Subscribed;
        while let Some(msg) = stream.next().await {
            if let Err(e) = self.process(msg).await {
                // Unparseable or unroutable events are logged and dropped.
                debug!(error = %e, "event dropped");
            }
        }
        self.state = MonitorState::Stopped;
        info!("redfish event monitor stopped");
    }

    /// Handle one bus envelope.
    pub async fn process(&self, msg: BusMessage) -> Result<(), HsmError> {
        let endpoint_id = self.resolve_source(&msg.source).await?;
        for event in &msg.events {
            match self.process_alert(&endpoint_id, event).await {
                Ok(Some(id)) => debug!(component = %id, message_id = %event.message_id, "event applied"),
                Ok(None) => debug!(message_id = %event.message_id, "event ignored"),
                Err(e) => warn!(message_id = %event.message_id, error = %e, "event failed"),
            }
        }
        Ok(())
    }

    /// Map the envelope `Source` to the emitting endpoint: an xname, or the
    /// FQDN of a registered RedfishEndpoint.
    async fn resolve_source(&self, source: &str) -> Result<Xname, HsmError> {
        if let Ok(x) = Xname::parse(source) {
            return Ok(x);
        }
        let filter = RfEndpointFilter { fqdn: vec![source.to_string()], ..Default::default() };
        let eps = self.store.get_rf_endpoints(&filter).await?;
        eps.into_iter()
            .next()
            .map(|ep| ep.id)
            .ok_or_else(|| HsmError::ArgNoMatch(format!("event source '{}'", source)))
    }

    async fn process_alert(
        &self,
        endpoint_id: &Xname,
        event: &RedfishAlert,
    ) -> Result<Option<Xname>, HsmError> {
        let Some(new_state) = state_from_alert(event) else {
            return Ok(None);
        };
        let component = self.resolve_component(endpoint_id, event).await?;
        let changes = self
            .store
            .update_component_state(
                std::slice::from_ref(&component),
                new_state,
                None,
                false,
            )
            .await?;
        self.scn.enqueue_changes(&changes).await;
        Ok(Some(component))
    }

    /// The component an alert refers to: the node named by the origin's
    /// Redfish id under the emitting BMC, else the endpoint's child n0,
    /// else the endpoint itself.
    async fn resolve_component(
        &self,
        endpoint_id: &Xname,
        event: &RedfishAlert,
    ) -> Result<Xname, HsmError> {
        if let Some(origin) = &event.origin_of_condition {
            if origin.odata_id.contains("/Systems/") {
                let rf_id = origin.odata_id.trim_end_matches('/').rsplit('/').next().unwrap_or("");
                let ordinal = trailing_ordinal(rf_id);
                if let Ok(node) = endpoint_id.child('n', ordinal) {
                    return Ok(node);
                }
            }
        }
        if let Ok(node) = endpoint_id.child('n', 0) {
            if self.store.get_component(&node).await?.is_some() {
                return Ok(node);
            }
        }
        Ok(endpoint_id.clone())
    }
}

fn trailing_ordinal(redfish_id: &str) -> u32 {
    let digits: String = redfish_id
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().unwrap_or(0)
}

/// Derive the target component state from an alert's message id and args.
fn state_from_alert(event: &RedfishAlert) -> Option<ComponentState> {
    let id = event.message_id.as_str();
    if id.ends_with("ResourcePowerStateChanged") || id.ends_with("PowerStateChange") {
        let arg = event.message_args.first()?;
        return ComponentState::parse(arg);
    }
    if id.ends_with("ServerPoweredOn") || id.ends_with("PowerOn") {
        return Some(ComponentState::On);
    }
    if id.ends_with("ServerPoweredOff") || id.ends_with("PowerOff") {
        return Some(ComponentState::Off);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::OriginRef;
    use hsm_domain::Component;
    use hsm_store::InMemoryStore;

    async fn setup(node: &str) -> (EventMonitor, Arc<InMemoryStore>, tokio::sync::mpsc::Receiver<hsm_scn::ScnJob>) {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_components(vec![Component::new(
                Xname::parse(node).unwrap(),
                ComponentState::On,
            )])
            .await
            .unwrap();
        let (scn, rx) = ScnEngine::new(16);
        (EventMonitor::new(store.clone(), scn), store, rx)
    }

    fn power_off_msg(source: &str) -> BusMessage {
        BusMessage {
            source: source.to_string(),
            events: vec![RedfishAlert {
                message_id: "ResourceEvent.1.0.ResourcePowerStateChanged".to_string(),
                message_args: vec!["Off".to_string()],
                origin_of_condition: Some(OriginRef {
                    odata_id: "/redfish/v1/Systems/Node0".to_string(),
                }),
                event_timestamp: String::new(),
            }],
        }
    }

    #[tokio::test]
    async fn power_event_updates_component_and_enqueues_scn() {
        let (monitor, store, mut rx) = setup("x0c0s14b0n0").await;

        monitor.process(power_off_msg("x0c0s14b0")).await.unwrap();

        let node = store
            .get_component(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.state, ComponentState::Off);
        assert!(rx.try_recv().is_ok(), "state change must fan out");
    }

    #[tokio::test]
    async fn unknown_source_is_rejected() {
        let (monitor, _, _) = setup("x0c0s14b0n0").await;
        let err = monitor.process(power_off_msg("no-such-host.local")).await.unwrap_err();
        assert!(matches!(err, HsmError::ArgNoMatch(_)));
    }

    #[tokio::test]
    async fn fqdn_source_resolves_via_endpoint_record() {
        let (monitor, store, _rx) = setup("x0c0s14b0n0").await;
        let mut ep: hsm_domain::RedfishEndpoint = serde_json::from_value(serde_json::json!({
            "ID": "x0c0s14b0",
            "Type": "NodeBMC",
            "FQDN": "bmc14.local",
        }))
        .unwrap();
        ep.normalize().unwrap();
        store.insert_rf_endpoint(ep).await.unwrap();

        monitor.process(power_off_msg("bmc14.local")).await.unwrap();
        let node = store
            .get_component(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.state, ComponentState::Off);
    }

    #[tokio::test]
    async fn non_power_alert_is_ignored() {
        let (monitor, store, mut rx) = setup("x0c0s14b0n0").await;
        let msg = BusMessage {
            source: "x0c0s14b0".to_string(),
            events: vec![RedfishAlert {
                message_id: "Alert.1.0.TemperatureWarning".to_string(),
                ..Default::default()
            }],
        };
        monitor.process(msg).await.unwrap();
        let node = store
            .get_component(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.state, ComponentState::On, "untouched");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_processes_until_stream_closes() {
        let (mut monitor, store, _rx) = setup("x0c0s14b0n0").await;
        let (tx, stream) = crate::stream::ChannelStream::new(4);
        tx.send(power_off_msg("x0c0s14b0")).await.unwrap();
        drop(tx);

        monitor.run(stream).await;
        assert_eq!(monitor.state(), MonitorState::Stopped);
        let node = store
            .get_component(&Xname::parse("x0c0s14b0n0").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.state, ComponentState::Off);
    }
}
