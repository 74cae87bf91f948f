use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use hsm_domain::ScnPayload;
use hsm_store::ComponentChange;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::index::{Dimension, SubscriptionIndex};

/// One outbound notification: a payload bound for one subscriber URL.
#[derive(Debug, Clone)]
pub struct ScnJob {
    pub url: String,
    pub payload: ScnPayload,
}

/// The shared SCN engine: the trigger index plus the outbound queue.
///
/// Mutations are enqueued after the store commit succeeds, so a subscriber
/// that reads HSM state on receipt observes state at least as new as the
/// notification. Delivery is fire-and-forget; the pool retries once and
/// then drops.
pub struct ScnEngine {
    index: RwLock<SubscriptionIndex>,
    tx: mpsc::Sender<ScnJob>,
}

impl ScnEngine {
    /// Build the engine and hand back the job stream for a delivery pool.
    pub fn new(queue_depth: usize) -> (Arc<ScnEngine>, mpsc::Receiver<ScnJob>) {
        let (tx, rx) = mpsc::channel(queue_depth);
        (Arc::new(ScnEngine { index: RwLock::new(SubscriptionIndex::new()), tx }), rx)
    }

    pub async fn add_subscription(&self, sub: &hsm_domain::ScnSubscription) {
        self.index.write().await.insert(sub);
    }

    pub async fn remove_subscription(&self, sub: &hsm_domain::ScnSubscription) {
        self.index.write().await.remove(sub);
    }

    pub async fn replace_subscription(
        &self,
        old: &hsm_domain::ScnSubscription,
        new: &hsm_domain::ScnSubscription,
    ) {
        self.index.write().await.replace(old, new);
    }

    /// Group a commit's component changes by (dimension, new value), dedupe
    /// URLs per group, and enqueue one job per (value, URL) pair.
    pub async fn enqueue_changes(&self, changes: &[ComponentChange]) {
        if changes.is_empty() {
            return;
        }
        // (dimension, value) → xnames, in deterministic order.
        let mut groups: BTreeMap<(u8, String), Vec<String>> = BTreeMap::new();
        let mut push = |dim: u8, value: String, id: &str| {
            groups.entry((dim, value)).or_default().push(id.to_string());
        };
        for ch in changes {
            let id = ch.new.id.as_str();
            let old = ch.old.as_ref();
            if old.map_or(true, |o| o.state != ch.new.state) {
                push(0, ch.new.state.to_string(), id);
            }
            if let Some(role) = &ch.new.role {
                if old.map_or(true, |o| o.role != ch.new.role) {
                    push(1, role.clone(), id);
                }
            }
            if let Some(sub_role) = &ch.new.sub_role {
                if old.map_or(true, |o| o.sub_role != ch.new.sub_role) {
                    push(2, sub_role.clone(), id);
                }
            }
            if let Some(sw) = &ch.new.software_status {
                if old.map_or(true, |o| o.software_status != ch.new.software_status) {
                    push(3, sw.clone(), id);
                }
            }
            if let Some(enabled) = ch.new.enabled {
                if old.map_or(true, |o| o.enabled != ch.new.enabled) {
                    push(4, enabled.to_string(), id);
                }
            }
        }

        let index = self.index.read().await;
        for ((dim_tag, value), components) in groups {
            let (dim, payload) = match dim_tag {
                0 => (
                    Dimension::State,
                    ScnPayload {
                        components: components.clone(),
                        state: Some(value.clone()),
                        ..Default::default()
                    },
                ),
                1 => (
                    Dimension::Role,
                    ScnPayload {
                        components: components.clone(),
                        role: Some(value.clone()),
                        ..Default::default()
                    },
                ),
                2 => (
                    Dimension::SubRole,
                    ScnPayload {
                        components: components.clone(),
                        sub_role: Some(value.clone()),
                        ..Default::default()
                    },
                ),
                3 => (
                    Dimension::SoftwareStatus,
                    ScnPayload {
                        components: components.clone(),
                        software_status: Some(value.clone()),
                        ..Default::default()
                    },
                ),
                _ => (
                    Dimension::Enabled,
                    ScnPayload {
                        components: components.clone(),
                        enabled: Some(value == "true"),
                        ..Default::default()
                    },
                ),
            };
            let urls: HashSet<String> = index.lookup(dim, &value).into_iter().collect();
            for url in urls {
                let job = ScnJob { url, payload: payload.clone() };
                if let Err(e) = self.tx.try_send(job) {
                    // A saturated queue drops the notification; delivery is
                    // best-effort by contract.
                    warn!(error = %e, "SCN queue full, dropping notification");
                }
            }
        }
    }
}

// ── Delivery pool ─────────────────────────────────────────────────────────────

/// Bounded worker pool that POSTs queued notifications to subscribers.
pub struct DeliveryPool {
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl DeliveryPool {
    pub fn spawn(rx: mpsc::Receiver<ScnJob>, workers: usize) -> DeliveryPool {
        let rx = Arc::new(Mutex::new(rx));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let rx = rx.clone();
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    deliver(&client, &job, worker).await;
                }
            }));
        }
        DeliveryPool { handles }
    }

    pub fn abort(&self) {
        for h in &self.handles {
            h.abort();
        }
    }
}

async fn deliver(client: &reqwest::Client, job: &ScnJob, worker: usize) {
    for attempt in 0..2 {
        match client.post(&job.url).json(&job.payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(worker, url = %job.url, "SCN delivered");
                return;
            }
            Ok(resp) => {
                warn!(worker, url = %job.url, status = %resp.status(), attempt, "SCN rejected");
            }
            Err(e) => {
                warn!(worker, url = %job.url, error = %e, attempt, "SCN delivery failed");
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_domain::{Component, ComponentState, ScnSubscription, Xname};

    fn change(id: &str, old_state: Option<ComponentState>, new_state: ComponentState) -> ComponentChange {
        let x = Xname::parse(id).unwrap();
        let new = Component::new(x.clone(), new_state);
        let old = old_state.map(|s| Component::new(x, s));
        ComponentChange { old, new }
    }

    #[tokio::test]
    async fn state_transition_enqueues_to_matching_subscriber() {
        let (engine, mut rx) = ScnEngine::new(16);
        let mut sub = ScnSubscription {
            subscriber: "hmfd@sms01".to_string(),
            url: "https://foo/bar".to_string(),
            states: Some(vec!["On".to_string(), "Off".to_string()]),
            ..Default::default()
        };
        sub.verify().unwrap();
        engine.add_subscription(&sub).await;

        engine
            .enqueue_changes(&[change("x0c0s0b0n0", Some(ComponentState::Off), ComponentState::On)])
            .await;

        let job = rx.try_recv().expect("one job queued");
        assert_eq!(job.url, "https://foo/bar");
        assert_eq!(job.payload.state.as_deref(), Some("On"));
        assert_eq!(job.payload.components, ["x0c0s0b0n0"]);
        assert!(rx.try_recv().is_err(), "exactly one job");
    }

    #[tokio::test]
    async fn unchanged_state_enqueues_nothing() {
        let (engine, mut rx) = ScnEngine::new(16);
        let sub = ScnSubscription {
            url: "https://foo/bar".to_string(),
            states: Some(vec!["On".to_string()]),
            ..Default::default()
        };
        engine.add_subscription(&sub).await;

        engine
            .enqueue_changes(&[change("x0c0s0b0n0", Some(ComponentState::On), ComponentState::On)])
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn batch_groups_components_by_new_value() {
        let (engine, mut rx) = ScnEngine::new(16);
        let sub = ScnSubscription {
            url: "https://foo/bar".to_string(),
            states: Some(vec!["Off".to_string()]),
            ..Default::default()
        };
        engine.add_subscription(&sub).await;

        engine
            .enqueue_changes(&[
                change("x0c0s0b0n0", Some(ComponentState::On), ComponentState::Off),
                change("x0c0s1b0n0", Some(ComponentState::On), ComponentState::Off),
            ])
            .await;

        let job = rx.try_recv().unwrap();
        assert_eq!(job.payload.components.len(), 2);
        assert!(rx.try_recv().is_err(), "one deduped job for the whole batch");
    }

    #[tokio::test]
    async fn removed_subscription_stops_dispatch() {
        let (engine, mut rx) = ScnEngine::new(16);
        let sub = ScnSubscription {
            url: "https://foo/bar".to_string(),
            states: Some(vec!["On".to_string()]),
            ..Default::default()
        };
        engine.add_subscription(&sub).await;
        engine.remove_subscription(&sub).await;

        engine
            .enqueue_changes(&[change("x0c0s0b0n0", Some(ComponentState::Off), ComponentState::On)])
            .await;
        assert!(rx.try_recv().is_err());
    }
}
