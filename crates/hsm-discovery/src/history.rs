use std::collections::HashMap;

use chrono::Utc;
use hsm_domain::{HsmError, HwInvByLoc, HwInvHist, HwInvHistEventType, Xname};
use hsm_store::HsmStore;
use tracing::debug;

/// Diff freshly discovered location→FRU bindings against the last-recorded
/// event per location and append the resulting events.
///
/// A `Detected` event is emitted for a location iff the FRU changed since
/// the last event, or the last event was not itself a `Detected`. Repeating
/// a discovery with unchanged hardware therefore appends nothing, while a
/// swap is always captured. No `Removed` is written for the old location of
/// a migrated FRU; consumers infer removals from the stream.
pub async fn generate_history(
    store: &dyn HsmStore,
    locs: &[HwInvByLoc],
) -> Result<Vec<HwInvHist>, HsmError> {
    let with_fru: Vec<(&Xname, &str)> = locs
        .iter()
        .filter_map(|loc| loc.fru_id().map(|fru| (&loc.id, fru)))
        .collect();
    if with_fru.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Xname> = with_fru.iter().map(|(id, _)| (*id).clone()).collect();
    let last: HashMap<Xname, HwInvHist> =
        store.last_hw_hist_for(&ids).await?.into_iter().collect();

    let now = Utc::now();
    let mut events = Vec::new();
    for (id, fru_id) in with_fru {
        let emit = match last.get(id) {
            Some(prev) => {
                prev.fru_id != fru_id || prev.event_type != HwInvHistEventType::Detected
            }
            None => true,
        };
        if emit {
            events.push(HwInvHist {
                id: id.clone(),
                fru_id: fru_id.to_string(),
                timestamp: now,
                event_type: HwInvHistEventType::Detected,
            });
        }
    }

    if !events.is_empty() {
        debug!(count = events.len(), "appending hardware history events");
        store.append_hw_hist(events.clone()).await?;
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_domain::{FruIdentity, HwFruInfo, HwInvByFru, HwLocInfo, StdLocationInfo};
    use hsm_store::InMemoryStore;

    fn loc(id: &str, fru_id: Option<&str>) -> HwInvByLoc {
        let x = Xname::parse(id).unwrap();
        let t = x.hms_type();
        HwInvByLoc {
            id: x,
            hms_type: t,
            ordinal: 0,
            status: if fru_id.is_some() {
                HwInvByLoc::STATUS_POPULATED.to_string()
            } else {
                HwInvByLoc::STATUS_EMPTY.to_string()
            },
            info: HwLocInfo::for_type(t, StdLocationInfo::default()).unwrap(),
            populated_fru: fru_id.map(|f| HwInvByFru {
                fru_id: f.to_string(),
                hms_type: t,
                subtype: String::new(),
                info: HwFruInfo::for_type(t, FruIdentity::default()).unwrap(),
            }),
        }
    }

    #[tokio::test]
    async fn first_discovery_emits_detected_per_fru_location() {
        let store = InMemoryStore::new();
        let locs = vec![
            loc("x0c0s0b0n0", Some("CRAY-100-SN1")),
            loc("x0c0s1b0n0", Some("CRAY-100-SN2")),
            loc("x0c0s2b0n0", None),
        ];
        let events = generate_history(&store, &locs).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| e.event_type == HwInvHistEventType::Detected));
    }

    #[tokio::test]
    async fn idempotent_rediscovery_emits_nothing() {
        let store = InMemoryStore::new();
        let locs = vec![loc("x0c0s0b0n0", Some("CRAY-100-SN1"))];
        generate_history(&store, &locs).await.unwrap();

        let again = generate_history(&store, &locs).await.unwrap();
        assert!(again.is_empty(), "unchanged hardware must add no history");
    }

    #[tokio::test]
    async fn fru_swap_emits_detected() {
        let store = InMemoryStore::new();
        generate_history(&store, &[loc("x0c0s0b0n0", Some("CRAY-100-SN1"))])
            .await
            .unwrap();

        let events = generate_history(&store, &[loc("x0c0s0b0n0", Some("CRAY-100-SN9"))])
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].fru_id, "CRAY-100-SN9");
    }

    #[tokio::test]
    async fn non_detected_last_event_is_refreshed() {
        let store = InMemoryStore::new();
        let x = Xname::parse("x0c0s0b0n0").unwrap();
        store
            .append_hw_hist(vec![HwInvHist {
                id: x,
                fru_id: "CRAY-100-SN1".to_string(),
                timestamp: Utc::now(),
                event_type: HwInvHistEventType::Removed,
            }])
            .await
            .unwrap();

        // Same FRU back in the slot after an admin-recorded removal: the
        // sighting must be re-recorded.
        let events = generate_history(&store, &[loc("x0c0s0b0n0", Some("CRAY-100-SN1"))])
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
    }
}
