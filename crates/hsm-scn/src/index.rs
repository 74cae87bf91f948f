use std::collections::HashMap;

use hsm_domain::ScnSubscription;

/// The five trigger dimensions a subscription may select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    State,
    Role,
    SubRole,
    SoftwareStatus,
    Enabled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UrlEntry {
    pub url: String,
    pub ref_count: u32,
}

/// The dispatch index: `dimension → trigger value → [url × refcount]`.
///
/// This structure is the single source of truth for fan-out; the stored
/// subscription list is only a serialization view for GETs. Each trigger
/// value a subscription names contributes one refcount to its URL entry, so
/// overlapping subscriptions dedupe naturally and deletes are O(values).
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    map: HashMap<Dimension, HashMap<String, Vec<UrlEntry>>>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every (dimension, value) pair a subscription selects on. Enabled is a
    /// boolean dimension keyed `"true"`/`"false"`.
    fn triggers(sub: &ScnSubscription) -> Vec<(Dimension, String)> {
        let mut out = Vec::new();
        if let Some(states) = &sub.states {
            out.extend(states.iter().map(|v| (Dimension::State, v.clone())));
        }
        if let Some(roles) = &sub.roles {
            out.extend(roles.iter().map(|v| (Dimension::Role, v.clone())));
        }
        if let Some(sub_roles) = &sub.sub_roles {
            out.extend(sub_roles.iter().map(|v| (Dimension::SubRole, v.clone())));
        }
        if let Some(sw) = &sub.software_status {
            out.extend(sw.iter().map(|v| (Dimension::SoftwareStatus, v.clone())));
        }
        if let Some(enabled) = sub.enabled {
            out.push((Dimension::Enabled, enabled.to_string()));
        }
        out
    }

    pub fn insert(&mut self, sub: &ScnSubscription) {
        for (dim, value) in Self::triggers(sub) {
            let entries = self.map.entry(dim).or_default().entry(value).or_default();
            match entries.iter_mut().find(|e| e.url == sub.url) {
                Some(entry) => entry.ref_count += 1,
                None => entries.push(UrlEntry { url: sub.url.clone(), ref_count: 1 }),
            }
        }
    }

    pub fn remove(&mut self, sub: &ScnSubscription) {
        for (dim, value) in Self::triggers(sub) {
            let Some(values) = self.map.get_mut(&dim) else { continue };
            let Some(entries) = values.get_mut(&value) else { continue };
            if let Some(pos) = entries.iter().position(|e| e.url == sub.url) {
                entries[pos].ref_count -= 1;
                if entries[pos].ref_count == 0 {
                    entries.remove(pos);
                }
            }
            if entries.is_empty() {
                values.remove(&value);
            }
        }
    }

    /// Replace is remove-then-insert; PUT semantics.
    pub fn replace(&mut self, old: &ScnSubscription, new: &ScnSubscription) {
        self.remove(old);
        self.insert(new);
    }

    /// URLs subscribed to one (dimension, value) pair.
    pub fn lookup(&self, dim: Dimension, value: &str) -> Vec<String> {
        self.map
            .get(&dim)
            .and_then(|values| values.get(value))
            .map(|entries| entries.iter().map(|e| e.url.clone()).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn ref_count(&self, dim: Dimension, value: &str, url: &str) -> u32 {
        self.map
            .get(&dim)
            .and_then(|values| values.get(value))
            .and_then(|entries| entries.iter().find(|e| e.url == url))
            .map(|e| e.ref_count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(url: &str, states: &[&str]) -> ScnSubscription {
        ScnSubscription {
            url: url.to_string(),
            states: Some(states.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn insert_and_lookup() {
        let mut idx = SubscriptionIndex::new();
        idx.insert(&sub("https://a/scn", &["On", "Off"]));
        idx.insert(&sub("https://b/scn", &["On"]));

        let mut urls = idx.lookup(Dimension::State, "On");
        urls.sort();
        assert_eq!(urls, ["https://a/scn", "https://b/scn"]);
        assert_eq!(idx.lookup(Dimension::State, "Off"), ["https://a/scn"]);
        assert!(idx.lookup(Dimension::State, "Ready").is_empty());
    }

    #[test]
    fn refcount_tracks_overlapping_subscriptions() {
        let mut idx = SubscriptionIndex::new();
        let a = sub("https://a/scn", &["On"]);
        let b = sub("https://a/scn", &["On"]);
        idx.insert(&a);
        idx.insert(&b);
        assert_eq!(idx.ref_count(Dimension::State, "On", "https://a/scn"), 2);

        idx.remove(&a);
        // One subscription remains; the URL must still be dispatched to.
        assert_eq!(idx.lookup(Dimension::State, "On"), ["https://a/scn"]);
        idx.remove(&b);
        assert!(idx.lookup(Dimension::State, "On").is_empty());
    }

    #[test]
    fn replace_is_wholesale() {
        let mut idx = SubscriptionIndex::new();
        let old = sub("https://a/scn", &["On", "Off"]);
        idx.insert(&old);
        let new = sub("https://a/scn", &["Ready"]);
        idx.replace(&old, &new);
        assert!(idx.lookup(Dimension::State, "On").is_empty());
        assert!(idx.lookup(Dimension::State, "Off").is_empty());
        assert_eq!(idx.lookup(Dimension::State, "Ready"), ["https://a/scn"]);
    }

    #[test]
    fn enabled_is_a_boolean_dimension() {
        let mut idx = SubscriptionIndex::new();
        let s = ScnSubscription {
            url: "https://a/scn".to_string(),
            enabled: Some(true),
            ..Default::default()
        };
        idx.insert(&s);
        assert_eq!(idx.lookup(Dimension::Enabled, "true"), ["https://a/scn"]);
        assert!(idx.lookup(Dimension::Enabled, "false").is_empty());
    }
}
