use std::collections::HashMap;

use hsm_store::{ComponentFilter, HwInvHistFilter, RfEndpointFilter};

use crate::error::ApiError;

/// Repeated query keys collected into OR-lists, case-insensitively keyed.
/// (`?type=Node&type=NodeBMC&state=On` → `{type: [Node, NodeBMC], state: [On]}`.)
#[derive(Debug, Default)]
pub struct QueryLists(HashMap<String, Vec<String>>);

impl QueryLists {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> QueryLists {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in pairs {
            map.entry(k.to_ascii_lowercase()).or_default().push(v);
        }
        QueryLists(map)
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        self.0.get(key).cloned().unwrap_or_default()
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(|s| s.as_str())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.first(key)
            .map(|v| v.is_empty() || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

/// Build the component filter from `/State/Components` query parameters.
pub fn component_filter(q: &QueryLists) -> ComponentFilter {
    ComponentFilter {
        id: q.list("id"),
        hms_type: q.list("type"),
        state: q.list("state"),
        flag: q.list("flag"),
        enabled: q.list("enabled"),
        role: q.list("role"),
        sub_role: q.list("subrole"),
        software_status: q.list("softwarestatus"),
        subtype: q.list("subtype"),
        arch: q.list("arch"),
        class: q.list("class"),
        nid: q.list("nid"),
        nid_start: q.list("nid_start"),
        nid_end: q.list("nid_end"),
        group: q.list("group"),
        partition: q.list("partition"),
    }
}

pub fn rf_endpoint_filter(q: &QueryLists) -> RfEndpointFilter {
    RfEndpointFilter {
        id: q.list("id"),
        hms_type: q.list("type"),
        fqdn: q.list("fqdn"),
        uuid: q.list("uuid"),
        mac_addr: q.list("macaddr"),
        ip_addr: q.list("ipaddress"),
        last_status: q.list("laststatus"),
    }
}

pub fn hw_hist_filter(q: &QueryLists) -> Result<HwInvHistFilter, ApiError> {
    let parse_time = |key: &str| -> Result<Option<chrono::DateTime<chrono::Utc>>, ApiError> {
        match q.first(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("bad {} timestamp '{}'", key, raw))),
        }
    };
    Ok(HwInvHistFilter {
        id: q.list("id"),
        fru_id: q.list("fruid"),
        event_type: q.list("eventtype"),
        start_time: parse_time("starttime")?,
        end_time: parse_time("endtime")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_become_or_lists() {
        let q = QueryLists::from_pairs(vec![
            ("type".to_string(), "Node".to_string()),
            ("type".to_string(), "NodeBMC".to_string()),
            ("State".to_string(), "On".to_string()),
        ]);
        assert_eq!(q.list("type"), ["Node", "NodeBMC"]);
        assert_eq!(q.list("state"), ["On"], "keys are case-insensitive");
        assert!(q.list("flag").is_empty());
    }

    #[test]
    fn projection_flags() {
        let q = QueryLists::from_pairs(vec![
            ("stateonly".to_string(), "true".to_string()),
            ("flagonly".to_string(), String::new()),
        ]);
        assert!(q.flag("stateonly"));
        assert!(q.flag("flagonly"), "bare flag counts as set");
        assert!(!q.flag("roleonly"));
    }

    #[test]
    fn bad_history_time_rejected() {
        let q = QueryLists::from_pairs(vec![(
            "starttime".to_string(),
            "yesterday-ish".to_string(),
        )]);
        assert!(hw_hist_filter(&q).is_err());
    }
}
