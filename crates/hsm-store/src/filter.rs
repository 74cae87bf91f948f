use hsm_domain::{
    Component, ComponentArch, ComponentClass, ComponentFlag, ComponentState, HmsType, HsmError,
    HwInvHist, HwInvHistEventType, RedfishEndpoint,
};
use chrono::{DateTime, Utc};

// ── Filter PODs ───────────────────────────────────────────────────────────────
//
// Fields are OR-lists of values; composition across fields is AND. Values are
// validated against the domain enums before matching so a bogus value fails
// the request instead of silently matching nothing.

/// Filter for `/State/Components` style queries.
#[derive(Debug, Clone, Default)]
pub struct ComponentFilter {
    pub id: Vec<String>,
    pub hms_type: Vec<String>,
    pub state: Vec<String>,
    pub flag: Vec<String>,
    pub enabled: Vec<String>,
    pub role: Vec<String>,
    pub sub_role: Vec<String>,
    pub software_status: Vec<String>,
    pub subtype: Vec<String>,
    pub arch: Vec<String>,
    pub class: Vec<String>,
    pub nid: Vec<String>,
    pub nid_start: Vec<String>,
    pub nid_end: Vec<String>,
    pub group: Vec<String>,
    pub partition: Vec<String>,
}

/// The validated, typed form of a [`ComponentFilter`].
#[derive(Debug, Clone, Default)]
pub struct CompiledComponentFilter {
    pub id: Vec<String>,
    pub hms_type: Vec<HmsType>,
    pub state: Vec<ComponentState>,
    pub flag: Vec<ComponentFlag>,
    pub enabled: Vec<bool>,
    pub role: Vec<String>,
    pub sub_role: Vec<String>,
    pub software_status: Vec<String>,
    pub subtype: Vec<String>,
    pub arch: Vec<ComponentArch>,
    pub class: Vec<ComponentClass>,
    pub nid: Vec<i64>,
    pub nid_ranges: Vec<(Option<i64>, Option<i64>)>,
    pub group: Vec<String>,
    pub partition: Vec<String>,
}

impl ComponentFilter {
    /// Validate every value and produce the typed filter.
    pub fn compile(&self) -> Result<CompiledComponentFilter, HsmError> {
        let mut out = CompiledComponentFilter::default();

        for raw in &self.id {
            let x = hsm_domain::Xname::parse(raw)?;
            out.id.push(x.as_str().to_string());
        }
        for raw in &self.hms_type {
            match HmsType::parse(raw) {
                Some(t) if t != HmsType::Invalid => out.hms_type.push(t),
                _ => return Err(HsmError::BadType(format!("type '{}'", raw))),
            }
        }
        for raw in &self.state {
            out.state.push(raw.parse()?);
        }
        for raw in &self.flag {
            out.flag.push(raw.parse()?);
        }
        for raw in &self.enabled {
            match raw.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => out.enabled.push(true),
                "false" | "f" | "0" => out.enabled.push(false),
                _ => return Err(HsmError::BadType(format!("enabled '{}'", raw))),
            }
        }
        for raw in &self.role {
            out.role.push(hsm_domain::verify_role(raw)?);
        }
        for raw in &self.sub_role {
            out.sub_role.push(hsm_domain::verify_subrole(raw)?);
        }
        out.software_status = self.software_status.clone();
        out.subtype = self.subtype.clone();
        for raw in &self.arch {
            out.arch.push(
                ComponentArch::parse(raw)
                    .ok_or_else(|| HsmError::BadType(format!("arch '{}'", raw)))?,
            );
        }
        for raw in &self.class {
            out.class.push(
                ComponentClass::parse(raw)
                    .ok_or_else(|| HsmError::BadType(format!("class '{}'", raw)))?,
            );
        }
        for raw in &self.nid {
            out.nid
                .push(raw.parse().map_err(|_| HsmError::BadId(format!("nid '{}'", raw)))?);
        }

        // nid_start/nid_end pair positionally; a lone start or end is open-ended.
        let starts: Result<Vec<i64>, _> = self.nid_start.iter().map(|s| s.parse()).collect();
        let ends: Result<Vec<i64>, _> = self.nid_end.iter().map(|s| s.parse()).collect();
        let starts = starts.map_err(|_| HsmError::BadId("nid_start".to_string()))?;
        let ends = ends.map_err(|_| HsmError::BadId("nid_end".to_string()))?;
        let n = starts.len().max(ends.len());
        for i in 0..n {
            out.nid_ranges.push((starts.get(i).copied(), ends.get(i).copied()));
        }

        for g in &self.group {
            hsm_domain::verify_group_label(g)?;
            out.group.push(g.clone());
        }
        for p in &self.partition {
            hsm_domain::verify_partition_name(p)?;
            out.partition.push(p.clone());
        }
        Ok(out)
    }
}

impl CompiledComponentFilter {
    /// Match one component against every populated field (group/partition
    /// membership is resolved by the store, which owns that data).
    pub fn matches(&self, c: &Component) -> bool {
        if !self.id.is_empty() && !self.id.iter().any(|v| v == c.id.as_str()) {
            return false;
        }
        if !self.hms_type.is_empty() && !self.hms_type.contains(&c.hms_type) {
            return false;
        }
        if !self.state.is_empty() && !self.state.contains(&c.state) {
            return false;
        }
        if !self.flag.is_empty() && !self.flag.contains(&c.flag) {
            return false;
        }
        if !self.enabled.is_empty()
            && !self.enabled.iter().any(|v| Some(*v) == c.enabled)
        {
            return false;
        }
        if !self.role.is_empty()
            && !self.role.iter().any(|v| c.role.as_deref() == Some(v.as_str()))
        {
            return false;
        }
        if !self.sub_role.is_empty()
            && !self.sub_role.iter().any(|v| c.sub_role.as_deref() == Some(v.as_str()))
        {
            return false;
        }
        if !self.software_status.is_empty()
            && !self
                .software_status
                .iter()
                .any(|v| c.software_status.as_deref().map_or(false, |s| s.eq_ignore_ascii_case(v)))
        {
            return false;
        }
        if !self.subtype.is_empty()
            && !self
                .subtype
                .iter()
                .any(|v| c.subtype.as_deref().map_or(false, |s| s.eq_ignore_ascii_case(v)))
        {
            return false;
        }
        if !self.arch.is_empty() && !self.arch.iter().any(|v| c.arch == Some(*v)) {
            return false;
        }
        if !self.class.is_empty() && !self.class.iter().any(|v| c.class == Some(*v)) {
            return false;
        }
        if !self.nid.is_empty() && !self.nid.iter().any(|v| c.nid == Some(*v)) {
            return false;
        }
        if !self.nid_ranges.is_empty() {
            let in_range = c.nid.map_or(false, |nid| {
                self.nid_ranges.iter().any(|(lo, hi)| {
                    lo.map_or(true, |l| nid >= l) && hi.map_or(true, |h| nid <= h)
                })
            });
            if !in_range {
                return false;
            }
        }
        true
    }
}

/// Filter for `/Inventory/RedfishEndpoints`.
#[derive(Debug, Clone, Default)]
pub struct RfEndpointFilter {
    pub id: Vec<String>,
    pub hms_type: Vec<String>,
    pub fqdn: Vec<String>,
    pub uuid: Vec<String>,
    pub mac_addr: Vec<String>,
    pub ip_addr: Vec<String>,
    pub last_status: Vec<String>,
}

impl RfEndpointFilter {
    pub fn validate(&self) -> Result<(), HsmError> {
        for raw in &self.id {
            hsm_domain::Xname::parse(raw)?;
        }
        for raw in &self.hms_type {
            if HmsType::parse(raw).map_or(true, |t| t == HmsType::Invalid) {
                return Err(HsmError::BadType(format!("type '{}'", raw)));
            }
        }
        Ok(())
    }

    pub fn matches(&self, ep: &RedfishEndpoint) -> bool {
        if !self.id.is_empty() && !self.id.iter().any(|v| v.eq_ignore_ascii_case(ep.id.as_str()))
        {
            return false;
        }
        if !self.hms_type.is_empty()
            && !self.hms_type.iter().any(|v| HmsType::parse(v) == Some(ep.hms_type))
        {
            return false;
        }
        if !self.fqdn.is_empty() && !self.fqdn.iter().any(|v| v.eq_ignore_ascii_case(&ep.fqdn)) {
            return false;
        }
        if !self.uuid.is_empty() && !self.uuid.iter().any(|v| v.eq_ignore_ascii_case(&ep.uuid)) {
            return false;
        }
        if !self.mac_addr.is_empty()
            && !self.mac_addr.iter().any(|v| v.eq_ignore_ascii_case(&ep.mac_addr))
        {
            return false;
        }
        if !self.ip_addr.is_empty() && !self.ip_addr.iter().any(|v| *v == ep.ip_addr) {
            return false;
        }
        if !self.last_status.is_empty()
            && !self
                .last_status
                .iter()
                .any(|v| v.eq_ignore_ascii_case(ep.discovery_info.last_status.as_str()))
        {
            return false;
        }
        true
    }
}

/// Filter for hardware-inventory history queries.
#[derive(Debug, Clone, Default)]
pub struct HwInvHistFilter {
    pub id: Vec<String>,
    pub fru_id: Vec<String>,
    pub event_type: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl HwInvHistFilter {
    pub fn validate(&self) -> Result<(), HsmError> {
        for raw in &self.event_type {
            if HwInvHistEventType::parse(raw).is_none() {
                return Err(HsmError::BadType(format!("eventtype '{}'", raw)));
            }
        }
        Ok(())
    }

    pub fn matches(&self, h: &HwInvHist) -> bool {
        if !self.id.is_empty() && !self.id.iter().any(|v| v.eq_ignore_ascii_case(h.id.as_str())) {
            return false;
        }
        if !self.fru_id.is_empty() && !self.fru_id.iter().any(|v| *v == h.fru_id) {
            return false;
        }
        if !self.event_type.is_empty()
            && !self
                .event_type
                .iter()
                .any(|v| HwInvHistEventType::parse(v) == Some(h.event_type))
        {
            return false;
        }
        if let Some(start) = self.start_time {
            if h.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if h.timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Filter for component ethernet interfaces.
#[derive(Debug, Clone, Default)]
pub struct EthInterfaceFilter {
    pub mac_addr: Vec<String>,
    pub ip_addr: Vec<String>,
    pub network: Vec<String>,
    pub component_id: Vec<String>,
    pub hms_type: Vec<String>,
    pub newer_than: Option<DateTime<Utc>>,
    pub older_than: Option<DateTime<Utc>>,
}

impl EthInterfaceFilter {
    pub fn matches(&self, ei: &hsm_domain::CompEthInterface) -> bool {
        if !self.mac_addr.is_empty()
            && !self.mac_addr.iter().any(|v| v.eq_ignore_ascii_case(&ei.mac_addr))
        {
            return false;
        }
        if !self.ip_addr.is_empty()
            && !self
                .ip_addr
                .iter()
                .any(|v| ei.ip_addresses.iter().any(|ip| ip.ip_address == *v))
        {
            return false;
        }
        if !self.network.is_empty()
            && !self
                .network
                .iter()
                .any(|v| ei.ip_addresses.iter().any(|ip| ip.network.eq_ignore_ascii_case(v)))
        {
            return false;
        }
        if !self.component_id.is_empty()
            && !self
                .component_id
                .iter()
                .any(|v| ei.component_id.as_ref().map_or(false, |c| c.as_str() == v))
        {
            return false;
        }
        if !self.hms_type.is_empty()
            && !self
                .hms_type
                .iter()
                .any(|v| ei.hms_type.map_or(false, |t| HmsType::parse(v) == Some(t)))
        {
            return false;
        }
        if let Some(newer) = self.newer_than {
            if ei.last_update.map_or(true, |t| t <= newer) {
                return false;
            }
        }
        if let Some(older) = self.older_than {
            if ei.last_update.map_or(true, |t| t >= older) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_domain::Xname;

    fn comp(id: &str, state: ComponentState, nid: Option<i64>) -> Component {
        let mut c = Component::new(Xname::parse(id).unwrap(), state);
        c.nid = nid;
        c
    }

    #[test]
    fn bad_type_value_fails_compile() {
        let f = ComponentFilter { hms_type: vec!["foo".to_string()], ..Default::default() };
        assert!(matches!(f.compile(), Err(HsmError::BadType(_))));
    }

    #[test]
    fn or_within_field_and_across_fields() {
        let f = ComponentFilter {
            hms_type: vec!["Node".to_string(), "NodeBMC".to_string()],
            state: vec!["On".to_string()],
            ..Default::default()
        };
        let cf = f.compile().unwrap();
        assert!(cf.matches(&comp("x0c0s0b0n0", ComponentState::On, None)));
        assert!(!cf.matches(&comp("x0c0s0b0n0", ComponentState::Off, None)));
        assert!(!cf.matches(&comp("x0c0", ComponentState::On, None)));
    }

    #[test]
    fn nid_range_matching() {
        let f = ComponentFilter {
            nid_start: vec!["10".to_string()],
            nid_end: vec!["20".to_string()],
            ..Default::default()
        };
        let cf = f.compile().unwrap();
        assert!(cf.matches(&comp("x0c0s0b0n0", ComponentState::On, Some(15))));
        assert!(!cf.matches(&comp("x0c0s0b0n0", ComponentState::On, Some(5))));
        assert!(!cf.matches(&comp("x0c0s0b0n0", ComponentState::On, None)));
    }

    #[test]
    fn state_values_case_insensitive() {
        let f = ComponentFilter { state: vec!["ready".to_string()], ..Default::default() };
        let cf = f.compile().unwrap();
        assert!(cf.matches(&comp("x0c0s0b0n0", ComponentState::Ready, None)));
    }
}
