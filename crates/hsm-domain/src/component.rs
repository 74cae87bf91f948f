use serde::{Deserialize, Serialize};

use crate::error::HsmError;
use crate::xname::{HmsType, Xname};

// ── State / flag enums ────────────────────────────────────────────────────────

/// Logical component state as tracked by the state manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComponentState {
    Empty,
    Populated,
    Off,
    On,
    Standby,
    Halt,
    Ready,
    Paused,
    Unknown,
}

impl ComponentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentState::Empty => "Empty",
            ComponentState::Populated => "Populated",
            ComponentState::Off => "Off",
            ComponentState::On => "On",
            ComponentState::Standby => "Standby",
            ComponentState::Halt => "Halt",
            ComponentState::Ready => "Ready",
            ComponentState::Paused => "Paused",
            ComponentState::Unknown => "Unknown",
        }
    }

    /// Case-insensitive parse; REST clients send `"off"` and `"Off"` alike.
    pub fn parse(s: &str) -> Option<ComponentState> {
        [
            ComponentState::Empty,
            ComponentState::Populated,
            ComponentState::Off,
            ComponentState::On,
            ComponentState::Standby,
            ComponentState::Halt,
            ComponentState::Ready,
            ComponentState::Paused,
            ComponentState::Unknown,
        ]
        .into_iter()
        .find(|v| v.as_str().eq_ignore_ascii_case(s))
    }

    /// States reserved for the discovery path. Manual PATCHes into these
    /// require `Force`.
    pub fn is_discovery_owned(&self) -> bool {
        matches!(self, ComponentState::Empty | ComponentState::Populated)
    }
}

impl std::fmt::Display for ComponentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ComponentState {
    type Err = HsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentState::parse(s).ok_or_else(|| HsmError::BadType(format!("State '{}'", s)))
    }
}

impl<'de> Deserialize<'de> for ComponentState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ComponentFlag {
    #[default]
    OK,
    Warning,
    Alert,
    Locked,
}

impl ComponentFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentFlag::OK => "OK",
            ComponentFlag::Warning => "Warning",
            ComponentFlag::Alert => "Alert",
            ComponentFlag::Locked => "Locked",
        }
    }

    pub fn parse(s: &str) -> Option<ComponentFlag> {
        [ComponentFlag::OK, ComponentFlag::Warning, ComponentFlag::Alert, ComponentFlag::Locked]
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for ComponentFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ComponentFlag {
    type Err = HsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentFlag::parse(s).ok_or_else(|| HsmError::BadType(format!("Flag '{}'", s)))
    }
}

impl<'de> Deserialize<'de> for ComponentFlag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComponentArch {
    X86,
    ARM,
    Other,
    #[default]
    UNKNOWN,
}

impl ComponentArch {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentArch::X86 => "X86",
            ComponentArch::ARM => "ARM",
            ComponentArch::Other => "Other",
            ComponentArch::UNKNOWN => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<ComponentArch> {
        [ComponentArch::X86, ComponentArch::ARM, ComponentArch::Other, ComponentArch::UNKNOWN]
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for ComponentArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentClass {
    River,
    Mountain,
    Hill,
}

impl ComponentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentClass::River => "River",
            ComponentClass::Mountain => "Mountain",
            ComponentClass::Hill => "Hill",
        }
    }

    pub fn parse(s: &str) -> Option<ComponentClass> {
        [ComponentClass::River, ComponentClass::Mountain, ComponentClass::Hill]
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for ComponentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetType {
    Sling,
    Infiniband,
    Ethernet,
    OEM,
    None,
}

impl NetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetType::Sling => "Sling",
            NetType::Infiniband => "Infiniband",
            NetType::Ethernet => "Ethernet",
            NetType::OEM => "OEM",
            NetType::None => "None",
        }
    }
}

// ── Roles ─────────────────────────────────────────────────────────────────────

/// Recognized role values. Roles are stored as strings (sites extend the
/// set), but REST and SCN validation only admit these.
pub const KNOWN_ROLES: &[&str] =
    &["Compute", "Service", "System", "Application", "Storage", "Management"];

/// Recognized subrole values.
pub const KNOWN_SUBROLES: &[&str] = &["Master", "Worker", "Storage"];

/// Canonicalize a role string, case-insensitively, against [`KNOWN_ROLES`].
pub fn verify_role(s: &str) -> Result<String, HsmError> {
    KNOWN_ROLES
        .iter()
        .find(|r| r.eq_ignore_ascii_case(s))
        .map(|r| r.to_string())
        .ok_or_else(|| HsmError::BadType(format!("Role '{}'", s)))
}

/// Canonicalize a subrole string against [`KNOWN_SUBROLES`].
pub fn verify_subrole(s: &str) -> Result<String, HsmError> {
    KNOWN_SUBROLES
        .iter()
        .find(|r| r.eq_ignore_ascii_case(s))
        .map(|r| r.to_string())
        .ok_or_else(|| HsmError::BadType(format!("SubRole '{}'", s)))
}

// ── Component ─────────────────────────────────────────────────────────────────

/// The authoritative record for one piece of hardware (or hardware-adjacent
/// logical entity) in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "ID")]
    pub id: Xname,
    #[serde(rename = "Type")]
    pub hms_type: HmsType,
    #[serde(rename = "State")]
    pub state: ComponentState,
    #[serde(rename = "Flag", default)]
    pub flag: ComponentFlag,
    #[serde(rename = "Enabled", skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "SoftwareStatus", skip_serializing_if = "Option::is_none")]
    pub software_status: Option<String>,
    #[serde(rename = "Role", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "SubRole", skip_serializing_if = "Option::is_none")]
    pub sub_role: Option<String>,
    #[serde(rename = "NID", skip_serializing_if = "Option::is_none")]
    pub nid: Option<i64>,
    #[serde(rename = "Subtype", skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(rename = "NetType", skip_serializing_if = "Option::is_none")]
    pub net_type: Option<NetType>,
    #[serde(rename = "Arch", skip_serializing_if = "Option::is_none")]
    pub arch: Option<ComponentArch>,
    #[serde(rename = "Class", skip_serializing_if = "Option::is_none")]
    pub class: Option<ComponentClass>,
    #[serde(rename = "ReservationDisabled", default)]
    pub reservation_disabled: bool,
    #[serde(rename = "Locked", default)]
    pub locked: bool,
}

impl Component {
    /// A fresh component in the given state with everything else defaulted.
    pub fn new(id: Xname, state: ComponentState) -> Self {
        let hms_type = id.hms_type();
        Component {
            id,
            hms_type,
            state,
            flag: ComponentFlag::OK,
            enabled: Some(true),
            software_status: None,
            role: None,
            sub_role: None,
            nid: None,
            subtype: None,
            net_type: None,
            arch: None,
            class: None,
            reservation_disabled: false,
            locked: false,
        }
    }

    /// Check the `Type`-matches-`ID` invariant. Stored components must pass.
    pub fn verify(&self) -> Result<(), HsmError> {
        if self.id.hms_type() != self.hms_type {
            return Err(HsmError::BadType(format!(
                "Type '{}' does not match xname '{}'",
                self.hms_type, self.id
            )));
        }
        Ok(())
    }

    /// Whether a manual transition to `new` is admissible.
    ///
    /// Without `force`, the discovery-owned states (Empty, Populated) cannot
    /// be entered by hand. Transitions to the current state are admitted and
    /// become no-ops at the store layer.
    pub fn allow_transition(&self, new: ComponentState, force: bool) -> Result<(), HsmError> {
        if force {
            return Ok(());
        }
        if new.is_discovery_owned() && self.state != new {
            return Err(HsmError::BadType(format!(
                "State '{}' requires Force (from '{}')",
                new, self.state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_parse_is_case_insensitive() {
        assert_eq!(ComponentState::parse("off"), Some(ComponentState::Off));
        assert_eq!(ComponentState::parse("READY"), Some(ComponentState::Ready));
        assert_eq!(ComponentState::parse("bogus"), None);
    }

    #[test]
    fn component_serializes_with_wire_names() {
        let c = Component::new(Xname::parse("x0c0s27b0n0").unwrap(), ComponentState::Off);
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["ID"], "x0c0s27b0n0");
        assert_eq!(v["Type"], "Node");
        assert_eq!(v["State"], "Off");
        assert_eq!(v["Flag"], "OK");
        // Unset optionals are omitted entirely.
        assert!(v.get("NID").is_none());
    }

    #[test]
    fn verify_catches_type_id_disagreement() {
        let mut c = Component::new(Xname::parse("x0c0s0b0n0").unwrap(), ComponentState::On);
        assert!(c.verify().is_ok());
        c.hms_type = HmsType::Chassis;
        assert!(c.verify().is_err());
    }

    #[test]
    fn discovery_owned_states_need_force() {
        let c = Component::new(Xname::parse("x0c0s0b0n0").unwrap(), ComponentState::On);
        assert!(c.allow_transition(ComponentState::Off, false).is_ok());
        assert!(c.allow_transition(ComponentState::Empty, false).is_err());
        assert!(c.allow_transition(ComponentState::Empty, true).is_ok());
    }

    #[test]
    fn role_canonicalization() {
        assert_eq!(verify_role("compute").unwrap(), "Compute");
        assert!(verify_role("overlord").is_err());
        assert_eq!(verify_subrole("WORKER").unwrap(), "Worker");
    }
}
