use serde::{Deserialize, Serialize};

use crate::error::HsmError;

// ── HMS type lattice ──────────────────────────────────────────────────────────

/// Hardware Management Services component type.
///
/// The type of a component is determined purely by the syntax of its xname;
/// every valid xname maps to exactly one `HmsType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HmsType {
    #[serde(rename = "CDU")]
    Cdu,
    #[serde(rename = "CabinetCDU")]
    CabinetCdu,
    Cabinet,
    #[serde(rename = "CabinetPDUController")]
    CabinetPduController,
    #[serde(rename = "CabinetPDU")]
    CabinetPdu,
    #[serde(rename = "CabinetPDUOutlet")]
    CabinetPduOutlet,
    Chassis,
    #[serde(rename = "ChassisBMC")]
    ChassisBmc,
    #[serde(rename = "CMMRectifier")]
    CmmRectifier,
    MgmtSwitch,
    #[serde(rename = "MgmtHLSwitchEnclosure")]
    MgmtHlSwitchEnclosure,
    #[serde(rename = "MgmtHLSwitch")]
    MgmtHlSwitch,
    ComputeModule,
    NodeEnclosure,
    NodeEnclosurePowerSupply,
    #[serde(rename = "NodeBMC")]
    NodeBmc,
    Node,
    Processor,
    #[serde(rename = "NodeNIC")]
    NodeNic,
    #[serde(rename = "NodeHsnNic")]
    NodeHsnNic,
    Memory,
    NodeAccel,
    StorageGroup,
    Drive,
    RouterModule,
    #[serde(rename = "HSNBoard")]
    HsnBoard,
    #[serde(rename = "RouterBMC")]
    RouterBmc,
    Invalid,
}

impl HmsType {
    /// Wire name, e.g. `"NodeBMC"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            HmsType::Cdu => "CDU",
            HmsType::CabinetCdu => "CabinetCDU",
            HmsType::Cabinet => "Cabinet",
            HmsType::CabinetPduController => "CabinetPDUController",
            HmsType::CabinetPdu => "CabinetPDU",
            HmsType::CabinetPduOutlet => "CabinetPDUOutlet",
            HmsType::Chassis => "Chassis",
            HmsType::ChassisBmc => "ChassisBMC",
            HmsType::CmmRectifier => "CMMRectifier",
            HmsType::MgmtSwitch => "MgmtSwitch",
            HmsType::MgmtHlSwitchEnclosure => "MgmtHLSwitchEnclosure",
            HmsType::MgmtHlSwitch => "MgmtHLSwitch",
            HmsType::ComputeModule => "ComputeModule",
            HmsType::NodeEnclosure => "NodeEnclosure",
            HmsType::NodeEnclosurePowerSupply => "NodeEnclosurePowerSupply",
            HmsType::NodeBmc => "NodeBMC",
            HmsType::Node => "Node",
            HmsType::Processor => "Processor",
            HmsType::NodeNic => "NodeNIC",
            HmsType::NodeHsnNic => "NodeHsnNic",
            HmsType::Memory => "Memory",
            HmsType::NodeAccel => "NodeAccel",
            HmsType::StorageGroup => "StorageGroup",
            HmsType::Drive => "Drive",
            HmsType::RouterModule => "RouterModule",
            HmsType::HsnBoard => "HSNBoard",
            HmsType::RouterBmc => "RouterBMC",
            HmsType::Invalid => "Invalid",
        }
    }

    /// Parse a wire name case-insensitively. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<HmsType> {
        ALL_TYPES
            .iter()
            .map(|t| t.hms_type)
            .chain([HmsType::Invalid])
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }

    /// Whether components of this type expose a management controller of
    /// their own (they appear as RedfishEndpoints rather than children).
    pub fn is_controller(&self) -> bool {
        matches!(
            self,
            HmsType::NodeBmc
                | HmsType::RouterBmc
                | HmsType::ChassisBmc
                | HmsType::CabinetPduController
        )
    }
}

impl std::fmt::Display for HmsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HmsType {
    type Err = HsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HmsType::parse(s).ok_or_else(|| HsmError::BadType(s.to_string()))
    }
}

// ── Grammar table ─────────────────────────────────────────────────────────────

/// One entry per HMS type: the chain of single-letter segment prefixes that
/// spells an xname of that type. Order within the table is irrelevant; the
/// chain itself is the identity.
struct TypeDef {
    hms_type: HmsType,
    segments: &'static [char],
}

const ALL_TYPES: &[TypeDef] = &[
    TypeDef { hms_type: HmsType::Cdu, segments: &['d'] },
    TypeDef { hms_type: HmsType::Cabinet, segments: &['x'] },
    TypeDef { hms_type: HmsType::CabinetCdu, segments: &['x', 'd'] },
    TypeDef { hms_type: HmsType::CabinetPduController, segments: &['x', 'm'] },
    TypeDef { hms_type: HmsType::CabinetPdu, segments: &['x', 'm', 'p'] },
    TypeDef { hms_type: HmsType::CabinetPduOutlet, segments: &['x', 'm', 'p', 'j'] },
    TypeDef { hms_type: HmsType::Chassis, segments: &['x', 'c'] },
    TypeDef { hms_type: HmsType::ChassisBmc, segments: &['x', 'c', 'b'] },
    TypeDef { hms_type: HmsType::CmmRectifier, segments: &['x', 'c', 't'] },
    TypeDef { hms_type: HmsType::MgmtSwitch, segments: &['x', 'c', 'w'] },
    TypeDef { hms_type: HmsType::MgmtHlSwitchEnclosure, segments: &['x', 'c', 'h'] },
    TypeDef { hms_type: HmsType::MgmtHlSwitch, segments: &['x', 'c', 'h', 's'] },
    TypeDef { hms_type: HmsType::ComputeModule, segments: &['x', 'c', 's'] },
    TypeDef { hms_type: HmsType::NodeEnclosure, segments: &['x', 'c', 's', 'e'] },
    TypeDef { hms_type: HmsType::NodeEnclosurePowerSupply, segments: &['x', 'c', 's', 'e', 't'] },
    TypeDef { hms_type: HmsType::NodeBmc, segments: &['x', 'c', 's', 'b'] },
    TypeDef { hms_type: HmsType::Node, segments: &['x', 'c', 's', 'b', 'n'] },
    TypeDef { hms_type: HmsType::Processor, segments: &['x', 'c', 's', 'b', 'n', 'p'] },
    TypeDef { hms_type: HmsType::NodeNic, segments: &['x', 'c', 's', 'b', 'n', 'i'] },
    TypeDef { hms_type: HmsType::NodeHsnNic, segments: &['x', 'c', 's', 'b', 'n', 'h'] },
    TypeDef { hms_type: HmsType::Memory, segments: &['x', 'c', 's', 'b', 'n', 'd'] },
    TypeDef { hms_type: HmsType::NodeAccel, segments: &['x', 'c', 's', 'b', 'n', 'a'] },
    TypeDef { hms_type: HmsType::StorageGroup, segments: &['x', 'c', 's', 'b', 'n', 'g'] },
    TypeDef { hms_type: HmsType::Drive, segments: &['x', 'c', 's', 'b', 'n', 'g', 'k'] },
    TypeDef { hms_type: HmsType::RouterModule, segments: &['x', 'c', 'r'] },
    TypeDef { hms_type: HmsType::HsnBoard, segments: &['x', 'c', 'r', 'e'] },
    TypeDef { hms_type: HmsType::RouterBmc, segments: &['x', 'c', 'r', 'b'] },
];

/// Largest value a single numeric run may carry. Cabinet numbers run to four
/// digits on large systems; nothing in the grammar goes past that.
const MAX_SEGMENT_VALUE: u32 = 9999;

fn type_for_segments(prefixes: &[char]) -> Option<HmsType> {
    ALL_TYPES
        .iter()
        .find(|def| def.segments == prefixes)
        .map(|def| def.hms_type)
}

// ── Xname ─────────────────────────────────────────────────────────────────────

/// A canonical, validated xname.
///
/// Construction via [`Xname::parse`] lowercases the input, strips leading
/// zeros from every numeric run and verifies the segment chain against the
/// HMS grammar. The inner string is always the canonical form, so equality
/// and hashing behave as identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Xname {
    canonical: String,
    segments: Vec<(char, u32)>,
}

impl Xname {
    /// Parse and canonicalize. `x00C01` becomes `x0c1`.
    pub fn parse(s: &str) -> Result<Xname, HsmError> {
        let lower = s.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return Err(HsmError::BadId(s.to_string()));
        }

        let mut segments: Vec<(char, u32)> = Vec::new();
        let mut chars = lower.chars().peekable();
        while let Some(prefix) = chars.next() {
            if !prefix.is_ascii_lowercase() {
                return Err(HsmError::BadId(s.to_string()));
            }
            let mut digits = String::new();
            while let Some(c) = chars.peek() {
                if c.is_ascii_digit() {
                    digits.push(*c);
                    chars.next();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                return Err(HsmError::BadId(s.to_string()));
            }
            let value: u32 = digits.parse().map_err(|_| HsmError::BadId(s.to_string()))?;
            if value > MAX_SEGMENT_VALUE {
                return Err(HsmError::BadId(s.to_string()));
            }
            segments.push((prefix, value));
        }

        let prefixes: Vec<char> = segments.iter().map(|(p, _)| *p).collect();
        if type_for_segments(&prefixes).is_none() {
            return Err(HsmError::BadId(s.to_string()));
        }

        Ok(Xname { canonical: render(&segments), segments })
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// The HMS type this xname spells.
    pub fn hms_type(&self) -> HmsType {
        let prefixes: Vec<char> = self.segments.iter().map(|(p, _)| *p).collect();
        type_for_segments(&prefixes).unwrap_or(HmsType::Invalid)
    }

    /// The immediate parent, if the truncated chain is itself a valid type.
    pub fn parent(&self) -> Option<Xname> {
        if self.segments.len() < 2 {
            return None;
        }
        let parent_segs = &self.segments[..self.segments.len() - 1];
        let prefixes: Vec<char> = parent_segs.iter().map(|(p, _)| *p).collect();
        type_for_segments(&prefixes)?;
        Some(Xname { canonical: render(parent_segs), segments: parent_segs.to_vec() })
    }

    /// All ancestors, nearest first.
    pub fn ancestors(&self) -> Vec<Xname> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(p) = cur {
            cur = p.parent();
            out.push(p);
        }
        out
    }

    /// The trailing numeric index; the sibling ordinal within the parent.
    pub fn ordinal(&self) -> u32 {
        self.segments.last().map(|(_, v)| *v).unwrap_or(0)
    }

    /// Whether `self` sits anywhere underneath `other` in the hierarchy.
    pub fn is_child_of(&self, other: &Xname) -> bool {
        self.segments.len() > other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// Append one segment, yielding the child xname if the grammar allows it.
    pub fn child(&self, prefix: char, ordinal: u32) -> Result<Xname, HsmError> {
        let mut segments = self.segments.clone();
        segments.push((prefix, ordinal));
        let prefixes: Vec<char> = segments.iter().map(|(p, _)| *p).collect();
        if type_for_segments(&prefixes).is_none() {
            return Err(HsmError::BadId(format!("{}{}{}", self.canonical, prefix, ordinal)));
        }
        Ok(Xname { canonical: render(&segments), segments })
    }
}

fn render(segments: &[(char, u32)]) -> String {
    let mut out = String::new();
    for (prefix, value) in segments {
        out.push(*prefix);
        out.push_str(&value.to_string());
    }
    out
}

impl std::fmt::Display for Xname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

impl std::str::FromStr for Xname {
    type Err = HsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Xname::parse(s)
    }
}

impl Serialize for Xname {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for Xname {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Xname::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Classify an arbitrary string. Malformed input yields `HmsType::Invalid`
/// rather than an error; callers that need the error use [`Xname::parse`].
pub fn to_hms_type(s: &str) -> HmsType {
    Xname::parse(s).map(|x| x.hms_type()).unwrap_or(HmsType::Invalid)
}

/// Canonicalize a string: `(canonical, type)` or an error for garbage.
pub fn normalize(s: &str) -> Result<(String, HmsType), HsmError> {
    let x = Xname::parse(s)?;
    let t = x.hms_type();
    Ok((x.canonical, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_xname_parses_and_classifies() {
        let x = Xname::parse("x0c0s27b0n0").unwrap();
        assert_eq!(x.as_str(), "x0c0s27b0n0");
        assert_eq!(x.hms_type(), HmsType::Node);
    }

    #[test]
    fn canonicalization_strips_zeros_and_lowercases() {
        let x = Xname::parse("X00C01").unwrap();
        assert_eq!(x.as_str(), "x0c1");
        assert_eq!(x.hms_type(), HmsType::Chassis);
    }

    #[test]
    fn malformed_inputs_rejected() {
        for bad in ["", "x", "c0s0", "x0c0s0q0", "x0c0s0b0n0z9", "foo", "x0 c0"] {
            assert!(Xname::parse(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn segment_overflow_rejected() {
        assert!(Xname::parse("x10000").is_err());
        assert!(Xname::parse("x9999").is_ok());
    }

    #[test]
    fn parent_chain_walks_the_lattice() {
        let node = Xname::parse("x3000c0s9b0n0").unwrap();
        let bmc = node.parent().unwrap();
        assert_eq!(bmc.as_str(), "x3000c0s9b0");
        assert_eq!(bmc.hms_type(), HmsType::NodeBmc);

        let ancestors: Vec<String> =
            node.ancestors().iter().map(|a| a.as_str().to_string()).collect();
        assert_eq!(ancestors, vec!["x3000c0s9b0", "x3000c0s9", "x3000c0", "x3000"]);
    }

    #[test]
    fn drive_parent_is_storage_group() {
        let drive = Xname::parse("x0c0s0b0n0g0k1").unwrap();
        assert_eq!(drive.hms_type(), HmsType::Drive);
        assert_eq!(drive.parent().unwrap().hms_type(), HmsType::StorageGroup);
    }

    #[test]
    fn pdu_chain() {
        assert_eq!(to_hms_type("x0m0"), HmsType::CabinetPduController);
        assert_eq!(to_hms_type("x0m0p0"), HmsType::CabinetPdu);
        assert_eq!(to_hms_type("x0m0p0j1"), HmsType::CabinetPduOutlet);
    }

    #[test]
    fn ordinal_is_trailing_index() {
        assert_eq!(Xname::parse("x0c0s27b0n3").unwrap().ordinal(), 3);
        assert_eq!(Xname::parse("x17").unwrap().ordinal(), 17);
    }

    #[test]
    fn child_relationship() {
        let cab = Xname::parse("x0").unwrap();
        let node = Xname::parse("x0c0s0b0n0").unwrap();
        assert!(node.is_child_of(&cab));
        assert!(!cab.is_child_of(&node));

        let other = Xname::parse("x1c0s0b0n0").unwrap();
        assert!(!other.is_child_of(&cab));
    }

    #[test]
    fn child_builder_respects_grammar() {
        let bmc = Xname::parse("x0c0s0b0").unwrap();
        let node = bmc.child('n', 0).unwrap();
        assert_eq!(node.hms_type(), HmsType::Node);
        assert!(bmc.child('q', 0).is_err());
    }

    #[test]
    fn type_names_round_trip() {
        for t in [HmsType::NodeBmc, HmsType::CabinetPdu, HmsType::CmmRectifier] {
            assert_eq!(HmsType::parse(t.as_str()), Some(t));
        }
        assert_eq!(HmsType::parse("nodebmc"), Some(HmsType::NodeBmc));
        assert_eq!(HmsType::parse("NoSuchType"), None);
    }

    #[test]
    fn serde_rejects_bad_xname() {
        let ok: Result<Xname, _> = serde_json::from_str("\"x0c0s1b0\"");
        assert!(ok.is_ok());
        let bad: Result<Xname, _> = serde_json::from_str("\"bogus\"");
        assert!(bad.is_err());
    }
}
