use serde::{Deserialize, Serialize};

use crate::error::HsmError;
use crate::xname::Xname;

// ── Labels and names ──────────────────────────────────────────────────────────

/// Validate a group label: lowercase `[a-z0-9_-]+`, 255 chars max.
pub fn verify_group_label(label: &str) -> Result<(), HsmError> {
    if label.is_empty() || label.len() > 255 {
        return Err(HsmError::BadId(format!("group label '{}'", label)));
    }
    if !label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(HsmError::BadId(format!("group label '{}'", label)));
    }
    Ok(())
}

/// Validate a partition name: `p<d>` or `p<d>.<d>`.
pub fn verify_partition_name(name: &str) -> Result<(), HsmError> {
    let rest = name
        .strip_prefix('p')
        .ok_or_else(|| HsmError::BadId(format!("partition name '{}'", name)))?;
    let mut parts = rest.splitn(2, '.');
    let valid = |s: Option<&str>| {
        s.map(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())).unwrap_or(false)
    };
    let hard = parts.next();
    let soft = parts.next();
    if !valid(hard) || (soft.is_some() && !valid(soft)) {
        return Err(HsmError::BadId(format!("partition name '{}'", name)));
    }
    Ok(())
}

// ── Groups / partitions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Members {
    #[serde(rename = "IDs", default)]
    pub ids: Vec<Xname>,
}

/// An arbitrary, admin-defined set of components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "Tags", default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Groups sharing an ExclusiveGroup tag have mutually exclusive members.
    #[serde(rename = "ExclusiveGroup", default, skip_serializing_if = "String::is_empty")]
    pub exclusive_group: String,
    #[serde(rename = "Members", default)]
    pub members: Members,
}

impl Group {
    pub fn verify(&self) -> Result<(), HsmError> {
        verify_group_label(&self.label)?;
        if !self.exclusive_group.is_empty() {
            verify_group_label(&self.exclusive_group)?;
        }
        Ok(())
    }
}

/// A hard partition of the system. A component is in at most one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "Tags", default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(rename = "Members", default)]
    pub members: Members,
}

impl Partition {
    pub fn verify(&self) -> Result<(), HsmError> {
        verify_partition_name(&self.name)
    }
}

/// Derived view: where one component sits across groups and partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(rename = "ID")]
    pub id: Xname,
    #[serde(rename = "groupLabels", default)]
    pub group_labels: Vec<String>,
    #[serde(rename = "partitionName", default, skip_serializing_if = "Option::is_none")]
    pub partition_name: Option<String>,
}

// ── Power maps / node maps ────────────────────────────────────────────────────

/// Which supplies feed a component; admin-maintained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerMap {
    #[serde(rename = "ID")]
    pub id: Xname,
    #[serde(rename = "PoweredBy", default)]
    pub powered_by: Vec<Xname>,
}

/// Pre-seeded NID/role defaults applied to nodes at discovery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMap {
    #[serde(rename = "ID")]
    pub id: Xname,
    #[serde(rename = "NID")]
    pub nid: i64,
    #[serde(rename = "Role", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "SubRole", default, skip_serializing_if = "Option::is_none")]
    pub sub_role: Option<String>,
}

impl NodeMap {
    pub fn verify(&self) -> Result<(), HsmError> {
        if self.id.hms_type() != crate::xname::HmsType::Node {
            return Err(HsmError::BadType(format!("NodeMap xname '{}' is not a Node", self.id)));
        }
        if self.nid < 0 {
            return Err(HsmError::BadId(format!("NID {}", self.nid)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_labels() {
        assert!(verify_group_label("blue-team_01").is_ok());
        assert!(verify_group_label("Blue").is_err());
        assert!(verify_group_label("").is_err());
        assert!(verify_group_label("has space").is_err());
    }

    #[test]
    fn partition_names() {
        assert!(verify_partition_name("p1").is_ok());
        assert!(verify_partition_name("p2.4").is_ok());
        assert!(verify_partition_name("p").is_err());
        assert!(verify_partition_name("part1").is_err());
        assert!(verify_partition_name("p1.").is_err());
        assert!(verify_partition_name("1.2").is_err());
    }

    #[test]
    fn nodemap_verify() {
        let ok = NodeMap {
            id: Xname::parse("x0c0s0b0n0").unwrap(),
            nid: 1,
            role: Some("Compute".to_string()),
            sub_role: None,
        };
        assert!(ok.verify().is_ok());

        let bad = NodeMap { id: Xname::parse("x0c0s0b0").unwrap(), ..ok };
        assert!(bad.verify().is_err());
    }
}
