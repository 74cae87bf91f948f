use std::path::Path;

use hsm_domain::{
    verify_role, verify_subrole, NodeMap, PowerMap, RedfishEndpoint, Xname,
};
use tracing::debug;

use crate::error::ConfigError;
use crate::raw::{RawDefaults, RawNodeMap, RawPowerMap, RawRedfishEndpoint};

/// Site defaults seeded into the store at startup.
#[derive(Debug, Default)]
pub struct Defaults {
    pub node_maps: Vec<NodeMap>,
    pub power_maps: Vec<PowerMap>,
    pub redfish_endpoints: Vec<RedfishEndpoint>,
}

/// Load and validate a defaults YAML file.
///
/// Expected shape:
/// ```text
/// node_maps:
///   - { id: x0c0s0b0n0, nid: 1, role: Compute }
/// power_maps:
///   - { id: x0c0s0b0n0, powered_by: [x0m0p0j1] }
/// redfish_endpoints:
///   - { id: x0c0s0b0, fqdn: bmc0.local, user: root }
/// ```
pub fn load_defaults(path: &Path) -> Result<Defaults, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawDefaults =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
            path: path.display().to_string(),
            source: e,
        })?;

    let path_str = path.display().to_string();
    let mut out = Defaults::default();
    for nm in raw.node_maps {
        out.node_maps.push(convert_node_map(nm, &path_str)?);
    }
    for pm in raw.power_maps {
        out.power_maps.push(convert_power_map(pm, &path_str)?);
    }
    for ep in raw.redfish_endpoints {
        out.redfish_endpoints.push(convert_endpoint(ep, &path_str)?);
    }
    debug!(
        node_maps = out.node_maps.len(),
        power_maps = out.power_maps.len(),
        endpoints = out.redfish_endpoints.len(),
        "loaded defaults from {}",
        path_str
    );
    Ok(out)
}

fn convert_node_map(raw: RawNodeMap, path: &str) -> Result<NodeMap, ConfigError> {
    let id = Xname::parse(&raw.id).map_err(|e| ConfigError::Conversion {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    let role = raw
        .role
        .as_deref()
        .map(verify_role)
        .transpose()
        .map_err(|e| ConfigError::Conversion { path: path.to_string(), message: e.to_string() })?;
    let sub_role = raw
        .sub_role
        .as_deref()
        .map(verify_subrole)
        .transpose()
        .map_err(|e| ConfigError::Conversion { path: path.to_string(), message: e.to_string() })?;
    let map = NodeMap { id, nid: raw.nid, role, sub_role };
    map.verify().map_err(|e| ConfigError::Conversion {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(map)
}

fn convert_power_map(raw: RawPowerMap, path: &str) -> Result<PowerMap, ConfigError> {
    let conv = |s: &String| {
        Xname::parse(s).map_err(|e| ConfigError::Conversion {
            path: path.to_string(),
            message: e.to_string(),
        })
    };
    Ok(PowerMap {
        id: conv(&raw.id)?,
        powered_by: raw.powered_by.iter().map(conv).collect::<Result<Vec<_>, _>>()?,
    })
}

fn convert_endpoint(raw: RawRedfishEndpoint, path: &str) -> Result<RedfishEndpoint, ConfigError> {
    let id = Xname::parse(&raw.id).map_err(|e| ConfigError::Conversion {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    let mut ep = RedfishEndpoint {
        hms_type: id.hms_type(),
        id,
        name: String::new(),
        hostname: raw.hostname,
        domain: raw.domain,
        fqdn: raw.fqdn,
        enabled: raw.enabled,
        uuid: String::new(),
        user: raw.user,
        password: raw.password,
        mac_addr: raw.mac_addr,
        ip_addr: raw.ip_addr,
        rediscover_on_update: raw.rediscover_on_update,
        discovery_info: Default::default(),
    };
    ep.normalize().map_err(|e| ConfigError::Conversion {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(ep)
}
