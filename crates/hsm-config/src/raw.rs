use serde::Deserialize;

/// On-disk shape of the defaults file, before validation.
#[derive(Debug, Default, Deserialize)]
pub struct RawDefaults {
    #[serde(default)]
    pub node_maps: Vec<RawNodeMap>,
    #[serde(default)]
    pub power_maps: Vec<RawPowerMap>,
    #[serde(default)]
    pub redfish_endpoints: Vec<RawRedfishEndpoint>,
}

#[derive(Debug, Deserialize)]
pub struct RawNodeMap {
    pub id: String,
    pub nid: i64,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub sub_role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawPowerMap {
    pub id: String,
    #[serde(default)]
    pub powered_by: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawRedfishEndpoint {
    pub id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub fqdn: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub rediscover_on_update: bool,
    #[serde(default)]
    pub mac_addr: String,
    #[serde(default)]
    pub ip_addr: String,
}

fn default_true() -> bool {
    true
}
