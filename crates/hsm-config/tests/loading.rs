use std::io::Write;

use hsm_config::{load_defaults, ConfigError};

fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("hsm-defaults-{}-{}.yml", std::process::id(), name));
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn loads_full_defaults_file() {
    let path = write_temp(
        "full",
        r#"
node_maps:
  - id: x0c0s0b0n0
    nid: 1
    role: Compute
  - id: x0c0s0b1n0
    nid: 2
    role: Service
    sub_role: Worker
power_maps:
  - id: x0c0s0b0n0
    powered_by: [x0m0p0j1, x0m0p0j2]
redfish_endpoints:
  - id: x0c0s0b0
    fqdn: bmc0.local
    user: root
"#,
    );
    let defaults = load_defaults(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(defaults.node_maps.len(), 2);
    assert_eq!(defaults.node_maps[0].nid, 1);
    assert_eq!(defaults.node_maps[1].sub_role.as_deref(), Some("Worker"));
    assert_eq!(defaults.power_maps[0].powered_by.len(), 2);
    assert_eq!(defaults.redfish_endpoints[0].fqdn, "bmc0.local");
    assert_eq!(defaults.redfish_endpoints[0].hostname, "bmc0");
}

#[test]
fn bad_xname_is_a_conversion_error() {
    let path = write_temp("badxname", "node_maps:\n  - { id: bogus, nid: 1 }\n");
    let err = load_defaults(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(matches!(err, ConfigError::Conversion { .. }));
}

#[test]
fn missing_file_is_io_error() {
    let err = load_defaults(std::path::Path::new("/no/such/defaults.yml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
