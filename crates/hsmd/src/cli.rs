use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "hsmd",
    about = "Hardware State Manager: discovery, inventory, state and locking for HPC hardware",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Serve options also apply when no subcommand is given.
    #[command(flatten)]
    pub serve: ServeArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HSM service (the default).
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct ServeArgs {
    /// Address to serve the REST API on.
    #[arg(long, env = "HSM_BIND", default_value = "0.0.0.0:27779")]
    pub bind: String,

    /// Instance identifier, used in logs when several HSMs coexist.
    #[arg(long, env = "SMD_ID", default_value = "hsm0")]
    pub smd_id: String,

    /// YAML defaults file (NodeMaps, PowerMaps, seed RedfishEndpoints).
    #[arg(long, env = "HSM_DEFAULTS_FILE")]
    pub defaults_file: Option<PathBuf>,

    /// Credential vault base URL. Without it an in-memory vault is used.
    #[arg(long, env = "HSM_VAULT_ADDR")]
    pub vault_addr: Option<String>,

    /// File containing the vault token.
    #[arg(long, env = "HSM_VAULT_TOKEN_PATH")]
    pub vault_token_path: Option<PathBuf>,

    /// Vault KV mount holding per-endpoint credentials.
    #[arg(long, env = "HSM_VAULT_MOUNT", default_value = "hms-creds")]
    pub vault_mount: String,

    /// Heartbeat tracking service URL; enables On→Ready promotion.
    #[arg(long, env = "HSM_HBTD_URL")]
    pub hbtd_url: Option<String>,

    /// Listen address for newline-delimited Redfish event envelopes.
    #[arg(long, env = "HSM_EVENTS_LISTEN")]
    pub events_listen: Option<String>,

    /// Outbound SCN delivery workers.
    #[arg(long, env = "HSM_SCN_WORKERS", default_value_t = 4)]
    pub scn_workers: usize,

    /// Seconds between reservation expiry sweeps.
    #[arg(long, env = "HSM_SWEEP_SECS", default_value_t = 30)]
    pub sweep_secs: u64,

    /// Minutes after which an in-flight discovery is considered stale.
    #[arg(long, env = "HSM_STALE_DISCOVERY_MINS", default_value_t = 30)]
    pub stale_discovery_mins: i64,

    /// Per-request Redfish timeout, seconds.
    #[arg(long, env = "HSM_REDFISH_TIMEOUT_SECS", default_value_t = 40)]
    pub redfish_timeout_secs: u64,
}
