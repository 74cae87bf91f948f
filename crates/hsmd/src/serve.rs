use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hsm_api::{build_app, AppState};
use hsm_discovery::{
    DiscoverySettings, DiscoverySvc, HeartbeatClient, HttpHeartbeatClient, NoopHeartbeatClient,
};
use hsm_events::{BusMessage, ChannelStream, EventMonitor};
use hsm_locks::{run_expiry_sweep, LockEngine};
use hsm_scn::{DeliveryPool, ScnEngine};
use hsm_store::{HsmStore, InMemoryStore};
use hsm_vault::{CompCredentials, CredentialVault, HttpVault, MemoryVault};
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

use crate::cli::ServeArgs;

pub async fn run(args: ServeArgs) -> Result<()> {
    info!(instance = %args.smd_id, "starting hardware state manager");

    let store: Arc<dyn HsmStore> = Arc::new(InMemoryStore::new());
    let vault = build_vault(&args)?;
    let heartbeat = build_heartbeat(&args)?;

    // Startup recovery: anything stuck in-flight from a previous run.
    let reset = store
        .reset_stale_discoveries(chrono::Duration::minutes(args.stale_discovery_mins))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    if reset > 0 {
        warn!(count = reset, "reset stale in-flight discoveries");
    }

    let (scn, scn_rx) = ScnEngine::new(1024);
    let _delivery = DeliveryPool::spawn(scn_rx, args.scn_workers);

    // Rebuild the dispatch index from persisted subscriptions.
    for sub in store
        .get_scn_subscriptions()
        .await
        .map_err(|e| anyhow::anyhow!(e))?
    {
        scn.add_subscription(&sub).await;
    }

    let locks = LockEngine::new(store.clone());
    tokio::spawn(run_expiry_sweep(
        locks.clone(),
        Duration::from_secs(args.sweep_secs),
    ));
    spawn_stale_discovery_janitor(store.clone(), args.stale_discovery_mins);

    let discovery = Arc::new(DiscoverySvc::new(
        store.clone(),
        vault.clone(),
        heartbeat,
        scn.clone(),
        DiscoverySettings {
            http_timeout: Duration::from_secs(args.redfish_timeout_secs),
            ..Default::default()
        },
    ));

    seed_defaults(&args, &store, &vault, &discovery).await?;

    if let Some(listen) = &args.events_listen {
        spawn_event_ingress(listen.clone(), store.clone(), scn.clone()).await?;
    }

    let state = AppState {
        store,
        scn,
        locks,
        discovery,
        vault,
    };
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!(bind = %args.bind, "REST API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;
    Ok(())
}

fn build_vault(args: &ServeArgs) -> Result<Arc<dyn CredentialVault>> {
    match &args.vault_addr {
        Some(addr) => {
            let token_path = args
                .vault_token_path
                .as_ref()
                .context("--vault-token-path required with --vault-addr")?;
            let token = std::fs::read_to_string(token_path)
                .with_context(|| format!("reading vault token {}", token_path.display()))?;
            let vault = HttpVault::new(addr.clone(), args.vault_mount.clone(), token.trim())
                .map_err(|e| anyhow::anyhow!(e))?;
            info!(addr = %addr, mount = %args.vault_mount, "using HTTP credential vault");
            Ok(Arc::new(vault))
        }
        None => {
            warn!("no vault configured, credentials held in memory only");
            Ok(Arc::new(MemoryVault::new()))
        }
    }
}

fn build_heartbeat(args: &ServeArgs) -> Result<Arc<dyn HeartbeatClient>> {
    match &args.hbtd_url {
        Some(url) => {
            info!(url = %url, "heartbeat promotion enabled");
            Ok(Arc::new(
                HttpHeartbeatClient::new(url.clone()).map_err(|e| anyhow::anyhow!(e))?,
            ))
        }
        None => Ok(Arc::new(NoopHeartbeatClient)),
    }
}

/// Load the defaults file: node/power maps land in the store, seed endpoints
/// get their credentials vaulted and an initial discovery kicked off.
async fn seed_defaults(
    args: &ServeArgs,
    store: &Arc<dyn HsmStore>,
    vault: &Arc<dyn CredentialVault>,
    discovery: &Arc<DiscoverySvc>,
) -> Result<()> {
    let Some(path) = &args.defaults_file else {
        return Ok(());
    };
    let defaults = hsm_config::load_defaults(path)?;
    for map in defaults.node_maps {
        store.upsert_node_map(map).await.map_err(|e| anyhow::anyhow!(e))?;
    }
    for map in defaults.power_maps {
        store.upsert_power_map(map).await.map_err(|e| anyhow::anyhow!(e))?;
    }
    let mut seeded = Vec::new();
    for ep in defaults.redfish_endpoints {
        if !ep.user.is_empty() || !ep.password.is_empty() {
            let cred = CompCredentials {
                xname: ep.id.to_string(),
                username: ep.user.clone(),
                password: ep.password.clone(),
                url: format!("{}/redfish/v1", ep.fqdn),
            };
            if let Err(e) = vault.store_comp_cred(cred).await {
                warn!(endpoint = %ep.id, error = %e, "seeding credentials failed");
            }
        }
        let id = ep.id.clone();
        match store.insert_rf_endpoint(ep.scrubbed()).await {
            Ok(()) => seeded.push(id),
            Err(e) => warn!(endpoint = %id, error = %e, "seeding endpoint failed"),
        }
    }
    if !seeded.is_empty() {
        info!(count = seeded.len(), "running initial discovery for seeded endpoints");
        let discovery = discovery.clone();
        tokio::spawn(async move {
            if let Err(e) = discovery.discover_from_endpoints(&seeded, 0, false, false).await {
                warn!(error = %e, "initial discovery failed");
            }
        });
    }
    Ok(())
}

/// Periodically clear discovery slots that died mid-flight.
fn spawn_stale_discovery_janitor(store: Arc<dyn HsmStore>, stale_mins: i64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store
                .reset_stale_discoveries(chrono::Duration::minutes(stale_mins))
                .await
            {
                Ok(0) => {}
                Ok(n) => warn!(count = n, "reset stale in-flight discoveries"),
                Err(e) => warn!(error = %e, "stale discovery sweep failed"),
            }
        }
    });
}

/// Minimal bus ingress: newline-delimited JSON envelopes over TCP, fed to
/// the event monitor. Deployments with a real bus client embed
/// [`EventMonitor`] against their own `EventStream` instead.
async fn spawn_event_ingress(
    listen: String,
    store: Arc<dyn HsmStore>,
    scn: Arc<ScnEngine>,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("binding event ingress {}", listen))?;
    info!(bind = %listen, "redfish event ingress listening");

    let (tx, stream) = ChannelStream::new(1024);
    tokio::spawn(async move {
        let mut monitor = EventMonitor::new(store, scn);
        monitor.run(stream).await;
    });

    tokio::spawn(async move {
        loop {
            let Ok((socket, peer)) = listener.accept().await else {
                break;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = tokio::io::BufReader::new(socket).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    match serde_json::from_str::<BusMessage>(&line) {
                        Ok(msg) => {
                            if tx.send(msg).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!(%peer, error = %e, "undecodable event envelope"),
                    }
                }
            });
        }
    });
    Ok(())
}
