use async_trait::async_trait;
use hsm_domain::Xname;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("heartbeat service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("heartbeat service returned status {0}")]
    BadStatus(u16),
}

/// One node's heartbeat state as reported by the heartbeat tracking service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    #[serde(rename = "XName")]
    pub xname: String,
    #[serde(rename = "Heartbeating")]
    pub heartbeating: bool,
}

/// Seam to the external heartbeat tracker. Discovery promotes nodes found
/// `On` to `Ready` when they are actively heartbeating.
#[async_trait]
pub trait HeartbeatClient: Send + Sync + 'static {
    async fn get_heartbeat_status(
        &self,
        xnames: &[Xname],
    ) -> Result<Vec<HeartbeatStatus>, HeartbeatError>;
}

// ── HTTP implementation ───────────────────────────────────────────────────────

pub struct HttpHeartbeatClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHeartbeatClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, HeartbeatError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(HttpHeartbeatClient { client, base_url: base_url.into() })
    }
}

#[derive(Debug, Serialize)]
struct StatusQuery<'a> {
    #[serde(rename = "XNames")]
    xnames: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    #[serde(rename = "HBStates", default)]
    hb_states: Vec<HeartbeatStatus>,
}

#[async_trait]
impl HeartbeatClient for HttpHeartbeatClient {
    async fn get_heartbeat_status(
        &self,
        xnames: &[Xname],
    ) -> Result<Vec<HeartbeatStatus>, HeartbeatError> {
        if xnames.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/hmi/v1/hbstates", self.base_url.trim_end_matches('/'));
        let body = StatusQuery { xnames: xnames.iter().map(|x| x.as_str()).collect() };
        debug!(count = xnames.len(), "querying heartbeat states");
        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(HeartbeatError::BadStatus(resp.status().as_u16()));
        }
        let reply: StatusReply = resp.json().await?;
        Ok(reply.hb_states)
    }
}

/// Stand-in when no heartbeat service is configured: nothing heartbeats,
/// so discovery never promotes past `On`.
#[derive(Debug, Default, Clone)]
pub struct NoopHeartbeatClient;

#[async_trait]
impl HeartbeatClient for NoopHeartbeatClient {
    async fn get_heartbeat_status(
        &self,
        _xnames: &[Xname],
    ) -> Result<Vec<HeartbeatStatus>, HeartbeatError> {
        Ok(Vec::new())
    }
}
