use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One Redfish alert inside a bus envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedfishAlert {
    #[serde(rename = "MessageId", default)]
    pub message_id: String,
    #[serde(rename = "MessageArgs", default)]
    pub message_args: Vec<String>,
    #[serde(rename = "OriginOfCondition", default, skip_serializing_if = "Option::is_none")]
    pub origin_of_condition: Option<OriginRef>,
    #[serde(rename = "EventTimestamp", default, skip_serializing_if = "String::is_empty")]
    pub event_timestamp: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OriginRef {
    #[serde(rename = "@odata.id", default)]
    pub odata_id: String,
}

/// The JSON envelope consumed from the message bus: the emitting endpoint
/// plus its batch of alerts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(rename = "Source", default)]
    pub source: String,
    #[serde(rename = "Events", default)]
    pub events: Vec<RedfishAlert>,
}

/// Seam to the message-bus client library. The monitor only ever pulls.
#[async_trait]
pub trait EventStream: Send + 'static {
    /// Next envelope, or `None` when the stream is closed.
    async fn next(&mut self) -> Option<BusMessage>;
}

/// Channel-backed stream: the in-process feed used by tests and by any
/// embedding that already has the bus client elsewhere.
pub struct ChannelStream {
    rx: mpsc::Receiver<BusMessage>,
}

impl ChannelStream {
    pub fn new(capacity: usize) -> (mpsc::Sender<BusMessage>, ChannelStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, ChannelStream { rx })
    }
}

#[async_trait]
impl EventStream for ChannelStream {
    async fn next(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }
}
