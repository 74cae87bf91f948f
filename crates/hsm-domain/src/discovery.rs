use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one discovery run.
///
/// Transitions: NotStarted → Pending → InProgress → Complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiscoveryState {
    #[default]
    NotStarted,
    Pending,
    InProgress,
    Complete,
}

impl DiscoveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryState::NotStarted => "NotStarted",
            DiscoveryState::Pending => "Pending",
            DiscoveryState::InProgress => "InProgress",
            DiscoveryState::Complete => "Complete",
        }
    }
}

impl std::fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status record for a numbered discovery slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryStatus {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Status")]
    pub status: DiscoveryState,
    #[serde(rename = "LastUpdateTime")]
    pub last_update: DateTime<Utc>,
}

impl DiscoveryStatus {
    pub fn new(id: u32, status: DiscoveryState) -> Self {
        DiscoveryStatus { id, status, last_update: Utc::now() }
    }
}
