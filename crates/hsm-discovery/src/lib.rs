pub mod heartbeat;
pub mod history;
pub mod orchestrator;
pub mod translate;

pub use heartbeat::{
    HeartbeatClient, HeartbeatError, HeartbeatStatus, HttpHeartbeatClient, NoopHeartbeatClient,
};
pub use history::generate_history;
pub use orchestrator::{DiscoverySettings, DiscoverySvc};
pub use translate::{build_entities, EntitySlices};
