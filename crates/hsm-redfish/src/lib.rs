pub mod client;
pub mod discover;
pub mod error;
pub mod raw;

pub use client::RedfishClient;
pub use discover::{
    apply_fru_id_tiebreak, classify_chassis, discover_endpoint, ordinal_from_id,
    ComponentDetail, DiscoveredComponent, DiscoveredService, RedfishEndpointTree,
    RedfishEpDescription, RfResourceKind,
};
pub use error::RedfishError;
