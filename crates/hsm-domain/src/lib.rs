pub mod component;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod group;
pub mod inventory;
pub mod lock;
pub mod scn;
pub mod xname;

pub use component::{
    verify_role, verify_subrole, Component, ComponentArch, ComponentClass, ComponentFlag,
    ComponentState, NetType, KNOWN_ROLES, KNOWN_SUBROLES,
};
pub use discovery::{DiscoveryState, DiscoveryStatus};
pub use endpoint::{
    ComponentEndpoint, ComponentEndpointInfo, DiscoveryInfo, EndpointStatus, EthernetNicInfo,
    RedfishChassisInfo, RedfishEndpoint, RedfishManagerInfo, RedfishOutletInfo, RedfishPduInfo,
    RedfishService, RedfishSystemInfo, ServiceEndpoint,
};
pub use error::HsmError;
pub use group::{
    verify_group_label, verify_partition_name, Group, Members, Membership, NodeMap, Partition,
    PowerMap,
};
pub use inventory::{
    build_fru_id, mac_to_eth_interface_id, CompEthInterface, DriveFruInfo, FruIdentity,
    HwFruInfo, HwInvByFru, HwInvByLoc, HwInvHist, HwInvHistEventType, HwLocInfo,
    IpAddressMapping, MemoryFruInfo, MemoryLocation, MemoryLocationInfo, MemorySummary,
    NodeFruInfo, NodeLocationInfo, ProcessorFruInfo, ProcessorLocationInfo, ProcessorSummary,
    StdLocationInfo,
};
pub use lock::{
    verify_reservation_duration, ComponentLockState, FailReason, ProcessingModel, Reservation,
    ReservationCheck, RESERVATION_DURATION_MAX, RESERVATION_DURATION_MIN,
};
pub use scn::{ScnPayload, ScnSubscription};
pub use xname::{normalize, to_hms_type, HmsType, Xname};
