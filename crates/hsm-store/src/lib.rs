pub mod filter;
pub mod memory;
pub mod store;

pub use filter::{
    CompiledComponentFilter, ComponentFilter, EthInterfaceFilter, HwInvHistFilter,
    RfEndpointFilter,
};
pub use memory::InMemoryStore;
pub use store::{BatchResult, ComponentChange, HsmStore, RfEndpointDeletion};

// The store speaks the shared taxonomy directly.
pub use hsm_domain::HsmError;
