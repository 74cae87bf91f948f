pub mod engine;
pub mod types;

pub use engine::{run_expiry_sweep, LockEngine};
pub use types::{
    Counts, FailedComponent, KeyEntry, LockRequest, LockResponse, LockStatusResponse,
    ReservationCheckEntry, ReservationCheckResponse, ReservationCreateRequest,
    ReservationCreateResponse, ReservationGrant, ReservationKeyRequest, SuccessIds,
};
