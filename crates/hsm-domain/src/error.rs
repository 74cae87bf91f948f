use thiserror::Error;

/// The error taxonomy shared by the store and the engines layered on it.
///
/// REST handlers map these onto problem+json responses: `BadId`/`BadType`/
/// `ArgMissing`/`ArgNoMatch` → 400, `NotFound` → 404, `DuplicateKey`/
/// `ExclusiveGroup`/`ExclusivePartition` → 409, `Closed` → 503 on readiness
/// probes, everything else → 500.
#[derive(Debug, Error)]
pub enum HsmError {
    #[error("invalid xname: {0}")]
    BadId(String),

    #[error("invalid type value: {0}")]
    BadType(String),

    #[error("missing required argument: {0}")]
    ArgMissing(String),

    #[error("argument matched no entries: {0}")]
    ArgNoMatch(String),

    #[error("too many arguments: {0}")]
    ArgTooMany(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("would violate exclusive group '{group}' for {id}")]
    ExclusiveGroup { id: String, group: String },

    #[error("component {0} is already in a partition")]
    ExclusivePartition(String),

    #[error("reservation key does not match")]
    LockBadKey,

    #[error("reservation has expired")]
    LockExpired,

    #[error("invalid processing model: {0}")]
    LockBadProcessingModel(String),

    #[error("reservation duration out of range: {0} minutes")]
    LockBadDuration(u32),

    #[error("store is closed")]
    Closed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl HsmError {
    /// Whether this error is a per-item argument problem that batch
    /// discovery swallows (skip the item, keep the batch).
    pub fn is_arg_error(&self) -> bool {
        matches!(self, HsmError::BadId(_) | HsmError::BadType(_))
    }
}
