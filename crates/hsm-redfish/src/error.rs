use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedfishError {
    #[error("GET {path} failed: {source}")]
    Get {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {path} returned status {status}")]
    BadStatus { path: String, status: u16 },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("client build failed: {0}")]
    Client(#[from] reqwest::Error),
}

impl RedfishError {
    /// Whether the failure was at the HTTP layer (vs. a decode problem).
    pub fn is_transport(&self) -> bool {
        matches!(self, RedfishError::Get { .. } | RedfishError::BadStatus { .. })
    }
}
