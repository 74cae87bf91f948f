use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no credentials stored for {0}")]
    NotFound(String),

    #[error("vault request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("vault returned status {status} for {path}")]
    BadStatus { status: u16, path: String },

    #[error("vault response malformed: {0}")]
    Decode(#[from] serde_json::Error),
}
