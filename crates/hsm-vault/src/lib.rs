pub mod error;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hsm_domain::Xname;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

pub use error::VaultError;

/// Per-endpoint credentials as stored in the secure vault. These never land
/// in the HSM data store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompCredentials {
    #[serde(rename = "Xname")]
    pub xname: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "URL", default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

/// The secure credential store seam. Thread-safe per the external contract.
#[async_trait]
pub trait CredentialVault: Send + Sync + 'static {
    async fn get_comp_cred(&self, xname: &Xname) -> Result<CompCredentials, VaultError>;
    async fn store_comp_cred(&self, cred: CompCredentials) -> Result<(), VaultError>;
}

// ── HTTP implementation ───────────────────────────────────────────────────────

/// KV-style vault client: `GET/POST {base}/v1/{mount}/{xname}` with a token
/// header. The token is read once at construction.
pub struct HttpVault {
    client: reqwest::Client,
    base_url: String,
    mount: String,
    token: String,
}

impl HttpVault {
    pub fn new(base_url: impl Into<String>, mount: impl Into<String>, token: impl Into<String>) -> Result<Self, VaultError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(HttpVault {
            client,
            base_url: base_url.into(),
            mount: mount.into(),
            token: token.into(),
        })
    }

    fn path_for(&self, xname: &Xname) -> String {
        format!("{}/v1/{}/{}", self.base_url.trim_end_matches('/'), self.mount, xname)
    }
}

#[derive(Debug, Deserialize)]
struct KvReadResponse {
    data: CompCredentials,
}

#[async_trait]
impl CredentialVault for HttpVault {
    async fn get_comp_cred(&self, xname: &Xname) -> Result<CompCredentials, VaultError> {
        let path = self.path_for(xname);
        let resp = self
            .client
            .get(&path)
            .header("X-Vault-Token", self.token.as_str())
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(VaultError::NotFound(xname.to_string()));
        }
        if !resp.status().is_success() {
            return Err(VaultError::BadStatus { status: resp.status().as_u16(), path });
        }
        let body: KvReadResponse = resp.json().await?;
        Ok(body.data)
    }

    async fn store_comp_cred(&self, cred: CompCredentials) -> Result<(), VaultError> {
        let path = format!("{}/v1/{}/{}", self.base_url.trim_end_matches('/'), self.mount, cred.xname);
        debug!(xname = %cred.xname, "storing endpoint credentials");
        let resp = self
            .client
            .post(&path)
            .header("X-Vault-Token", self.token.as_str())
            .json(&serde_json::json!({ "data": cred }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(VaultError::BadStatus { status: resp.status().as_u16(), path });
        }
        Ok(())
    }
}

// ── In-memory implementation ──────────────────────────────────────────────────

/// Credential store backed by a map. Used by tests and by deployments that
/// run with the vault disabled.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    creds: Arc<RwLock<HashMap<String, CompCredentials>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    async fn get_comp_cred(&self, xname: &Xname) -> Result<CompCredentials, VaultError> {
        let guard = self.creds.read().await;
        guard
            .get(xname.as_str())
            .cloned()
            .ok_or_else(|| VaultError::NotFound(xname.to_string()))
    }

    async fn store_comp_cred(&self, cred: CompCredentials) -> Result<(), VaultError> {
        let mut guard = self.creds.write().await;
        guard.insert(cred.xname.clone(), cred);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_vault_round_trip() {
        let vault = MemoryVault::new();
        let xname = Xname::parse("x0c0s14b0").unwrap();
        vault
            .store_comp_cred(CompCredentials {
                xname: xname.to_string(),
                username: "root".to_string(),
                password: "s3cret".to_string(),
                url: String::new(),
            })
            .await
            .unwrap();

        let got = vault.get_comp_cred(&xname).await.unwrap();
        assert_eq!(got.username, "root");
        assert_eq!(got.password, "s3cret");
    }

    #[tokio::test]
    async fn memory_vault_missing_is_not_found() {
        let vault = MemoryVault::new();
        let err = vault
            .get_comp_cred(&Xname::parse("x9c0s0b0").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }
}
