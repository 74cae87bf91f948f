use std::time::Duration;

use base64::Engine as _;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::RedfishError;

/// HTTPS GET client for one Redfish endpoint.
///
/// BMCs almost universally present self-signed certificates, so certificate
/// verification is off by default; the Basic auth header is computed once at
/// construction. Requests against a single endpoint are issued sequentially
/// by the caller, which is all the per-host rate limiting BMCs need.
pub struct RedfishClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: String,
}

impl RedfishClient {
    pub fn new(
        fqdn: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, RedfishError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
        Ok(RedfishClient {
            client,
            base_url: format!("https://{}", fqdn),
            auth_header: format!("Basic {}", credentials),
        })
    }

    /// GET a Redfish path (`/redfish/v1/...`) and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RedfishError> {
        let raw = self.get_raw(path).await?;
        serde_json::from_value(raw)
            .map_err(|source| RedfishError::Decode { path: path.to_string(), source })
    }

    /// GET a Redfish path, returning the undecoded JSON for passthrough.
    pub async fn get_raw(&self, path: &str) -> Result<serde_json::Value, RedfishError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "redfish GET");
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| RedfishError::Get { path: path.to_string(), source })?;
        if !resp.status().is_success() {
            return Err(RedfishError::BadStatus {
                path: path.to_string(),
                status: resp.status().as_u16(),
            });
        }
        resp.json()
            .await
            .map_err(|source| RedfishError::Get { path: path.to_string(), source })
    }
}
