//! API client for a running handover agent

use anyhow::{Context, Result};
use handover_lib::{registry::RegistrySnapshot, HealthResponse};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// HTTP client for the agent's health and registry endpoints
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid agent URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request, failing on any non-success status
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (status, body) = self.get_with_status::<serde_json::Value>(path).await?;
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        serde_json::from_value(body).context("Failed to parse response")
    }

    /// Make a GET request and return the status alongside the JSON body
    ///
    /// Health endpoints report problems with 503 and a normal body.
    pub async fn get_with_status<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    pub async fn health(&self) -> Result<(StatusCode, HealthResponse)> {
        self.get_with_status("healthz").await
    }

    pub async fn registry(&self) -> Result<RegistrySnapshot> {
        self.get("v1/registry").await
    }
}
