//! API client for communicating with the management server

use anyhow::{Context, Result};
use manager_lib::{HealthResponse, ReadinessResponse, RevisionRecord, RollbackOutcome, UsageReport};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the management server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

/// Error body returned by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let request = self.client.get(self.url(segments)?);
        self.send(request, &[]).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let request = self.client.post(self.url(segments)?).json(body);
        self.send(request, &[]).await
    }

    /// Send a request, decoding the body for success or any `also_accept` status
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        also_accept: &[StatusCode],
    ) -> Result<T> {
        let response = request.send().await.context("Failed to send request")?;
        let status = response.status();

        if !status.is_success() && !also_accept.contains(&status) {
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(error) => anyhow::bail!("API error ({}, {}): {}", status, error.kind, error.error),
                Err(_) => anyhow::bail!("API error ({}): {}", status, body),
            }
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn container_stats(&self, container: &str) -> Result<UsageReport> {
        self.get(&["api", "v1", "docker", "containers", container, "stats"])
            .await
    }

    pub async fn history(
        &self,
        namespace: Option<&str>,
        deployment: &str,
    ) -> Result<Vec<RevisionRecord>> {
        self.get(&deployment_path(namespace, deployment, "history"))
            .await
    }

    pub async fn rollback(
        &self,
        namespace: Option<&str>,
        deployment: &str,
        revision: Option<u64>,
    ) -> Result<RollbackOutcome> {
        self.post(
            &deployment_path(namespace, deployment, "rollback"),
            &RollbackRequest { revision },
        )
        .await
    }

    /// Liveness report; an unhealthy server still answers with a body
    pub async fn health(&self) -> Result<HealthResponse> {
        let request = self.client.get(self.url(&["healthz"])?);
        self.send(request, &[StatusCode::SERVICE_UNAVAILABLE]).await
    }

    pub async fn readiness(&self) -> Result<ReadinessResponse> {
        let request = self.client.get(self.url(&["readyz"])?);
        self.send(request, &[StatusCode::SERVICE_UNAVAILABLE]).await
    }
}

/// Deployment route segments, falling back to the server's default namespace
fn deployment_path<'a>(
    namespace: Option<&'a str>,
    deployment: &'a str,
    action: &'a str,
) -> Vec<&'a str> {
    let mut segments = vec!["api", "v1", "k8s"];
    if let Some(ns) = namespace {
        segments.extend(["namespaces", ns]);
    }
    segments.extend(["deployments", deployment, action]);
    segments
}
