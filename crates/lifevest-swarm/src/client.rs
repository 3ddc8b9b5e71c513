//! HTTP client for the Docker Engine API

use async_trait::async_trait;
use lifevest_core::{Document, ObjectKind};
use serde::Deserialize;

use crate::api::{ListedObject, Node, SwarmApi};
use crate::credentials::RegistryAuth;
use crate::endpoint::SwarmEndpoint;
use crate::error::{Result, SwarmError};

/// Error body returned by the daemon on non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Response of the `/create` endpoints
#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Warnings", default)]
    warnings: Option<Vec<String>>,
}

/// Docker Engine API client for one Swarm manager
pub struct DockerClient {
    client: reqwest::Client,
    endpoint: SwarmEndpoint,
    base_url: String,
}

impl DockerClient {
    /// Create a client for a parsed endpoint
    pub fn new(endpoint: SwarmEndpoint) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lifevest/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| SwarmError::Network(e.to_string()))?;

        let base_url = endpoint.base_url();
        Ok(Self {
            client,
            endpoint,
            base_url,
        })
    }

    /// Parse an endpoint string and create a client for it
    pub fn connect(endpoint: &str) -> Result<Self> {
        Self::new(SwarmEndpoint::parse(endpoint)?)
    }

    /// The endpoint this client talks to
    pub fn endpoint(&self) -> &SwarmEndpoint {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-2xx response into an API error
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                } else {
                    trimmed.to_string()
                }
            });

        Err(SwarmError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SwarmApi for DockerClient {
    async fn list(&self, kind: ObjectKind) -> Result<Vec<ListedObject>> {
        let url = self.url(kind.plural());
        tracing::debug!(%url, "listing {}", kind.plural());

        let response = Self::check(self.client.get(&url).send().await?).await?;
        let objects: Vec<ListedObject> = response.json().await?;
        tracing::debug!("found {} {}", objects.len(), kind.plural());
        Ok(objects)
    }

    async fn create(
        &self,
        kind: ObjectKind,
        spec: &Document,
        auth: Option<&RegistryAuth>,
    ) -> Result<String> {
        let url = self.url(&format!("{}/create", kind.plural()));
        let mut request = self.client.post(&url).json(spec);
        if kind == ObjectKind::Service
            && let Some(auth) = auth
        {
            request = request.header("X-Registry-Auth", auth.header_value()?);
        }

        let response = Self::check(request.send().await?).await?;
        let created: CreateResponse = response.json().await?;
        for warning in created.warnings.unwrap_or_default() {
            tracing::warn!(id = %created.id, "daemon warning: {}", warning);
        }
        Ok(created.id)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let response = Self::check(self.client.get(self.url("nodes")).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn remove_service(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("services/{}", id));
        match Self::check(self.client.delete(&url).send().await?).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(id, "service already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn service_logs(&self, id: &str) -> Result<Vec<u8>> {
        let url = self.url(&format!("services/{}/logs", id));
        let response = self
            .client
            .get(&url)
            .query(&[("stdout", "true"), ("stderr", "false")])
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
