//! Secret payload extraction
//!
//! The Docker API never returns secret payloads. To back them up, a one-shot
//! helper service mounts every secret and prints it to stdout using the
//! protocol in [`crate::protocol`]. The extractor polls the helper's logs until
//! the transmission is complete, assigns the payloads and removes the helper
//! whatever the outcome.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lifevest_core::{Document, ObjectCollection, ObjectKind};
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::api::SwarmApi;
use crate::error::{Result, SwarmError};
use crate::protocol::{self, Transmission};

/// Name of the helper service
pub const HELPER_SERVICE_NAME: &str = "lifevest-backup";

/// Image the helper runs; needs `sh`, `ls` and `base64`
pub const HELPER_IMAGE: &str = "alpine:latest";

/// Delay between two log polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Number of log polls before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Label put on the helper so operators can recognize it
const HELPER_LABEL: &str = "io.lifevest.helper";

/// Tunables of the extraction protocol
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub helper_image: String,
    pub helper_name: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            helper_image: HELPER_IMAGE.to_string(),
            helper_name: HELPER_SERVICE_NAME.to_string(),
        }
    }
}

/// State of one extraction attempt
#[derive(Debug)]
pub struct ExtractionSession {
    pub helper_id: String,
    /// Full log text received on the last poll
    pub logs: String,
    pub transmission: Transmission,
    pub attempts_remaining: u32,
}

impl ExtractionSession {
    fn new(helper_id: String, max_attempts: u32) -> Self {
        Self {
            helper_id,
            logs: String::new(),
            transmission: Transmission::default(),
            attempts_remaining: max_attempts.max(1),
        }
    }

    /// True once the end marker has been received
    pub fn is_complete(&self) -> bool {
        self.transmission.complete
    }

    fn record(&mut self, raw: &[u8]) {
        self.logs = String::from_utf8_lossy(raw).into_owned();
        self.transmission = protocol::parse_transmission(raw);
    }
}

/// Retrieves secret payloads through a helper service
pub struct SecretExtractor<'a, A: SwarmApi + ?Sized> {
    api: &'a A,
    config: ExtractionConfig,
}

impl<'a, A: SwarmApi + ?Sized> SecretExtractor<'a, A> {
    pub fn new(api: &'a A, config: ExtractionConfig) -> Self {
        Self { api, config }
    }

    /// Fill in `Data` for every secret of the collection
    ///
    /// Does nothing when the collection is empty. The helper service is
    /// removed on every path once it has been created.
    pub async fn extract(&self, secrets: &mut ObjectCollection) -> Result<()> {
        if secrets.is_empty() {
            tracing::debug!("no secrets, skipping extraction");
            return Ok(());
        }

        self.ensure_ready_node().await?;
        self.remove_leftover_helper().await?;

        let spec = helper_service_spec(&self.config, secrets);
        tracing::trace!("helper service: {}", spec.inner());
        let helper_id = self.api.create(ObjectKind::Service, &spec, None).await?;
        tracing::info!(
            helper = %helper_id,
            "deployed extraction service for {} secret(s)",
            secrets.len()
        );

        let mut session = ExtractionSession::new(helper_id, self.config.max_attempts);
        let outcome = self.run_session(&mut session, secrets).await;
        let cleanup = self.api.remove_service(&session.helper_id).await;

        match (outcome, cleanup) {
            (Ok(()), Ok(())) => {
                tracing::debug!(helper = %session.helper_id, "removed extraction service");
                Ok(())
            }
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                tracing::error!(
                    helper = %session.helper_id,
                    "failed to remove extraction service, remove it manually: {}",
                    cleanup_err
                );
                Err(e)
            }
        }
    }

    async fn ensure_ready_node(&self) -> Result<()> {
        let nodes = self.api.list_nodes().await?;
        tracing::trace!("nodes: {:?}", nodes);
        if nodes.iter().any(|n| n.is_ready()) {
            Ok(())
        } else {
            tracing::error!("no node is ready to run the extraction service");
            Err(SwarmError::NoReadyNode)
        }
    }

    async fn remove_leftover_helper(&self) -> Result<()> {
        let services = self.api.list(ObjectKind::Service).await?;
        for leftover in services
            .iter()
            .filter(|s| s.spec.name() == Some(self.config.helper_name.as_str()))
        {
            tracing::warn!(id = %leftover.id, "removing leftover extraction service");
            self.api.remove_service(&leftover.id).await?;
        }
        Ok(())
    }

    async fn run_session(
        &self,
        session: &mut ExtractionSession,
        secrets: &mut ObjectCollection,
    ) -> Result<()> {
        self.await_transmission(session).await?;
        apply_payloads(&session.transmission, secrets)
    }

    async fn await_transmission(&self, session: &mut ExtractionSession) -> Result<()> {
        loop {
            let raw = self.api.service_logs(&session.helper_id).await?;
            if protocol::is_corrupted(&raw) {
                tracing::error!("service logs are corrupted: {}", String::from_utf8_lossy(&raw));
                return Err(SwarmError::LogStreamCorruption);
            }

            session.record(&raw);
            tracing::trace!("service logs: {:?}", session.logs);
            if session.is_complete() {
                tracing::debug!("extraction service finished");
                return Ok(());
            }

            session.attempts_remaining -= 1;
            if session.attempts_remaining == 0 {
                tracing::error!("extraction service did not finish in time");
                return Err(SwarmError::ExtractionTimeout {
                    attempts: self.config.max_attempts.max(1),
                });
            }
            tracing::debug!(
                remaining = session.attempts_remaining,
                "waiting for the extraction service to finish"
            );
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// Decode each received body and store it canonically as the secret's `Data`
fn apply_payloads(transmission: &Transmission, secrets: &mut ObjectCollection) -> Result<()> {
    let mut assigned = BTreeSet::new();
    for (id, body) in &transmission.secrets {
        let Some(secret) = secrets.get_mut(id) else {
            tracing::debug!(id = %id, "ignoring unknown secret in extraction output");
            continue;
        };
        match STANDARD.decode(body) {
            Ok(bytes) => {
                secret.set_data(STANDARD.encode(bytes));
                assigned.insert(id.as_str());
            }
            Err(e) => tracing::warn!(id = %id, "could not decode secret payload: {}", e),
        }
    }

    let missing: Vec<String> = secrets
        .keys()
        .filter(|id| !assigned.contains(id.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() {
        tracing::info!("retrieved {} secret(s)", assigned.len());
        Ok(())
    } else {
        Err(SwarmError::IncompleteExtraction { missing })
    }
}

/// Spec of the one-shot helper service mounting every secret
pub fn helper_service_spec(config: &ExtractionConfig, secrets: &ObjectCollection) -> Document {
    let mounts: Vec<_> = secrets
        .iter()
        .map(|(id, secret)| {
            json!({
                "SecretID": id,
                "SecretName": secret.name().unwrap_or_default(),
                "File": {
                    "Name": protocol::secret_mount_path(id),
                    "UID": "0",
                    "GID": "0",
                    "Mode": 0o400,
                }
            })
        })
        .collect();

    Document::new(json!({
        "Name": config.helper_name,
        "Labels": { HELPER_LABEL: "true" },
        "Mode": { "Replicated": { "Replicas": 1 } },
        "TaskTemplate": {
            "ContainerSpec": {
                "Image": config.helper_image,
                "Command": ["sh", "-c", protocol::helper_script()],
                "Secrets": mounts,
            },
            "RestartPolicy": { "Condition": "none" },
        },
    }))
}
