//! Live Swarm adapter

use async_trait::async_trait;
use lifevest_core::ObjectMap;
use lifevest_swarm::{DockerClient, Reconciler, SwarmEndpoint, backup, load_registry_auth};

use super::{Input, Output};
use crate::error::{CliError, Result};
use crate::orchestrator::Invocation;

/// Reads services, configs and secrets from a Swarm manager
pub struct SwarmInput;

#[async_trait]
impl Input for SwarmInput {
    fn name(&self) -> &'static str {
        "swarm"
    }

    fn validate(&self, invocation: &Invocation) -> Result<()> {
        SwarmEndpoint::parse(&invocation.source)?;
        Ok(())
    }

    async fn produce(&self, invocation: &Invocation) -> Result<ObjectMap> {
        let client = DockerClient::connect(&invocation.source)?;
        tracing::info!("backing up swarm at {}", client.endpoint());
        Ok(backup(&client, &invocation.extraction).await?)
    }
}

/// Restores objects onto a Swarm manager
pub struct SwarmOutput;

#[async_trait]
impl Output for SwarmOutput {
    fn name(&self) -> &'static str {
        "swarm"
    }

    fn validate(&self, invocation: &Invocation) -> Result<()> {
        if invocation.default_destination {
            return Err(CliError::usage_with_help(
                "no destination swarm given",
                "pass the manager to restore to, e.g. --destination tcp://manager:2375",
            ));
        }
        SwarmEndpoint::parse(&invocation.destination)?;
        // Fail on bad credentials before touching either cluster
        load_registry_auth(invocation.registry_credentials.as_deref())?;
        Ok(())
    }

    async fn consume(&self, invocation: &Invocation, map: &ObjectMap) -> Result<()> {
        let client = DockerClient::connect(&invocation.destination)?;
        let auth = load_registry_auth(invocation.registry_credentials.as_deref())?;
        tracing::info!("restoring {} object(s) to swarm at {}", map.len(), client.endpoint());

        let report = Reconciler::new(&client)
            .with_registry_auth(auth.as_ref())
            .apply(map)
            .await?;
        tracing::info!(
            "created {} config(s), {} secret(s), {} service(s) with {} warning(s)",
            report.configs.created,
            report.secrets.created,
            report.services.created,
            report.warnings.len()
        );
        Ok(())
    }
}
