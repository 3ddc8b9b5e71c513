//! Reading the configuration state of a live Swarm

use lifevest_core::{ObjectKind, ObjectMap};

use crate::api::SwarmApi;
use crate::error::Result;
use crate::extract::{ExtractionConfig, SecretExtractor};

/// Lists services, configs and secret metadata from a cluster
pub struct ClusterReader<'a, A: SwarmApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: SwarmApi + ?Sized> ClusterReader<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// List the three kinds concurrently into an object map
    ///
    /// Secrets come back without `Data`; see [`SecretExtractor`].
    pub async fn list(&self) -> Result<ObjectMap> {
        let (services, configs, secrets) = futures::try_join!(
            self.api.list(ObjectKind::Service),
            self.api.list(ObjectKind::Config),
            self.api.list(ObjectKind::Secret),
        )?;

        let mut map = ObjectMap::new();
        for (kind, listed) in [
            (ObjectKind::Service, services),
            (ObjectKind::Config, configs),
            (ObjectKind::Secret, secrets),
        ] {
            for object in listed {
                tracing::trace!(id = %object.id, "{}: {}", kind, object.spec.inner());
                map.insert(kind, object.id, object.spec);
            }
        }

        tracing::info!(
            services = map.services.len(),
            configs = map.configs.len(),
            secrets = map.secrets.len(),
            "read cluster state"
        );
        Ok(map)
    }
}

/// Read a complete snapshot of a cluster, secret payloads included
///
/// A helper left over from an interrupted run is listed like any other
/// service; it is removed by the extractor and never part of the snapshot.
pub async fn backup<A: SwarmApi + ?Sized>(api: &A, config: &ExtractionConfig) -> Result<ObjectMap> {
    let mut map = ClusterReader::new(api).list().await?;
    SecretExtractor::new(api, config.clone())
        .extract(&mut map.secrets)
        .await?;

    map.services.retain(|id, service| {
        let helper = service.name() == Some(config.helper_name.as_str());
        if helper {
            tracing::debug!(id = %id, "leaving extraction service out of the backup");
        }
        !helper
    });
    Ok(map)
}
