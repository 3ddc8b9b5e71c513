//! Idempotent restore of an object map onto a Swarm
//!
//! Objects are matched by name: whatever already exists on the target wins.
//! Configs and secrets are restored first and their new identifiers recorded
//! in [`RemapTables`], which are then used to rewrite the references of each
//! service before it is created with zero replicas.

use futures::future::try_join_all;
use lifevest_core::{
    Document, ObjectCollection, ObjectKind, ObjectMap, ObjectRef, RemapTable, RemapTables,
    rewrite_service_references, service_references,
};

use crate::api::{ListedObject, SwarmApi};
use crate::credentials::RegistryAuth;
use crate::error::{Result, SwarmError};

/// A non-fatal event of a reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    /// A service referenced an object missing from the snapshot
    ReferenceDropped { service: String, reference: ObjectRef },
    /// A service with the same name exists on the target and was left alone
    ServiceExists { name: String },
}

impl std::fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileWarning::ReferenceDropped { service, reference } => write!(
                f,
                "{} not found in backup, dropped it from service '{}'",
                reference, service
            ),
            ReconcileWarning::ServiceExists { name } => {
                write!(f, "service '{}' already exists, skipped", name)
            }
        }
    }
}

/// Per-kind counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindSummary {
    pub created: usize,
    pub existing: usize,
}

/// Outcome of a reconciliation run
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub configs: KindSummary,
    pub secrets: KindSummary,
    pub services: KindSummary,
    pub remaps: RemapTables,
    pub warnings: Vec<ReconcileWarning>,
}

impl ReconcileReport {
    pub fn summary(&self, kind: ObjectKind) -> &KindSummary {
        match kind {
            ObjectKind::Config => &self.configs,
            ObjectKind::Secret => &self.secrets,
            ObjectKind::Service => &self.services,
        }
    }

    fn summary_mut(&mut self, kind: ObjectKind) -> &mut KindSummary {
        match kind {
            ObjectKind::Config => &mut self.configs,
            ObjectKind::Secret => &mut self.secrets,
            ObjectKind::Service => &mut self.services,
        }
    }

    /// Number of objects created across all kinds
    pub fn created(&self) -> usize {
        self.configs.created + self.secrets.created + self.services.created
    }
}

/// Materializes object maps on a target cluster
pub struct Reconciler<'a, A: SwarmApi + ?Sized> {
    api: &'a A,
    registry_auth: Option<&'a RegistryAuth>,
}

impl<'a, A: SwarmApi + ?Sized> Reconciler<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            registry_auth: None,
        }
    }

    /// Send these credentials when creating services
    pub fn with_registry_auth(mut self, auth: Option<&'a RegistryAuth>) -> Self {
        self.registry_auth = auth;
        self
    }

    /// Restore `map` onto the target
    ///
    /// Running it twice with the same map creates nothing the second time.
    /// The first creation failure aborts the run; objects created before it
    /// are left in place.
    pub async fn apply(&self, map: &ObjectMap) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for kind in [ObjectKind::Config, ObjectKind::Secret] {
            self.restore_kind(kind, map.collection(kind), &mut report)
                .await?;
        }
        self.restore_services(&map.services, &mut report).await?;

        tracing::info!(
            configs = report.configs.created,
            secrets = report.secrets.created,
            services = report.services.created,
            warnings = report.warnings.len(),
            "restore complete"
        );
        Ok(report)
    }

    /// Restore the configs or secrets of the map, recording their remapping
    async fn restore_kind(
        &self,
        kind: ObjectKind,
        collection: &ObjectCollection,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let existing = self.api.list(kind).await?;
        let mut table = RemapTable::new(kind);
        let mut summary = KindSummary::default();
        let mut pending = Vec::new();

        for (source_id, document) in collection {
            if let Some(found) = find_existing(&existing, document) {
                tracing::info!(
                    "{} {} already exists as {}, skipping",
                    kind,
                    document.name().unwrap_or(source_id),
                    found.id
                );
                table.insert(source_id.as_str(), found.id.as_str());
                summary.existing += 1;
                continue;
            }

            if kind == ObjectKind::Secret && document.data().is_none() {
                return Err(SwarmError::ObjectCreation {
                    kind,
                    name: display_name(document, source_id),
                    message: "secret payload missing from backup".to_string(),
                });
            }
            pending.push((source_id, document));
        }

        let created = try_join_all(pending.into_iter().map(|(source_id, document)| async move {
            let new_id = self.create(kind, document, source_id, None).await?;
            tracing::debug!("{} {} created as {}", kind, source_id, new_id);
            Ok::<_, SwarmError>((source_id, new_id))
        }))
        .await?;

        for (source_id, new_id) in created {
            table.insert(source_id.as_str(), new_id);
            summary.created += 1;
        }

        if let Some(slot) = report.remaps.table_mut(kind) {
            *slot = table;
        }
        *report.summary_mut(kind) = summary;
        Ok(())
    }

    /// Restore services one by one, after configs and secrets
    async fn restore_services(
        &self,
        services: &ObjectCollection,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let existing = self.api.list(ObjectKind::Service).await?;

        for (source_id, document) in services {
            let name = display_name(document, source_id);
            if find_existing(&existing, document).is_some() {
                tracing::warn!("service {} already exists, skipping", name);
                report.warnings.push(ReconcileWarning::ServiceExists { name });
                report.services.existing += 1;
                continue;
            }

            let references = service_references(document);
            tracing::debug!(
                "service {} references {}",
                name,
                references.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            );

            let rewrite = rewrite_service_references(document, &report.remaps);
            for reference in rewrite.dropped {
                tracing::warn!(
                    "could not find {} in backup, dropping it from service {}",
                    reference,
                    name
                );
                report.warnings.push(ReconcileWarning::ReferenceDropped {
                    service: name.clone(),
                    reference,
                });
            }

            let mut document = rewrite.document;
            document.force_replicas(0);
            tracing::trace!("service {} after editing: {}", name, document.inner());

            let new_id = self
                .create(ObjectKind::Service, &document, source_id, self.registry_auth)
                .await?;
            tracing::info!("service {} created as {} with 0 replicas", name, new_id);
            report.services.created += 1;
        }
        Ok(())
    }

    async fn create(
        &self,
        kind: ObjectKind,
        document: &Document,
        source_id: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<String> {
        self.api
            .create(kind, document, auth)
            .await
            .map_err(|e| match e {
                SwarmError::Api { message, .. } => SwarmError::ObjectCreation {
                    kind,
                    name: display_name(document, source_id),
                    message,
                },
                other => other,
            })
    }
}

fn find_existing<'e>(existing: &'e [ListedObject], document: &Document) -> Option<&'e ListedObject> {
    let name = document.name()?;
    existing.iter().find(|o| o.spec.name() == Some(name))
}

fn display_name(document: &Document, source_id: &str) -> String {
    document.name().unwrap_or(source_id).to_string()
}
