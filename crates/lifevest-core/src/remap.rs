//! Identifier remapping between a source and a destination cluster
//!
//! Configs and secrets get new identifiers when they are created on another
//! cluster. Services reference them by identifier, so before a service is
//! recreated every reference is resolved through a [`RemapTable`] built while
//! the configs and secrets were restored.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::objects::{Document, ObjectKind};

/// A cross-reference from a service to a config or secret on the source cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub source_id: String,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, source_id: impl Into<String>) -> Self {
        Self {
            kind,
            source_id: source_id.into(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.source_id)
    }
}

/// Source identifier -> destination identifier for one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapTable {
    kind: ObjectKind,
    entries: BTreeMap<String, String>,
}

impl RemapTable {
    /// Create an empty table for `kind`
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Kind of object this table remaps
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Record that `source_id` lives at `destination_id` on the target
    pub fn insert(&mut self, source_id: impl Into<String>, destination_id: impl Into<String>) {
        self.entries.insert(source_id.into(), destination_id.into());
    }

    /// Destination identifier for `source_id`
    pub fn resolve(&self, source_id: &str) -> Option<&str> {
        self.entries.get(source_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(source, destination)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, d)| (s.as_str(), d.as_str()))
    }
}

/// The config and secret remap tables of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapTables {
    pub configs: RemapTable,
    pub secrets: RemapTable,
}

impl Default for RemapTables {
    fn default() -> Self {
        Self {
            configs: RemapTable::new(ObjectKind::Config),
            secrets: RemapTable::new(ObjectKind::Secret),
        }
    }
}

impl RemapTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for a referenceable kind
    pub fn table(&self, kind: ObjectKind) -> Option<&RemapTable> {
        match kind {
            ObjectKind::Config => Some(&self.configs),
            ObjectKind::Secret => Some(&self.secrets),
            ObjectKind::Service => None,
        }
    }

    /// Mutable table for a referenceable kind
    pub fn table_mut(&mut self, kind: ObjectKind) -> Option<&mut RemapTable> {
        match kind {
            ObjectKind::Config => Some(&mut self.configs),
            ObjectKind::Secret => Some(&mut self.secrets),
            ObjectKind::Service => None,
        }
    }

    /// Destination identifier for a reference
    pub fn resolve(&self, reference: &ObjectRef) -> Option<&str> {
        self.table(reference.kind)
            .and_then(|table| table.resolve(&reference.source_id))
    }
}

/// Outcome of rewriting one service's references
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRewrite {
    /// Copy of the service with every surviving reference pointing at the destination
    pub document: Document,
    /// References that were rewritten, with their destination identifier
    pub remapped: Vec<(ObjectRef, String)>,
    /// References with no destination, removed from the copy
    pub dropped: Vec<ObjectRef>,
}

/// List the config and secret references of a service
pub fn service_references(service: &Document) -> Vec<ObjectRef> {
    let Some(spec) = service.container_spec() else {
        return Vec::new();
    };

    let mut references = Vec::new();
    for kind in [ObjectKind::Config, ObjectKind::Secret] {
        let Some((list_field, id_field)) = kind.reference_fields() else {
            continue;
        };
        let entries = spec.get(list_field).and_then(JsonValue::as_array);
        for entry in entries.into_iter().flatten() {
            if let Some(id) = entry.get(id_field).and_then(JsonValue::as_str) {
                references.push(ObjectRef::new(kind, id));
            }
        }
    }
    references
}

/// Copy a service and resolve its references through `tables`
///
/// References found in a table are rewritten to the destination identifier.
/// References missing from their table are dropped from the copy and reported
/// in [`ServiceRewrite::dropped`]. The input document is never modified.
pub fn rewrite_service_references(service: &Document, tables: &RemapTables) -> ServiceRewrite {
    let mut document = service.clone();
    let mut remapped = Vec::new();
    let mut dropped = Vec::new();

    if let Some(spec) = document.container_spec_mut() {
        for kind in [ObjectKind::Config, ObjectKind::Secret] {
            let Some((list_field, id_field)) = kind.reference_fields() else {
                continue;
            };
            let Some(entries) = spec.get_mut(list_field).and_then(JsonValue::as_array_mut) else {
                continue;
            };

            entries.retain_mut(|entry| {
                let Some(source_id) = entry.get(id_field).and_then(JsonValue::as_str) else {
                    // Nothing to remap
                    return true;
                };
                let reference = ObjectRef::new(kind, source_id);

                match tables.resolve(&reference) {
                    Some(destination_id) => {
                        let destination_id = destination_id.to_string();
                        entry[id_field] = JsonValue::String(destination_id.clone());
                        remapped.push((reference, destination_id));
                        true
                    }
                    None => {
                        dropped.push(reference);
                        false
                    }
                }
            });
        }
    }

    ServiceRewrite {
        document,
        remapped,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn web_service() -> Document {
        Document::new(json!({
            "Name": "web",
            "TaskTemplate": {
                "ContainerSpec": {
                    "Image": "nginx:alpine",
                    "Configs": [
                        { "ConfigID": "cfg-old", "ConfigName": "nginx.conf", "File": { "Name": "/etc/nginx/nginx.conf" } }
                    ],
                    "Secrets": [
                        { "SecretID": "sec-old", "SecretName": "tls-key", "File": { "Name": "tls.key" } },
                        { "SecretID": "sec-gone", "SecretName": "legacy", "File": { "Name": "legacy" } }
                    ]
                }
            }
        }))
    }

    fn tables() -> RemapTables {
        let mut tables = RemapTables::new();
        tables.configs.insert("cfg-old", "cfg-new");
        tables.secrets.insert("sec-old", "sec-new");
        tables
    }

    #[test]
    fn test_remap_table_resolve() {
        let mut table = RemapTable::new(ObjectKind::Secret);
        assert!(table.is_empty());
        table.insert("a", "b");
        assert_eq!(table.resolve("a"), Some("b"));
        assert_eq!(table.resolve("b"), None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.kind(), ObjectKind::Secret);
    }

    #[test]
    fn test_service_has_no_table() {
        let tables = RemapTables::new();
        assert!(tables.table(ObjectKind::Service).is_none());
        assert!(tables.resolve(&ObjectRef::new(ObjectKind::Service, "x")).is_none());
    }

    #[test]
    fn test_service_references() {
        let refs = service_references(&web_service());
        assert_eq!(
            refs,
            vec![
                ObjectRef::new(ObjectKind::Config, "cfg-old"),
                ObjectRef::new(ObjectKind::Secret, "sec-old"),
                ObjectRef::new(ObjectKind::Secret, "sec-gone"),
            ]
        );
    }

    #[test]
    fn test_rewrite_accounts_for_every_reference() {
        let service = web_service();
        let rewrite = rewrite_service_references(&service, &tables());

        let mut handled: Vec<_> = rewrite.remapped.into_iter().map(|(r, _)| r).collect();
        handled.extend(rewrite.dropped);
        handled.sort_by(|a, b| a.source_id.cmp(&b.source_id));

        let mut listed = service_references(&service);
        listed.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        assert_eq!(handled, listed);
    }

    #[test]
    fn test_rewrite_remaps_known_references() {
        let service = web_service();
        let rewrite = rewrite_service_references(&service, &tables());

        let spec = rewrite.document.container_spec().unwrap();
        assert_eq!(spec["Configs"][0]["ConfigID"], "cfg-new");
        assert_eq!(spec["Configs"][0]["ConfigName"], "nginx.conf");
        assert_eq!(spec["Secrets"][0]["SecretID"], "sec-new");
        assert_eq!(rewrite.remapped.len(), 2);
    }

    #[test]
    fn test_rewrite_drops_dangling_reference() {
        let rewrite = rewrite_service_references(&web_service(), &tables());

        let secrets = rewrite.document.container_spec().unwrap()["Secrets"]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(secrets.len(), 1);
        assert_eq!(
            rewrite.dropped,
            vec![ObjectRef::new(ObjectKind::Secret, "sec-gone")]
        );
    }

    #[test]
    fn test_rewrite_leaves_input_untouched() {
        let service = web_service();
        let before = service.clone();
        let _ = rewrite_service_references(&service, &tables());
        assert_eq!(service, before);
    }

    #[test]
    fn test_rewrite_without_container_spec() {
        let service = Document::new(json!({ "Name": "bare" }));
        let rewrite = rewrite_service_references(&service, &tables());
        assert_eq!(rewrite.document, service);
        assert!(rewrite.remapped.is_empty());
        assert!(rewrite.dropped.is_empty());
    }

    #[test]
    fn test_object_ref_display() {
        let reference = ObjectRef::new(ObjectKind::Config, "abc123");
        assert_eq!(reference.to_string(), "config abc123");
    }
}
