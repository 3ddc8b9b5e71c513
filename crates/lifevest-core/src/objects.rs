//! Cluster object documents and the in-memory object map

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Kind of Swarm object handled by Lifevest
///
/// Ordering follows restore order: configs and secrets before the services that reference them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Config,
    Secret,
    Service,
}

impl ObjectKind {
    /// All kinds, in restore order
    pub const ALL: [ObjectKind; 3] = [ObjectKind::Config, ObjectKind::Secret, ObjectKind::Service];

    /// Plural name, used both as snapshot subdirectory and API path segment
    pub fn plural(&self) -> &'static str {
        match self {
            ObjectKind::Config => "configs",
            ObjectKind::Secret => "secrets",
            ObjectKind::Service => "services",
        }
    }

    /// Where a service's container spec lists references to this kind.
    ///
    /// Returns `(list field, identifier field)`, or `None` for kinds that are never referenced.
    pub fn reference_fields(&self) -> Option<(&'static str, &'static str)> {
        match self {
            ObjectKind::Config => Some(("Configs", "ConfigID")),
            ObjectKind::Secret => Some(("Secrets", "SecretID")),
            ObjectKind::Service => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ObjectKind::Config => "config",
            ObjectKind::Secret => "secret",
            ObjectKind::Service => "service",
        };
        write!(f, "{}", s)
    }
}

/// The `Spec` of a single cluster object, kept verbatim
///
/// Lifevest only interprets the handful of fields it needs (`Name`, `Data`,
/// `Mode`, container spec references); everything else round-trips untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub JsonValue);

impl Document {
    /// Wrap a JSON value
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    /// Human-assigned name, unique per kind within one cluster
    pub fn name(&self) -> Option<&str> {
        self.0.get("Name").and_then(JsonValue::as_str)
    }

    /// Base64 payload of a secret or config, if present
    pub fn data(&self) -> Option<&str> {
        self.0.get("Data").and_then(JsonValue::as_str)
    }

    /// Set the base64 payload
    pub fn set_data(&mut self, data: String) {
        if let Some(map) = self.0.as_object_mut() {
            map.insert("Data".to_string(), JsonValue::String(data));
        }
    }

    /// Replica count of a replicated service
    pub fn replicas(&self) -> Option<u64> {
        self.0
            .pointer("/Mode/Replicated/Replicas")
            .and_then(JsonValue::as_u64)
    }

    /// Replace the service mode with a replicated mode of `replicas` tasks
    pub fn force_replicas(&mut self, replicas: u64) {
        if let Some(map) = self.0.as_object_mut() {
            map.insert(
                "Mode".to_string(),
                serde_json::json!({ "Replicated": { "Replicas": replicas } }),
            );
        }
    }

    /// Container spec of a service, if present
    pub fn container_spec(&self) -> Option<&JsonValue> {
        self.0.pointer("/TaskTemplate/ContainerSpec")
    }

    /// Mutable container spec of a service, if present
    pub fn container_spec_mut(&mut self) -> Option<&mut JsonValue> {
        self.0.pointer_mut("/TaskTemplate/ContainerSpec")
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }
}

impl From<JsonValue> for Document {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

/// Documents of one kind, keyed by cluster identifier
pub type ObjectCollection = BTreeMap<String, Document>;

/// Snapshot of a cluster's configuration state: kind -> identifier -> document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMap {
    pub services: ObjectCollection,
    pub configs: ObjectCollection,
    pub secrets: ObjectCollection,
}

impl ObjectMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents of the given kind
    pub fn collection(&self, kind: ObjectKind) -> &ObjectCollection {
        match kind {
            ObjectKind::Config => &self.configs,
            ObjectKind::Secret => &self.secrets,
            ObjectKind::Service => &self.services,
        }
    }

    /// Mutable documents of the given kind
    pub fn collection_mut(&mut self, kind: ObjectKind) -> &mut ObjectCollection {
        match kind {
            ObjectKind::Config => &mut self.configs,
            ObjectKind::Secret => &mut self.secrets,
            ObjectKind::Service => &mut self.services,
        }
    }

    /// Insert a document, replacing any previous one with the same identifier
    pub fn insert(&mut self, kind: ObjectKind, id: impl Into<String>, document: Document) {
        self.collection_mut(kind).insert(id.into(), document);
    }

    /// Total number of objects across all kinds
    pub fn len(&self) -> usize {
        self.services.len() + self.configs.len() + self.secrets.len()
    }

    /// True when no kind holds any object
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the identifier of a document by kind and name
    pub fn find_by_name(&self, kind: ObjectKind, name: &str) -> Option<(&str, &Document)> {
        self.collection(kind)
            .iter()
            .find(|(_, doc)| doc.name() == Some(name))
            .map(|(id, doc)| (id.as_str(), doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_plural_names() {
        assert_eq!(ObjectKind::Service.plural(), "services");
        assert_eq!(ObjectKind::Config.plural(), "configs");
        assert_eq!(ObjectKind::Secret.plural(), "secrets");
    }

    #[test]
    fn test_kind_restore_order() {
        let mut kinds = vec![ObjectKind::Service, ObjectKind::Secret, ObjectKind::Config];
        kinds.sort();
        assert_eq!(kinds, ObjectKind::ALL.to_vec());
    }

    #[test]
    fn test_reference_fields() {
        assert_eq!(ObjectKind::Config.reference_fields(), Some(("Configs", "ConfigID")));
        assert_eq!(ObjectKind::Secret.reference_fields(), Some(("Secrets", "SecretID")));
        assert_eq!(ObjectKind::Service.reference_fields(), None);
    }

    #[test]
    fn test_document_accessors() {
        let mut doc = Document::new(json!({ "Name": "db-password", "Labels": {} }));
        assert_eq!(doc.name(), Some("db-password"));
        assert_eq!(doc.data(), None);

        doc.set_data("aGVsbG8=".to_string());
        assert_eq!(doc.data(), Some("aGVsbG8="));
        assert_eq!(doc.inner()["Labels"], json!({}));
    }

    #[test]
    fn test_force_replicas_replaces_mode() {
        let mut doc = Document::new(json!({
            "Name": "web",
            "Mode": { "Replicated": { "Replicas": 3 } }
        }));
        assert_eq!(doc.replicas(), Some(3));

        doc.force_replicas(0);
        assert_eq!(doc.replicas(), Some(0));

        let mut global = Document::new(json!({ "Name": "agent", "Mode": { "Global": {} } }));
        global.force_replicas(0);
        assert_eq!(global.inner()["Mode"], json!({ "Replicated": { "Replicas": 0 } }));
    }

    #[test]
    fn test_object_map_insert_and_find() {
        let mut map = ObjectMap::new();
        assert!(map.is_empty());

        map.insert(ObjectKind::Config, "c1", Document::new(json!({ "Name": "nginx.conf" })));
        map.insert(ObjectKind::Secret, "s1", Document::new(json!({ "Name": "tls-key" })));

        assert_eq!(map.len(), 2);
        assert_eq!(map.collection(ObjectKind::Config).len(), 1);

        let (id, doc) = map.find_by_name(ObjectKind::Secret, "tls-key").unwrap();
        assert_eq!(id, "s1");
        assert_eq!(doc.name(), Some("tls-key"));
        assert!(map.find_by_name(ObjectKind::Config, "tls-key").is_none());
    }

    #[test]
    fn test_document_transparent_serde() {
        let doc = Document::new(json!({ "Name": "x", "Data": "eA==" }));
        let text = serde_json::to_string(&doc).unwrap();
        assert!(text.starts_with('{'));
        assert!(!text.contains("\"0\""));

        let back: Document = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }
}
