//! The slice of the Docker Engine API that Lifevest needs
//!
//! Everything above this module talks to a [`SwarmApi`]: the HTTP
//! [`DockerClient`](crate::client::DockerClient) in production and
//! [`MockSwarm`](crate::mock::MockSwarm) in tests.

use async_trait::async_trait;
use lifevest_core::{Document, ObjectKind};
use serde::{Deserialize, Serialize};

use crate::credentials::RegistryAuth;
use crate::error::Result;

/// One entry of a service, config or secret listing
///
/// Revision metadata (`Version`, `CreatedAt`, ...) is dropped on purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedObject {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Spec", default)]
    pub spec: Document,
}

/// A Swarm node, reduced to what scheduling the helper needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Status", default)]
    pub status: NodeStatus,
    #[serde(rename = "Spec", default)]
    pub spec: NodeSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Addr", default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(rename = "Availability", default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

impl Node {
    /// A ready node that accepts new tasks
    pub fn is_ready(&self) -> bool {
        self.status.state == "ready"
            && !matches!(self.spec.availability.as_deref(), Some("drain") | Some("pause"))
    }
}

/// Control-plane operations used by the reader, extractor and reconciler
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait SwarmApi: Send + Sync {
    /// List all objects of a kind. Secret payloads are never included.
    async fn list(&self, kind: ObjectKind) -> Result<Vec<ListedObject>>;

    /// Create an object from its spec and return the new identifier
    ///
    /// `auth` is only meaningful for services.
    async fn create(
        &self,
        kind: ObjectKind,
        spec: &Document,
        auth: Option<&RegistryAuth>,
    ) -> Result<String>;

    /// List the nodes of the Swarm
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Remove a service
    async fn remove_service(&self, id: &str) -> Result<()>;

    /// Fetch the complete stdout log of a service, as returned by the daemon
    async fn service_logs(&self, id: &str) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_object_drops_metadata() {
        let raw = r#"{
            "ID": "ktnbjxoalbkvbvedmg1urrz8h",
            "Version": { "Index": 11 },
            "CreatedAt": "2018-05-23T12:00:00Z",
            "Spec": { "Name": "app-dev.crt", "Labels": {} }
        }"#;
        let listed: ListedObject = serde_json::from_str(raw).unwrap();
        assert_eq!(listed.id, "ktnbjxoalbkvbvedmg1urrz8h");
        assert_eq!(listed.spec.name(), Some("app-dev.crt"));
        assert!(listed.spec.inner().get("Version").is_none());
    }

    #[test]
    fn test_node_readiness() {
        let raw = r#"[
            { "ID": "a", "Status": { "State": "ready", "Addr": "10.0.0.1" }, "Spec": { "Availability": "active" } },
            { "ID": "b", "Status": { "State": "down" }, "Spec": { "Availability": "active" } },
            { "ID": "c", "Status": { "State": "ready" }, "Spec": { "Availability": "drain" } },
            { "ID": "d", "Status": { "State": "ready" } }
        ]"#;
        let nodes: Vec<Node> = serde_json::from_str(raw).unwrap();
        let ready: Vec<&str> = nodes.iter().filter(|n| n.is_ready()).map(|n| n.id.as_str()).collect();
        assert_eq!(ready, vec!["a", "d"]);
    }
}
