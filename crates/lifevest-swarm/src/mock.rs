//! In-memory Swarm for testing
//!
//! Behaves like a manager for the calls Lifevest makes: objects get fresh
//! identifiers, names are unique per kind, secret payloads are hidden from
//! listings, and service logs replay what the extraction helper would print.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lifevest_core::{Document, ObjectCollection, ObjectKind, ObjectMap};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::api::{ListedObject, Node, NodeSpec, NodeStatus, SwarmApi};
use crate::credentials::RegistryAuth;
use crate::error::{Result, SwarmError};
use crate::protocol::{self, BEGIN_MARKER, END_MARKER, NEXT_MARKER};

/// Shared across instances so two mock clusters never hand out the same ID
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// What service logs contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogBehavior {
    /// Print every mounted secret, like the real helper
    #[default]
    Echo,
    /// Print the begin marker and never finish
    Silent,
    /// Report a broken log stream
    Corrupt,
    /// Finish normally but print undecodable bodies
    Garbled,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub lists: usize,
    pub creates: usize,
    pub removes: usize,
    pub log_fetches: usize,
    pub node_lists: usize,
}

#[derive(Default)]
struct MockState {
    objects: ObjectMap,
    nodes: Vec<Node>,
    logs: LogBehavior,
    failing_names: HashSet<String>,
    fail_removals: bool,
    last_auth: Option<RegistryAuth>,
}

/// In-memory Swarm for testing
#[derive(Clone)]
pub struct MockSwarm {
    state: Arc<RwLock<MockState>>,
    operations: Arc<RwLock<OperationCounts>>,
}

impl MockSwarm {
    /// Create an empty Swarm with a single ready manager
    pub fn new() -> Self {
        Self::with_nodes(vec![Node {
            id: "manager-1".to_string(),
            status: NodeStatus {
                state: "ready".to_string(),
                addr: Some("10.0.0.1".to_string()),
            },
            spec: NodeSpec {
                availability: Some("active".to_string()),
            },
        }])
    }

    /// Create an empty Swarm with the given nodes
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                nodes,
                ..Default::default()
            })),
            operations: Arc::new(RwLock::new(OperationCounts::default())),
        }
    }

    /// Store an object directly, bypassing counters, and return its ID
    pub fn add_object(&self, kind: ObjectKind, spec: Document) -> String {
        let id = next_id();
        self.state
            .write()
            .unwrap()
            .objects
            .insert(kind, id.clone(), spec);
        id
    }

    /// Change what service logs contain
    pub fn set_log_behavior(&self, behavior: LogBehavior) {
        self.state.write().unwrap().logs = behavior;
    }

    /// Make creation of any object with this name fail
    pub fn fail_creation_of(&self, name: &str) {
        self.state
            .write()
            .unwrap()
            .failing_names
            .insert(name.to_string());
    }

    /// Make service removal fail
    pub fn set_fail_removals(&self, fail: bool) {
        self.state.write().unwrap().fail_removals = fail;
    }

    /// All stored objects, secret payloads included
    pub fn objects(&self) -> ObjectMap {
        self.state.read().unwrap().objects.clone()
    }

    /// Stored objects of one kind
    pub fn collection(&self, kind: ObjectKind) -> ObjectCollection {
        self.state.read().unwrap().objects.collection(kind).clone()
    }

    /// Find a stored object by name
    pub fn find(&self, kind: ObjectKind, name: &str) -> Option<(String, Document)> {
        let state = self.state.read().unwrap();
        state
            .objects
            .find_by_name(kind, name)
            .map(|(id, doc)| (id.to_string(), doc.clone()))
    }

    /// Registry credentials sent with the last service creation
    pub fn last_registry_auth(&self) -> Option<RegistryAuth> {
        self.state.read().unwrap().last_auth.clone()
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        let mut ops = self.operations.write().unwrap();
        *ops = OperationCounts::default();
    }

    fn render_logs(state: &MockState, service: &Document) -> Vec<u8> {
        if state.logs == LogBehavior::Corrupt {
            return b"Error grabbing logs: rpc error: code = Unknown desc = incomplete log stream"
                .to_vec();
        }

        let mut lines: Vec<String> = vec![BEGIN_MARKER.to_string()];
        if state.logs == LogBehavior::Silent {
            return protocol::frame_lines(lines.iter().map(String::as_str));
        }

        let mut files: Vec<(String, Vec<u8>)> = service
            .container_spec()
            .and_then(|spec| spec.get("Secrets"))
            .and_then(|secrets| secrets.as_array())
            .into_iter()
            .flatten()
            .filter_map(|mount| {
                let id = mount.get("SecretID")?.as_str()?;
                let file = mount.pointer("/File/Name")?.as_str()?;
                let data = state.objects.secrets.get(id)?.data().unwrap_or_default();
                Some((file.to_string(), STANDARD.decode(data).unwrap_or_default()))
            })
            .collect();
        // Shell globs expand sorted
        files.sort();

        for (file, content) in files {
            lines.push(file);
            if state.logs == LogBehavior::Garbled {
                lines.push("!!not base64!!".to_string());
            } else {
                // busybox base64 wraps at 76 columns
                let encoded = STANDARD.encode(content);
                let bytes = encoded.as_bytes();
                for chunk in bytes.chunks(76) {
                    lines.push(String::from_utf8_lossy(chunk).into_owned());
                }
            }
            lines.push(String::new());
            lines.push(NEXT_MARKER.to_string());
        }
        lines.push(END_MARKER.to_string());

        protocol::frame_lines(lines.iter().map(String::as_str))
    }
}

impl Default for MockSwarm {
    fn default() -> Self {
        Self::new()
    }
}

fn next_id() -> String {
    format!("{:025x}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

#[async_trait]
impl SwarmApi for MockSwarm {
    async fn list(&self, kind: ObjectKind) -> Result<Vec<ListedObject>> {
        self.operations.write().unwrap().lists += 1;

        let state = self.state.read().unwrap();
        Ok(state
            .objects
            .collection(kind)
            .iter()
            .map(|(id, doc)| {
                let mut spec = doc.clone();
                if kind == ObjectKind::Secret
                    && let Some(map) = spec.0.as_object_mut()
                {
                    map.remove("Data");
                }
                ListedObject {
                    id: id.clone(),
                    spec,
                }
            })
            .collect())
    }

    async fn create(
        &self,
        kind: ObjectKind,
        spec: &Document,
        auth: Option<&RegistryAuth>,
    ) -> Result<String> {
        self.operations.write().unwrap().creates += 1;

        let mut state = self.state.write().unwrap();
        let name = spec.name().unwrap_or_default().to_string();
        if state.failing_names.contains(&name) {
            return Err(SwarmError::Api {
                status: 500,
                message: format!("rpc error: injected failure for {}", name),
            });
        }
        if state.objects.find_by_name(kind, &name).is_some() {
            return Err(SwarmError::Api {
                status: 409,
                message: format!("rpc error: code = AlreadyExists desc = {} {} already exists", kind, name),
            });
        }
        if kind == ObjectKind::Service {
            state.last_auth = auth.cloned();
        }

        let id = next_id();
        state.objects.insert(kind, id.clone(), spec.clone());
        Ok(id)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.operations.write().unwrap().node_lists += 1;
        Ok(self.state.read().unwrap().nodes.clone())
    }

    async fn remove_service(&self, id: &str) -> Result<()> {
        self.operations.write().unwrap().removes += 1;

        let mut state = self.state.write().unwrap();
        if state.fail_removals {
            return Err(SwarmError::Network("connection reset by peer".to_string()));
        }
        match state.objects.services.remove(id) {
            Some(_) => Ok(()),
            None => Err(SwarmError::Api {
                status: 404,
                message: format!("service {} not found", id),
            }),
        }
    }

    async fn service_logs(&self, id: &str) -> Result<Vec<u8>> {
        self.operations.write().unwrap().log_fetches += 1;

        let state = self.state.read().unwrap();
        let service = state
            .objects
            .services
            .get(id)
            .ok_or_else(|| SwarmError::Api {
                status: 404,
                message: format!("service {} not found", id),
            })?;
        Ok(Self::render_logs(&state, service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_hides_secret_data_in_listing() {
        let swarm = MockSwarm::new();
        swarm.add_object(
            ObjectKind::Secret,
            Document::new(json!({ "Name": "db", "Data": "eA==" })),
        );

        let listed = swarm.list(ObjectKind::Secret).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].spec.data().is_none());
        assert_eq!(swarm.collection(ObjectKind::Secret).values().next().unwrap().data(), Some("eA=="));
    }

    #[tokio::test]
    async fn test_mock_create_duplicate_fails() {
        let swarm = MockSwarm::new();
        let spec = Document::new(json!({ "Name": "web" }));
        swarm.create(ObjectKind::Service, &spec, None).await.unwrap();

        let err = swarm.create(ObjectKind::Service, &spec, None).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(swarm.operation_counts().creates, 2);
    }

    #[tokio::test]
    async fn test_mock_ids_are_unique_across_instances() {
        let a = MockSwarm::new();
        let b = MockSwarm::new();
        let spec = Document::new(json!({ "Name": "same" }));
        let id_a = a.create(ObjectKind::Config, &spec, None).await.unwrap();
        let id_b = b.create(ObjectKind::Config, &spec, None).await.unwrap();
        assert_ne!(id_a, id_b);
        assert_eq!(id_a.len(), 25);
    }

    #[tokio::test]
    async fn test_mock_echo_logs_parse() {
        let swarm = MockSwarm::new();
        let secret_id = swarm.add_object(
            ObjectKind::Secret,
            Document::new(json!({ "Name": "db", "Data": STANDARD.encode("pw") })),
        );
        let helper = swarm.add_object(
            ObjectKind::Service,
            Document::new(json!({
                "Name": "helper",
                "TaskTemplate": { "ContainerSpec": { "Secrets": [
                    { "SecretID": secret_id, "File": { "Name": protocol::secret_mount_path(&secret_id) } }
                ] } }
            })),
        );

        let raw = swarm.service_logs(&helper).await.unwrap();
        let transmission = protocol::parse_transmission(&raw);
        assert!(transmission.complete);
        assert_eq!(transmission.secrets[&secret_id], STANDARD.encode("pw"));
    }

    #[tokio::test]
    async fn test_mock_remove_unknown_service() {
        let swarm = MockSwarm::new();
        let err = swarm.remove_service("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
