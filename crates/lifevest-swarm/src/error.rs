//! Error types for lifevest-swarm

use lifevest_core::ObjectKind;
use thiserror::Error;

/// Result type for lifevest-swarm operations
pub type Result<T> = std::result::Result<T, SwarmError>;

/// Errors that can occur while talking to a Swarm
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SwarmError {
    /// No node can run the secret extraction helper
    #[error("secrets exist that must be retrieved, but no node is ready to run a service")]
    NoReadyNode,

    /// The helper never finished transmitting
    #[error("timed out after {attempts} attempt(s) waiting for the secret extraction service to finish")]
    ExtractionTimeout { attempts: u32 },

    /// Docker refused to deliver the helper's logs
    #[error("unable to retrieve service logs through the Docker API (incomplete log stream)")]
    LogStreamCorruption,

    /// Some secrets were not found in the helper's output
    #[error("not all secrets were retrieved from the extraction service, missing: {}", missing.join(", "))]
    IncompleteExtraction { missing: Vec<String> },

    /// The control plane rejected a create call
    #[error("failed to create {kind} '{name}': {message}")]
    ObjectCreation {
        kind: ObjectKind,
        name: String,
        message: String,
    },

    /// An explicitly given credentials file does not exist
    #[error("registry credentials file not found: {path}")]
    CredentialsMissing { path: String },

    /// The credentials file could not be read or parsed
    #[error("could not read registry credentials from {path}: {message}")]
    CredentialsParse { path: String, message: String },

    /// Docker API returned an error status
    #[error("Docker API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Connection or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint string could not be understood
    #[error("invalid Swarm endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Snapshot or object model error
    #[error(transparent)]
    Core(#[from] lifevest_core::CoreError),
}

impl From<serde_json::Error> for SwarmError {
    fn from(e: serde_json::Error) -> Self {
        SwarmError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for SwarmError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            SwarmError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else if e.is_connect() {
            SwarmError::Network(format!("connection failed: {}", e))
        } else {
            SwarmError::Network(e.to_string())
        }
    }
}

impl SwarmError {
    /// Check if this is a Docker 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, SwarmError::Api { status: 404, .. })
    }

    /// Check if this is a name conflict (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, SwarmError::Api { status: 409, .. })
    }

    /// Advice for the operator, when there is something they can do
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SwarmError::NoReadyNode => Some(
                "secrets can only be retrieved by running a service; make at least one node available",
            ),
            SwarmError::LogStreamCorruption => Some(
                "this is a known Swarm logging bug; if it persists, reduce the Swarm to a single manager and point Lifevest at it",
            ),
            SwarmError::ExtractionTimeout { .. } => {
                Some("the helper image may still be pulling; retry with a larger --max-attempts")
            }
            SwarmError::Network(_) | SwarmError::InvalidEndpoint { .. } => {
                Some("check that the manager's API is reachable, e.g. tcp://manager:2375")
            }
            _ => None,
        }
    }

    /// True for the failures of the secret extraction protocol itself
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            SwarmError::NoReadyNode
                | SwarmError::ExtractionTimeout { .. }
                | SwarmError::LogStreamCorruption
                | SwarmError::IncompleteExtraction { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_extraction_lists_missing() {
        let err = SwarmError::IncompleteExtraction {
            missing: vec!["abc".to_string(), "def".to_string()],
        };
        assert!(err.to_string().ends_with("missing: abc, def"));
        assert!(err.is_extraction_failure());
    }

    #[test]
    fn test_status_helpers() {
        let not_found = SwarmError::Api {
            status: 404,
            message: "no such service".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());
        assert!(!not_found.is_extraction_failure());
    }

    #[test]
    fn test_object_creation_message() {
        let err = SwarmError::ObjectCreation {
            kind: ObjectKind::Secret,
            name: "db".to_string(),
            message: "rpc error".to_string(),
        };
        assert_eq!(err.to_string(), "failed to create secret 'db': rpc error");
    }
}
