//! Docker Swarm integration for Lifevest
//!
//! This crate provides:
//! - A [`SwarmApi`] abstraction over the Docker Engine API, with an HTTP
//!   implementation ([`DockerClient`]) and an in-memory one ([`MockSwarm`])
//! - Cluster listing ([`ClusterReader`])
//! - Secret payload extraction through a one-shot helper service
//!   ([`SecretExtractor`])
//! - Idempotent restore with identifier remapping ([`Reconciler`])

pub mod api;
pub mod client;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod extract;
pub mod mock;
pub mod protocol;
pub mod reader;
pub mod reconcile;

pub use api::{ListedObject, Node, SwarmApi};
pub use client::DockerClient;
pub use credentials::{DEFAULT_CREDENTIALS_PATH, RegistryAuth, load_registry_auth};
pub use endpoint::SwarmEndpoint;
pub use error::{Result, SwarmError};
pub use extract::{ExtractionConfig, ExtractionSession, SecretExtractor};
pub use mock::{LogBehavior, MockSwarm, OperationCounts};
pub use reader::{ClusterReader, backup};
pub use reconcile::{KindSummary, ReconcileReport, ReconcileWarning, Reconciler};
