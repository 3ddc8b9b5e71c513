//! Lifevest Core - Core types for Swarm configuration backup and restore
//!
//! This crate provides the foundational types used throughout Lifevest:
//! - `ObjectMap`: Services, configs and secrets keyed by kind and cluster identifier
//! - `Document`: The verbatim `Spec` of a single cluster object
//! - `RemapTable`: Source to destination identifier mapping used during restore
//! - `snapshot`: Reading and writing object maps as a directory of JSON files

pub mod error;
pub mod objects;
pub mod remap;
pub mod snapshot;

pub use error::{CoreError, Result};
pub use objects::{Document, ObjectCollection, ObjectKind, ObjectMap};
pub use remap::{ObjectRef, RemapTable, RemapTables, ServiceRewrite, rewrite_service_references, service_references};
pub use snapshot::{read_snapshot, write_snapshot};
