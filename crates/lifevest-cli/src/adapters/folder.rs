//! Snapshot folder adapter

use async_trait::async_trait;
use lifevest_core::{ObjectMap, read_snapshot, write_snapshot};
use std::path::Path;

use super::{Input, Output};
use crate::error::Result;
use crate::orchestrator::Invocation;

fn absolute(location: &str) -> String {
    std::path::absolute(location)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| location.to_string())
}

/// Reads a snapshot folder
pub struct FolderInput;

#[async_trait]
impl Input for FolderInput {
    fn name(&self) -> &'static str {
        "folder"
    }

    fn locate(&self, source: &str) -> String {
        absolute(source)
    }

    async fn produce(&self, invocation: &Invocation) -> Result<ObjectMap> {
        tracing::debug!("reading backup folder {}", invocation.source);
        Ok(read_snapshot(Path::new(&invocation.source))?)
    }
}

/// Writes a snapshot folder
pub struct FolderOutput;

#[async_trait]
impl Output for FolderOutput {
    fn name(&self) -> &'static str {
        "folder"
    }

    fn validate(&self, invocation: &Invocation) -> Result<()> {
        if invocation.registry_credentials.is_some() {
            tracing::warn!("registry credentials are only used when restoring to a swarm, ignoring them");
        }
        Ok(())
    }

    fn locate(&self, destination: &str) -> String {
        absolute(destination)
    }

    async fn consume(&self, invocation: &Invocation, map: &ObjectMap) -> Result<()> {
        write_snapshot(Path::new(&invocation.destination), map)?;
        tracing::info!(
            "wrote {} object(s) to {}",
            map.len(),
            invocation.destination
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifevest_core::{Document, ObjectKind};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_folder_to_folder() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");

        let mut map = ObjectMap::new();
        map.insert(ObjectKind::Secret, "s1", Document::new(json!({ "Name": "db", "Data": "eA==" })));
        write_snapshot(&first, &map).unwrap();

        let invocation = Invocation::for_test("folder", &first.display().to_string(), "folder", &second.display().to_string());
        let produced = FolderInput.produce(&invocation).await.unwrap();
        FolderOutput.consume(&invocation, &produced).await.unwrap();

        assert_eq!(read_snapshot(&second).unwrap(), map);
    }

    #[tokio::test]
    async fn test_missing_folder_is_snapshot_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope").display().to_string();
        let invocation = Invocation::for_test("folder", &missing, "folder", "out");

        let err = FolderInput.produce(&invocation).await.unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::SNAPSHOT_ERROR);
    }

    #[test]
    fn test_locate_is_absolute() {
        assert!(Path::new(&FolderOutput.locate("backup-x")).is_absolute());
    }
}
