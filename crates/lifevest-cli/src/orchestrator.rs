//! Runs one input adapter into one output adapter

use chrono::{DateTime, SecondsFormat, Utc};
use lifevest_swarm::ExtractionConfig;
use serde::Serialize;
use std::path::PathBuf;

use crate::adapters::{Input, Output, create_input, create_output};
use crate::error::Result;

/// Everything one run needs, resolved from the command line
#[derive(Debug, Clone)]
pub struct Invocation {
    pub input: String,
    pub source: String,
    pub output: String,
    pub destination: String,
    /// The destination was generated rather than given
    pub default_destination: bool,
    pub registry_credentials: Option<PathBuf>,
    pub extraction: ExtractionConfig,
}

#[cfg(test)]
impl Invocation {
    pub fn for_test(input: &str, source: &str, output: &str, destination: &str) -> Self {
        Self {
            input: input.to_string(),
            source: source.to_string(),
            output: output.to_string(),
            destination: destination.to_string(),
            default_destination: false,
            registry_credentials: None,
            extraction: ExtractionConfig::default(),
        }
    }
}

/// Machine-readable summary printed with `--porcelain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub input: String,
    pub output: String,
    pub source: String,
    pub destination: String,
}

/// Folder name used when no destination is given: `backup-<UTC timestamp>`
pub fn default_destination(now: DateTime<Utc>) -> String {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    format!("backup-{}", stamp.replace([':', '.'], "-"))
}

pub struct Orchestrator {
    input: Box<dyn Input>,
    output: Box<dyn Output>,
}

impl Orchestrator {
    /// Select and validate the adapters of an invocation
    pub fn new(invocation: &Invocation) -> Result<Self> {
        let input = create_input(&invocation.input)?;
        let output = create_output(&invocation.output)?;
        input.validate(invocation)?;
        output.validate(invocation)?;
        Ok(Self { input, output })
    }

    /// Produce from the source, then consume into the destination
    pub async fn run(&self, invocation: &Invocation) -> Result<Summary> {
        tracing::debug!(input = self.input.name(), source = %invocation.source, "reading");
        let map = self.input.produce(invocation).await?;
        tracing::info!(
            services = map.services.len(),
            configs = map.configs.len(),
            secrets = map.secrets.len(),
            "read {} object(s) from {}",
            map.len(),
            invocation.source
        );

        tracing::debug!(output = self.output.name(), destination = %invocation.destination, "writing");
        self.output.consume(invocation, &map).await?;

        Ok(Summary {
            input: self.input.name().to_string(),
            output: self.output.name().to_string(),
            source: self.input.locate(&invocation.source),
            destination: self.output.locate(&invocation.destination),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lifevest_core::{Document, ObjectKind, ObjectMap, read_snapshot, write_snapshot};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_default_destination_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(default_destination(now), "backup-2024-03-09T14-05-07-000Z");
    }

    #[tokio::test]
    async fn test_folder_copy_summary() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        let destination = tmp.path().join("dst");
        let mut map = ObjectMap::new();
        map.insert(ObjectKind::Config, "c1", Document::new(json!({ "Name": "app.conf", "Data": "YQ==" })));
        write_snapshot(&source, &map).unwrap();

        let invocation = Invocation::for_test(
            "folder",
            &source.display().to_string(),
            "folder",
            &destination.display().to_string(),
        );
        let summary = Orchestrator::new(&invocation)
            .unwrap()
            .run(&invocation)
            .await
            .unwrap();

        assert_eq!(summary.input, "folder");
        assert_eq!(summary.destination, destination.display().to_string());
        assert_eq!(read_snapshot(&destination).unwrap(), map);
    }

    #[test]
    fn test_unknown_output_rejected_before_work() {
        let invocation = Invocation::for_test("folder", "in", "tape", "out");
        assert!(Orchestrator::new(&invocation).is_err());
    }
}
