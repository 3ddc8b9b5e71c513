//! Input and output adapters
//!
//! An input produces an [`ObjectMap`] from a source, an output consumes one
//! into a destination. Adapters are selected by name with `--input` and
//! `--output`; the set is fixed at compile time.

use async_trait::async_trait;
use lifevest_core::ObjectMap;

use crate::error::{CliError, Result};
use crate::orchestrator::Invocation;

pub mod folder;
pub mod swarm;

/// Where configuration state is read from
#[async_trait]
pub trait Input: Send + Sync {
    /// Name used with `--input`
    fn name(&self) -> &'static str;

    /// Check the arguments before any work starts
    fn validate(&self, _invocation: &Invocation) -> Result<()> {
        Ok(())
    }

    /// Canonical form of the source for reporting
    fn locate(&self, source: &str) -> String {
        source.to_string()
    }

    /// Read the state found at `invocation.source`
    async fn produce(&self, invocation: &Invocation) -> Result<ObjectMap>;
}

/// Where configuration state is written to
#[async_trait]
pub trait Output: Send + Sync {
    /// Name used with `--output`
    fn name(&self) -> &'static str;

    /// Check the arguments before any work starts
    fn validate(&self, _invocation: &Invocation) -> Result<()> {
        Ok(())
    }

    /// Canonical form of the destination for reporting
    fn locate(&self, destination: &str) -> String {
        destination.to_string()
    }

    /// Write `map` to `invocation.destination`
    async fn consume(&self, invocation: &Invocation, map: &ObjectMap) -> Result<()>;
}

/// All input adapters
pub fn inputs() -> Vec<Box<dyn Input>> {
    vec![Box::new(swarm::SwarmInput), Box::new(folder::FolderInput)]
}

/// All output adapters
pub fn outputs() -> Vec<Box<dyn Output>> {
    vec![Box::new(folder::FolderOutput), Box::new(swarm::SwarmOutput)]
}

/// Look up an input adapter by name
pub fn create_input(name: &str) -> Result<Box<dyn Input>> {
    let available = inputs();
    let names: Vec<&str> = available.iter().map(|a| a.name()).collect();
    let help = format!("available inputs: {}", names.join(", "));
    available
        .into_iter()
        .find(|a| a.name() == name)
        .ok_or_else(|| CliError::usage_with_help(format!("unknown input type '{}'", name), help))
}

/// Look up an output adapter by name
pub fn create_output(name: &str) -> Result<Box<dyn Output>> {
    let available = outputs();
    let names: Vec<&str> = available.iter().map(|a| a.name()).collect();
    let help = format!("available outputs: {}", names.join(", "));
    available
        .into_iter()
        .find(|a| a.name() == name)
        .ok_or_else(|| CliError::usage_with_help(format!("unknown output type '{}'", name), help))
}
