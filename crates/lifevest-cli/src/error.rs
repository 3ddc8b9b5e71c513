//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use lifevest_core::CoreError;
use lifevest_swarm::SwarmError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Invalid arguments or adapter selection
    #[error("{message}")]
    #[diagnostic(code(lifevest::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Backup folder missing or malformed
    #[error("Snapshot error: {message}")]
    #[diagnostic(code(lifevest::cli::snapshot))]
    Snapshot {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The Swarm API failed or refused an operation
    #[error("Cluster error: {message}")]
    #[diagnostic(code(lifevest::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(lifevest::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(lifevest::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Snapshot { .. } => exit_codes::SNAPSHOT_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            other => CliError::Snapshot {
                message: other.to_string(),
                help: Some(
                    "a backup folder holds 'services', 'configs' and 'secrets' subfolders of JSON files"
                        .to_string(),
                ),
            },
        }
    }
}

impl From<SwarmError> for CliError {
    fn from(err: SwarmError) -> Self {
        match err {
            SwarmError::Core(core) => core.into(),
            SwarmError::InvalidEndpoint { .. }
            | SwarmError::CredentialsMissing { .. }
            | SwarmError::CredentialsParse { .. } => CliError::Usage {
                help: err.hint().map(str::to_string),
                message: err.to_string(),
            },
            other => CliError::Cluster {
                help: other.hint().map(str::to_string),
                message: other.to_string(),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
