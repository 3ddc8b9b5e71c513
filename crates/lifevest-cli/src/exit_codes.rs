//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
pub const SUCCESS: u8 = 0;

/// General error - unspecified failure
pub const ERROR: u8 = 1;

/// Snapshot error - missing or malformed backup folder
pub const SNAPSHOT_ERROR: u8 = 2;

/// Cluster error - the Swarm API failed or refused an operation
pub const CLUSTER_ERROR: u8 = 3;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: u8 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: u8 = 64;
