//! Custom error types for hostvault
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for hostvault operations
#[derive(Error, Debug)]
pub enum HostVaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Snapshot store (restic) command failures
    #[error("Snapshot store error: {0}")]
    Store(String),

    /// Container runtime (docker) command failures
    #[error("Container runtime error: {0}")]
    Runtime(String),

    /// File sync (rsync) command failures
    #[error("File sync error: {0}")]
    Sync(String),

    /// Not enough free disk space for the requested operation
    #[error("Insufficient disk space: need {required} bytes, have {available}")]
    InsufficientSpace { required: u64, available: u64 },

    /// Operator declined or selection was invalid; no side effects occurred
    #[error("Operation aborted: {0}")]
    Aborted(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },
}

impl HostVaultError {
    /// Create a "not found" error for snapshots
    pub fn snapshot_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Snapshot",
            identifier: identifier.into(),
        }
    }

    /// Check if this is an abort (precondition/operator decline), as opposed
    /// to an external-call failure
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted(_) | Self::InsufficientSpace { .. })
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for HostVaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HostVaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for hostvault operations
pub type HostVaultResult<T> = Result<T, HostVaultError>;
