//! Error types for PCVC core.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::ProtocolVersion;

/// Core error type for state validation and reconciliation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: ProtocolVersion, found: ProtocolVersion },

    #[error("Malformed update: {0}")]
    MalformedUpdate(String),

    #[error("Malformed state: {0}")]
    MalformedState(String),

    #[error("Failed to read seed file {path:?}: {source}")]
    SeedIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::MalformedUpdate`] from anything displayable.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedUpdate(reason.into())
    }
}

/// Result type alias for PCVC core operations.
pub type Result<T> = std::result::Result<T, Error>;
