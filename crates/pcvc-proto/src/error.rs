//! Protocol error types.

use thiserror::Error;

/// The peer violated newline framing.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("Frame exceeds {max} bytes without a newline terminator")]
    TooLong { max: usize },

    #[error("Stream ended with {pending} unterminated bytes")]
    Unterminated { pending: usize },
}

/// Protocol error type. Every variant is fatal to the connection it occurs on.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("JSON encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Update(#[from] pcvc_core::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Read timeout")]
    Timeout,
}

impl ProtocolError {
    /// Whether the peer speaks another protocol version.
    #[must_use]
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, Self::Update(pcvc_core::Error::VersionMismatch { .. }))
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
