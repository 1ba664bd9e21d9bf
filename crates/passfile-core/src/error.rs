//! Error types for passfile core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-friendly messages.

use thiserror::Error;

use crate::model::{PassFileId, PassFileType};

/// Result type alias for passfile operations.
pub type Result<T> = std::result::Result<T, PassfileError>;

/// Core error type for passfile operations.
#[derive(Debug, Error)]
pub enum PassfileError {
    /// Local disk I/O failure
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Remote API failure (transport, server error, offline)
    #[error("Network error: {0}")]
    Network(String),

    /// Conditional upload rejected because the remote moved on
    #[error("Version conflict: expected remote version {expected}, found {actual}")]
    VersionConflict { expected: u32, actual: u32 },

    /// Incorrect passphrase during decryption
    #[error("Incorrect passphrase")]
    AuthenticationFailed,

    /// Content bytes could not be decoded
    #[error("Content is corrupt: {0}")]
    ContentCorrupt(String),

    /// Another mutation of the same passfile is in flight
    #[error("Passfile {0} is being modified by another operation")]
    ConcurrentMutation(PassFileId),

    /// Operation aborted through its cancellation token or a dismissed prompt
    #[error("Operation cancelled")]
    Cancelled,

    /// Passfile not found by ID
    #[error("Passfile not found: {0}")]
    NotFound(PassFileId),

    /// Content requested with a section type the passfile does not hold
    #[error("Passfile type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: PassFileType,
        actual: PassFileType,
    },

    /// Merge committed while conflicts remain open
    #[error("{0} merge conflict(s) are still unresolved")]
    UnresolvedConflicts(usize),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Encryption machinery failure (not a wrong passphrase)
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// JSON serialization/deserialization error outside of content decoding
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl PassfileError {
    /// Whether the error came from the remote collaborator.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            PassfileError::Network(_) | PassfileError::VersionConflict { .. }
        )
    }
}
