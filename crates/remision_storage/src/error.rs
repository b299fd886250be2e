//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The document changed since the writer last read it.
    #[error("version conflict on {name}: expected {expected:?}, found {actual:?}")]
    Conflict {
        /// Document name.
        name: String,
        /// Version the writer expected (`None` means "must not exist").
        expected: Option<String>,
        /// Version currently stored (`None` means "absent").
        actual: Option<String>,
    },

    /// The document name is not usable by this backend.
    #[error("invalid document name: {0}")]
    InvalidName(String),

    /// The remote service answered with an unexpected status.
    #[error("remote error (status {status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response message.
        message: String,
    },

    /// The HTTP transport failed before a response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend is not configured well enough to be used.
    #[error("configuration error: {0}")]
    Config(String),

    /// The stored or received payload could not be decoded.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Creates a conflict error.
    pub fn conflict(
        name: impl Into<String>,
        expected: Option<&str>,
        actual: Option<&str>,
    ) -> Self {
        Self::Conflict {
            name: name.into(),
            expected: expected.map(str::to_owned),
            actual: actual.map(str::to_owned),
        }
    }

    /// Returns true if this is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }

    /// Returns true if repeating the same request may succeed.
    ///
    /// Conflicts are not retryable at this level: the caller has to re-read
    /// before writing again.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Transport(_) => true,
            StorageError::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
