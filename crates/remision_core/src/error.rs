//! Error types for the remision core.

use crate::types::SequenceNumber;
use remision_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in ledger operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad input, fixable by the user. Never retried automatically.
    #[error("validation error: {message}")]
    Validation {
        /// What was wrong.
        message: String,
    },

    /// A concurrency token no longer matched. Retried internally.
    #[error("write conflict on {resource}")]
    Conflict {
        /// The resource whose version moved.
        resource: String,
    },

    /// The referenced record does not exist.
    #[error("document {number} not found")]
    NotFound {
        /// The number that was looked up.
        number: SequenceNumber,
    },

    /// Conflicts persisted through every allowed attempt.
    #[error("gave up after {attempts} conflicting attempts")]
    ConcurrencyExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// An external dependency did not converge in time.
    #[error("timed out after {attempts} polls; last seen counter {last_seen}")]
    Timeout {
        /// Last counter value observed.
        last_seen: SequenceNumber,
        /// Polls made.
        attempts: u32,
    },

    /// The counter was advanced but the matching record was not written.
    ///
    /// The number is reserved and will never be reissued; the record has
    /// to be reconciled by hand.
    #[error("document {number} was reserved but its record was not written: {reason}")]
    OrphanedNumber {
        /// The reserved number.
        number: SequenceNumber,
        /// Why the record write did not complete.
        reason: String,
    },

    /// Counter and records disagree in a way the protocol cannot repair.
    #[error("ledger inconsistent: {message}")]
    Inconsistent {
        /// Description of the disagreement.
        message: String,
    },

    /// The operation was cancelled by its caller.
    #[error("operation cancelled")]
    Cancelled,

    /// The counter would need more than eight digits.
    #[error("sequence overflow: no eight-digit number left")]
    SequenceOverflow,

    /// Operation not permitted for this adapter or state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// JSON encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// SQLite error.
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { name, .. } => Self::Conflict { resource: name },
            other => Self::Storage(other),
        }
    }
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
        }
    }

    /// Creates an inconsistency error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::Inconsistent {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the whole operation may be retried from a fresh read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict { .. })
    }

    /// Returns true if the error is the caller's to fix.
    pub fn is_user_error(&self) -> bool {
        matches!(self, CoreError::Validation { .. } | CoreError::NotFound { .. })
    }
}
