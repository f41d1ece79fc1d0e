use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable context for the failure.
        message: String,
        /// Backend specific error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// An update targeted a record that does not exist.
    #[error("{kind} `{id}` does not exist")]
    Missing {
        /// Record type.
        kind: &'static str,
        /// Identifier of the record.
        id: String,
    },
    /// A persisted document could not be mapped back to an entity.
    #[error("corrupted record `{id}`: {reason}")]
    Corrupted {
        /// Identifier of the offending record.
        id: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Outcome of an atomic conditional create.
///
/// The store is the only arbiter of uniqueness: callers never read before
/// writing to find out whether a record already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record did not exist and has been written.
    Created,
    /// A record with the same key already exists; nothing was written.
    AlreadyPresent,
}
